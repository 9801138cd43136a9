//! # Config 模块
//!
//! 调度器的固定配置记录。
//!
//! 所有默认值在构造时一次性解析（`#[serde(default = ...)]`），运行期不再按调用
//! 重新推导。每个记录都提供 `validate()`，由 [`FxEngine::new`](crate::FxEngine::new)
//! 在构造时统一调用。

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 资源池配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// 构造时预分配的句柄数量（作为第一个块）
    #[serde(default = "default_initial_size")]
    pub initial_size: usize,

    /// 句柄总数上限
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// 每次扩容分配的块大小
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// 是否允许超出 `initial_size` 扩容
    #[serde(default = "default_true")]
    pub allow_growth: bool,
}

/// 超出并发上限时的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// 立即淘汰最早的活跃实例
    #[default]
    EvictOldest,
    /// 排队，等待空位后按 FIFO 派发
    Queue,
}

/// 背压配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackpressureConfig {
    /// 同时可见实例上限
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// 溢出策略
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// 有实例释放后，队列再次派发前的冷却时间（毫秒）
    #[serde(default)]
    pub cooldown_ms: f64,

    /// 两个排队项之间的最小派发间隔（毫秒）
    #[serde(default)]
    pub spacing_ms: f64,

    /// 队列长度上限，超出时丢弃最早的排队项
    #[serde(default = "default_max_queue_len")]
    pub max_queue_len: usize,
}

/// 堆叠聚合配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    /// 是否启用堆叠
    #[serde(default)]
    pub enabled: bool,

    /// 相邻两次事件的最大间隔（毫秒），超过即开启新的实例
    #[serde(default = "default_stack_threshold_ms")]
    pub threshold_ms: f64,

    /// 子事件数量超过该值后，标签折叠为"最近一次 + 合计"
    #[serde(default = "default_stack_limit")]
    pub stack_limit: usize,

    /// 堆叠时是否重置实例的生命周期
    #[serde(default = "default_true")]
    pub refresh_on_stack: bool,
}

/// 震屏衰减模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayMode {
    /// `intensity₀ · max(0, 1 − t/duration)²`
    #[default]
    Quadratic,
    /// `intensity -= intensity · decay_rate · dt`
    Exponential,
}

/// 震屏配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShakeConfig {
    /// 衰减模式
    #[serde(default)]
    pub decay_mode: DecayMode,

    /// 持续时间上限（毫秒）
    #[serde(default = "default_shake_duration_ms")]
    pub duration_ms: f64,

    /// 噪声分量权重
    #[serde(default = "default_noise_factor")]
    pub noise_factor: f32,

    /// 方向分量权重
    #[serde(default = "default_direction_factor")]
    pub direction_factor: f32,

    /// 低于该强度即视为结束
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,

    /// 指数模式的衰减率（每毫秒）
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f32,

    /// 噪声采样频率（Hz）
    #[serde(default = "default_noise_frequency")]
    pub noise_frequency: f32,
}

/// 血量暗角配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VignetteConfig {
    /// 血量高于该比例时强度为 0
    #[serde(default = "default_upper_threshold")]
    pub upper_threshold: f32,

    /// 血量低于该比例时强度达到最大
    #[serde(default = "default_lower_threshold")]
    pub lower_threshold: f32,

    /// 血量低于该比例时开始脉动
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f32,

    /// 最大强度
    #[serde(default = "default_max_intensity")]
    pub max_intensity: f32,

    /// 每帧向目标值逼近的比例 (0, 1]
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,

    /// 刚进入临界区时的脉动频率（Hz）
    #[serde(default = "default_base_pulse_hz")]
    pub base_pulse_hz: f32,

    /// 血量趋近 0 时的脉动频率（Hz）
    #[serde(default = "default_max_pulse_hz")]
    pub max_pulse_hz: f32,

    /// 脉动幅度（占当前强度的比例）
    #[serde(default = "default_pulse_depth")]
    pub pulse_depth: f32,
}

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub backpressure: BackpressureConfig,

    #[serde(default)]
    pub stack: StackConfig,

    /// 噪声与随机方向的种子（每个引擎实例一次）
    #[serde(default = "default_seed")]
    pub seed: u64,
}

// 默认值函数
fn default_true() -> bool {
    true
}

fn default_initial_size() -> usize {
    8
}

fn default_max_size() -> usize {
    32
}

fn default_block_size() -> usize {
    8
}

fn default_max_concurrent() -> usize {
    8
}

fn default_max_queue_len() -> usize {
    16
}

fn default_stack_threshold_ms() -> f64 {
    300.0
}

fn default_stack_limit() -> usize {
    3
}

fn default_shake_duration_ms() -> f64 {
    400.0
}

fn default_noise_factor() -> f32 {
    0.6
}

fn default_direction_factor() -> f32 {
    0.4
}

fn default_epsilon() -> f32 {
    0.01
}

fn default_decay_rate() -> f32 {
    0.008
}

fn default_noise_frequency() -> f32 {
    25.0
}

fn default_upper_threshold() -> f32 {
    0.5
}

fn default_lower_threshold() -> f32 {
    0.15
}

fn default_critical_threshold() -> f32 {
    0.1
}

fn default_max_intensity() -> f32 {
    0.85
}

fn default_smoothing() -> f32 {
    0.1
}

fn default_base_pulse_hz() -> f32 {
    1.0
}

fn default_max_pulse_hz() -> f32 {
    4.0
}

fn default_pulse_depth() -> f32 {
    0.3
}

fn default_seed() -> u64 {
    0x5EED_F00D
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: default_initial_size(),
            max_size: default_max_size(),
            block_size: default_block_size(),
            allow_growth: true,
        }
    }
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            overflow_policy: OverflowPolicy::default(),
            cooldown_ms: 0.0,
            spacing_ms: 0.0,
            max_queue_len: default_max_queue_len(),
        }
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_ms: default_stack_threshold_ms(),
            stack_limit: default_stack_limit(),
            refresh_on_stack: true,
        }
    }
}

impl Default for ShakeConfig {
    fn default() -> Self {
        Self {
            decay_mode: DecayMode::default(),
            duration_ms: default_shake_duration_ms(),
            noise_factor: default_noise_factor(),
            direction_factor: default_direction_factor(),
            epsilon: default_epsilon(),
            decay_rate: default_decay_rate(),
            noise_frequency: default_noise_frequency(),
        }
    }
}

impl Default for VignetteConfig {
    fn default() -> Self {
        Self {
            upper_threshold: default_upper_threshold(),
            lower_threshold: default_lower_threshold(),
            critical_threshold: default_critical_threshold(),
            max_intensity: default_max_intensity(),
            smoothing: default_smoothing(),
            base_pulse_hz: default_base_pulse_hz(),
            max_pulse_hz: default_max_pulse_hz(),
            pulse_depth: default_pulse_depth(),
        }
    }
}

fn check_millis(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::out_of_range(
            field,
            format!("必须是非负有限数，实际为 {value}"),
        ));
    }
    Ok(())
}

fn check_unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::out_of_range(
            field,
            format!("必须在 0.0 - 1.0 之间，实际为 {value}"),
        ));
    }
    Ok(())
}

impl PoolConfig {
    /// 固定容量的池（不扩容）
    pub fn fixed(size: usize) -> Self {
        Self {
            initial_size: size,
            max_size: size,
            block_size: size.max(1),
            allow_growth: false,
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::out_of_range("max_size", "必须大于 0"));
        }
        if self.initial_size > self.max_size {
            return Err(ConfigError::Inconsistent {
                field: "initial_size",
                other: "max_size",
                message: format!("{} > {}", self.initial_size, self.max_size),
            });
        }
        if self.allow_growth && self.block_size == 0 {
            return Err(ConfigError::out_of_range(
                "block_size",
                "允许扩容时必须大于 0",
            ));
        }
        Ok(())
    }
}

impl BackpressureConfig {
    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::out_of_range("max_concurrent", "必须大于 0"));
        }
        check_millis("cooldown_ms", self.cooldown_ms)?;
        check_millis("spacing_ms", self.spacing_ms)?;
        if self.overflow_policy == OverflowPolicy::Queue && self.max_queue_len == 0 {
            return Err(ConfigError::out_of_range(
                "max_queue_len",
                "queue 策略下必须大于 0",
            ));
        }
        Ok(())
    }
}

impl StackConfig {
    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_millis("threshold_ms", self.threshold_ms)?;
        if self.enabled && self.stack_limit == 0 {
            return Err(ConfigError::out_of_range("stack_limit", "必须大于 0"));
        }
        Ok(())
    }
}

impl ShakeConfig {
    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_millis("duration_ms", self.duration_ms)?;
        if self.duration_ms == 0.0 {
            return Err(ConfigError::out_of_range("duration_ms", "必须大于 0"));
        }
        if !(self.epsilon > 0.0) {
            return Err(ConfigError::out_of_range("epsilon", "必须大于 0"));
        }
        if self.decay_mode == DecayMode::Exponential && !(self.decay_rate > 0.0) {
            return Err(ConfigError::out_of_range(
                "decay_rate",
                "指数模式下必须大于 0",
            ));
        }
        if self.noise_factor < 0.0 || self.direction_factor < 0.0 {
            return Err(ConfigError::out_of_range(
                "noise_factor",
                "权重不能为负",
            ));
        }
        Ok(())
    }
}

impl VignetteConfig {
    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("upper_threshold", self.upper_threshold)?;
        check_unit("lower_threshold", self.lower_threshold)?;
        check_unit("critical_threshold", self.critical_threshold)?;
        check_unit("max_intensity", self.max_intensity)?;
        check_unit("pulse_depth", self.pulse_depth)?;

        if self.lower_threshold >= self.upper_threshold {
            return Err(ConfigError::Inconsistent {
                field: "lower_threshold",
                other: "upper_threshold",
                message: "下阈值必须小于上阈值".to_string(),
            });
        }
        if self.critical_threshold > self.upper_threshold {
            return Err(ConfigError::Inconsistent {
                field: "critical_threshold",
                other: "upper_threshold",
                message: "临界阈值不能高于上阈值".to_string(),
            });
        }
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(ConfigError::out_of_range(
                "smoothing",
                "必须在 (0.0, 1.0] 之间",
            ));
        }
        if self.base_pulse_hz < 0.0 || self.max_pulse_hz < self.base_pulse_hz {
            return Err(ConfigError::Inconsistent {
                field: "max_pulse_hz",
                other: "base_pulse_hz",
                message: "脉动频率必须非负且上限不小于基准".to_string(),
            });
        }
        Ok(())
    }
}

impl EngineConfig {
    /// 验证所有子配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool.validate()?;
        self.backpressure.validate()?;
        self.stack.validate()?;
        Ok(())
    }
}
