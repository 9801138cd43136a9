//! # Shake 模块
//!
//! 带方向的震屏衰减。两种衰减模式并存，由 [`DecayMode`] 选择：
//!
//! - `Quadratic`：`intensity(t) = intensity₀ · max(0, 1 − t/duration)²`，纯函数
//! - `Exponential`：`intensity -= intensity · decay_rate · dt`，逐帧迭代
//!
//! 每帧偏移 `(noise(t) · noise_factor + direction · direction_factor) · intensity(t)`。
//! 强度低于 `epsilon` 时偏移归零，实例应被释放。

use crate::config::{DecayMode, ShakeConfig};
use crate::decay::NoiseField;
use crate::math::Vec2;

/// 二次有界衰减
pub fn quadratic_intensity(initial: f32, elapsed_ms: f64, duration_ms: f64) -> f32 {
    if duration_ms <= 0.0 {
        return 0.0;
    }
    let remaining = (1.0 - elapsed_ms / duration_ms).max(0.0) as f32;
    initial * remaining * remaining
}

/// 指数衰减的单步迭代
pub fn exponential_step(intensity: f32, decay_rate: f32, dt_ms: f64) -> f32 {
    let factor = (1.0 - decay_rate * dt_ms.max(0.0) as f32).max(0.0);
    intensity * factor
}

/// 一次震屏采样
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeSample {
    /// 当前强度
    pub intensity: f32,
    /// 当前空间偏移
    pub offset: Vec2,
    /// 强度已低于 epsilon
    pub settled: bool,
}

/// 单个震屏实例的状态
#[derive(Debug, Clone, PartialEq)]
pub struct ShakeState {
    /// 当前强度
    pub intensity: f32,
    /// 初始强度
    pub initial: f32,
    /// 单位方向向量
    pub direction: Vec2,
    /// 衰减模式
    pub decay_mode: DecayMode,
    noise_factor: f32,
    direction_factor: f32,
    epsilon: f32,
    decay_rate: f32,
    noise_frequency: f32,
    /// 上一次采样时的已激活时长（指数模式计算 dt 用）
    last_elapsed_ms: f64,
}

impl ShakeState {
    /// 创建震屏状态；`direction` 会被归一化
    pub fn new(config: &ShakeConfig, intensity: f32, direction: Vec2) -> Self {
        Self {
            intensity,
            initial: intensity,
            direction: direction.normalize_or_zero(),
            decay_mode: config.decay_mode,
            noise_factor: config.noise_factor,
            direction_factor: config.direction_factor,
            epsilon: config.epsilon,
            decay_rate: config.decay_rate,
            noise_frequency: config.noise_frequency,
            last_elapsed_ms: 0.0,
        }
    }

    /// 以新的初始强度重新开始
    pub fn restart(&mut self, intensity: f32) {
        self.intensity = intensity;
        self.initial = intensity;
        self.last_elapsed_ms = 0.0;
    }

    /// 推进到 `elapsed_ms`（已激活时长，不含暂停）并采样
    ///
    /// `elapsed_ms` 不随暂停增长，因此指数模式的 dt 在暂停/恢复前后保持连续。
    pub fn sample(&mut self, elapsed_ms: f64, duration_ms: f64, noise: &NoiseField) -> ShakeSample {
        self.intensity = match self.decay_mode {
            DecayMode::Quadratic => quadratic_intensity(self.initial, elapsed_ms, duration_ms),
            DecayMode::Exponential => {
                let dt = elapsed_ms - self.last_elapsed_ms;
                exponential_step(self.intensity, self.decay_rate, dt)
            }
        };
        self.last_elapsed_ms = elapsed_ms;

        if self.intensity <= self.epsilon {
            return ShakeSample {
                intensity: self.intensity,
                offset: Vec2::ZERO,
                settled: true,
            };
        }

        let t = (elapsed_ms / 1000.0) as f32 * self.noise_frequency;
        let jitter = noise.sample(t) * self.noise_factor;
        let push = self.direction * self.direction_factor;

        ShakeSample {
            intensity: self.intensity,
            offset: (jitter + push) * self.intensity,
            settled: false,
        }
    }
}
