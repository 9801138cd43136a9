//! # Config 模块
//!
//! HUD 配置管理，每个控件一份引擎配置。
//!
//! ## 配置优先级
//!
//! 1. 配置文件 (hud.json)
//! 2. 各控件的默认值

use std::fs;
use std::path::Path;

use fx_runtime::{
    BackpressureConfig, EngineConfig, OverflowPolicy, ShakeConfig, StackConfig, VignetteConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::HudError;

/// 单个控件的配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// 是否启用该控件
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 每个效果的持续时间（毫秒）
    #[serde(default = "default_duration_ms")]
    pub duration_ms: f64,

    /// 调度引擎配置
    #[serde(default)]
    pub engine: EngineConfig,
}

/// 方向指示器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_indicator_widget")]
    pub widget: WidgetConfig,

    /// 脚步声指示的持续时间（毫秒）
    #[serde(default = "default_footstep_duration_ms")]
    pub footstep_duration_ms: f64,

    /// 脚步声指示的脉动次数
    #[serde(default = "default_footstep_pulses")]
    pub footstep_pulses: f32,
}

/// 震屏配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenShakeConfig {
    #[serde(default = "default_shake_widget")]
    pub widget: WidgetConfig,

    #[serde(default)]
    pub shake: ShakeConfig,

    /// 每点伤害对应的震屏强度
    #[serde(default = "default_magnitude_scale")]
    pub magnitude_scale: f32,

    /// 单次震屏强度上限
    #[serde(default = "default_max_magnitude")]
    pub max_magnitude: f32,
}

/// HUD 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HudConfig {
    #[serde(default = "default_hit_marker")]
    pub hit_marker: WidgetConfig,

    #[serde(default = "default_damage_numbers")]
    pub damage_numbers: WidgetConfig,

    #[serde(default)]
    pub damage_indicators: IndicatorConfig,

    #[serde(default)]
    pub screen_shake: ScreenShakeConfig,

    #[serde(default)]
    pub vignette: VignetteConfig,

    #[serde(default = "default_notifications")]
    pub notifications: WidgetConfig,

    #[serde(default = "default_kill_feed")]
    pub kill_feed: WidgetConfig,

    #[serde(default = "default_achievements")]
    pub achievements: WidgetConfig,
}

// 默认值函数
fn default_true() -> bool {
    true
}

fn default_duration_ms() -> f64 {
    1000.0
}

fn default_footstep_duration_ms() -> f64 {
    800.0
}

fn default_footstep_pulses() -> f32 {
    2.0
}

fn default_magnitude_scale() -> f32 {
    0.05
}

fn default_max_magnitude() -> f32 {
    3.0
}

fn evicting(duration_ms: f64, max_concurrent: usize) -> WidgetConfig {
    WidgetConfig {
        enabled: true,
        duration_ms,
        engine: EngineConfig {
            backpressure: BackpressureConfig {
                max_concurrent,
                overflow_policy: OverflowPolicy::EvictOldest,
                ..Default::default()
            },
            ..Default::default()
        },
    }
}

fn queued(duration_ms: f64, max_concurrent: usize, spacing_ms: f64, cooldown_ms: f64) -> WidgetConfig {
    WidgetConfig {
        enabled: true,
        duration_ms,
        engine: EngineConfig {
            backpressure: BackpressureConfig {
                max_concurrent,
                overflow_policy: OverflowPolicy::Queue,
                spacing_ms,
                cooldown_ms,
                ..Default::default()
            },
            ..Default::default()
        },
    }
}

fn default_hit_marker() -> WidgetConfig {
    evicting(250.0, 4)
}

fn default_damage_numbers() -> WidgetConfig {
    let mut config = evicting(900.0, 12);
    config.engine.stack = StackConfig {
        enabled: true,
        threshold_ms: 300.0,
        stack_limit: 3,
        refresh_on_stack: true,
    };
    config
}

fn default_indicator_widget() -> WidgetConfig {
    evicting(1200.0, 6)
}

fn default_shake_widget() -> WidgetConfig {
    evicting(ShakeConfig::default().duration_ms, 4)
}

fn default_notifications() -> WidgetConfig {
    queued(3000.0, 3, 250.0, 0.0)
}

fn default_kill_feed() -> WidgetConfig {
    evicting(5000.0, 5)
}

fn default_achievements() -> WidgetConfig {
    queued(4000.0, 1, 500.0, 300.0)
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: default_duration_ms(),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            widget: default_indicator_widget(),
            footstep_duration_ms: default_footstep_duration_ms(),
            footstep_pulses: default_footstep_pulses(),
        }
    }
}

impl Default for ScreenShakeConfig {
    fn default() -> Self {
        Self {
            widget: default_shake_widget(),
            shake: ShakeConfig::default(),
            magnitude_scale: default_magnitude_scale(),
            max_magnitude: default_max_magnitude(),
        }
    }
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            hit_marker: default_hit_marker(),
            damage_numbers: default_damage_numbers(),
            damage_indicators: IndicatorConfig::default(),
            screen_shake: ScreenShakeConfig::default(),
            vignette: VignetteConfig::default(),
            notifications: default_notifications(),
            kill_feed: default_kill_feed(),
            achievements: default_achievements(),
        }
    }
}

impl WidgetConfig {
    /// 验证配置有效性
    pub fn validate(&self, widget: &'static str) -> Result<(), HudError> {
        if !(self.duration_ms.is_finite() && self.duration_ms > 0.0) {
            return Err(HudError::InvalidDuration {
                widget,
                value: self.duration_ms,
            });
        }
        self.engine
            .validate()
            .map_err(|source| HudError::InvalidConfig { widget, source })
    }
}

impl HudConfig {
    /// 加载配置文件
    ///
    /// 如果文件不存在、解析失败或校验失败，返回默认配置并记录警告。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!(path = %path.display(), "配置文件不存在，使用默认配置");
            return Self::default();
        }

        match Self::try_load(path) {
            Ok(config) => {
                info!(path = %path.display(), "配置文件加载成功");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "配置文件无效，使用默认配置");
                Self::default()
            }
        }
    }

    /// 读取并校验配置文件
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, HudError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HudError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), HudError> {
        self.hit_marker.validate("hit_marker")?;
        self.damage_numbers.validate("damage_numbers")?;
        self.damage_indicators.widget.validate("damage_indicators")?;
        self.screen_shake.widget.validate("screen_shake")?;
        self.notifications.validate("notifications")?;
        self.kill_feed.validate("kill_feed")?;
        self.achievements.validate("achievements")?;

        if !(self.damage_indicators.footstep_duration_ms.is_finite()
            && self.damage_indicators.footstep_duration_ms > 0.0)
        {
            return Err(HudError::InvalidDuration {
                widget: "damage_indicators",
                value: self.damage_indicators.footstep_duration_ms,
            });
        }

        self.screen_shake
            .shake
            .validate()
            .map_err(|source| HudError::InvalidConfig {
                widget: "screen_shake",
                source,
            })?;
        self.vignette
            .validate()
            .map_err(|source| HudError::InvalidConfig {
                widget: "vignette",
                source,
            })?;
        Ok(())
    }
}
