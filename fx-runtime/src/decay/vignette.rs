//! # Vignette 模块
//!
//! 血量比例 → 暗角强度的非线性映射。
//!
//! ```text
//! 强度
//!  max ┤━━━━━━━━┓
//!      │        ┃╲
//!      │        ┃  ╲
//!    0 ┤        ┃    ╲━━━━━━━━━━
//!      └────────┸─────┸─────────── 血量
//!            lower   upper
//! ```
//!
//! 血量低于 `critical_threshold` 时叠加正弦脉动，血量越接近 0 频率越高。
//! 输出强度每帧以指数插值逼近目标值，避免画面跳变。

use std::f32::consts::TAU;

use tracing::warn;

use crate::config::VignetteConfig;

/// 目标强度（未平滑）
pub fn target_intensity(health: f32, config: &VignetteConfig) -> f32 {
    let h = health.clamp(0.0, 1.0);
    if h >= config.upper_threshold {
        0.0
    } else if h <= config.lower_threshold {
        config.max_intensity
    } else {
        let span = config.upper_threshold - config.lower_threshold;
        config.max_intensity * (config.upper_threshold - h) / span
    }
}

/// 脉动频率；血量不低于临界阈值时返回 `None`
pub fn pulse_hz(health: f32, config: &VignetteConfig) -> Option<f32> {
    let h = health.clamp(0.0, 1.0);
    if config.critical_threshold <= 0.0 || h >= config.critical_threshold {
        return None;
    }
    let depth = 1.0 - h / config.critical_threshold;
    Some(config.base_pulse_hz + (config.max_pulse_hz - config.base_pulse_hz) * depth)
}

/// 暗角平滑状态
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VignetteState {
    pub current_intensity: f32,
    pub target_intensity: f32,
}

/// 一帧暗角输出
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VignetteSample {
    /// 平滑后的基础强度
    pub intensity: f32,
    /// 当前目标强度
    pub target: f32,
    /// 当前脉动频率
    pub pulse_hz: Option<f32>,
    /// 叠加脉动后的最终输出
    pub output: f32,
}

/// 血量驱动的暗角模拟器
#[derive(Debug, Clone)]
pub struct VignetteSimulator {
    config: VignetteConfig,
    state: VignetteState,
    health: f32,
    pulse_phase: f32,
}

impl VignetteSimulator {
    pub fn new(config: VignetteConfig) -> Self {
        Self {
            config,
            state: VignetteState::default(),
            health: 1.0,
            pulse_phase: 0.0,
        }
    }

    /// 更新血量比例
    ///
    /// 非有限值被忽略。
    pub fn set_health(&mut self, health: f32) {
        if !health.is_finite() {
            warn!(health, "忽略非法血量比例");
            return;
        }
        self.health = health.clamp(0.0, 1.0);
        self.state.target_intensity = target_intensity(self.health, &self.config);
    }

    /// 推进一帧
    pub fn step(&mut self, dt_ms: f64) -> VignetteSample {
        let state = &mut self.state;
        state.current_intensity +=
            (state.target_intensity - state.current_intensity) * self.config.smoothing;

        let hz = pulse_hz(self.health, &self.config);
        let output = match hz {
            Some(hz) => {
                self.pulse_phase =
                    (self.pulse_phase + TAU * hz * (dt_ms.max(0.0) / 1000.0) as f32) % TAU;
                let pulse = 0.5 + 0.5 * self.pulse_phase.sin();
                let depth = self.config.pulse_depth;
                state.current_intensity * (1.0 - depth + depth * pulse)
            }
            None => {
                self.pulse_phase = 0.0;
                state.current_intensity
            }
        };

        VignetteSample {
            intensity: state.current_intensity,
            target: state.target_intensity,
            pulse_hz: hz,
            output,
        }
    }

    /// 立即回到无暗角状态
    pub fn reset(&mut self) {
        self.state = VignetteState::default();
        self.health = 1.0;
        self.pulse_phase = 0.0;
    }

    pub fn state(&self) -> VignetteState {
        self.state
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn config(&self) -> &VignetteConfig {
        &self.config
    }
}
