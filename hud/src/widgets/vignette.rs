//! # HealthVignette 控件
//!
//! 血量暗角。不使用资源池，直接由 [`VignetteSimulator`] 逐帧推进。

use fx_runtime::{EventCategory, FxEvent, VignetteConfig, VignetteSample, VignetteSimulator};
use tracing::warn;

use crate::error::HudError;

/// 血量暗角控件
#[derive(Debug, Clone)]
pub struct HealthVignette {
    simulator: VignetteSimulator,
    last: Option<VignetteSample>,
    paused: bool,
    disposed: bool,
}

impl HealthVignette {
    pub fn new(config: &VignetteConfig) -> Result<Self, HudError> {
        config
            .validate()
            .map_err(|source| HudError::InvalidConfig {
                widget: "vignette",
                source,
            })?;
        Ok(Self {
            simulator: VignetteSimulator::new(config.clone()),
            last: None,
            paused: false,
            disposed: false,
        })
    }

    pub fn handle(&mut self, event: &FxEvent) {
        if self.disposed || event.category != EventCategory::HealthChanged {
            return;
        }
        match event.magnitude {
            Some(health) => self.simulator.set_health(health),
            None => warn!("血量事件缺少 magnitude，忽略"),
        }
    }

    /// 推进一帧；暂停期间保持上一帧输出，释放后恒为 `None`
    pub fn tick(&mut self, delta_ms: f64) -> Option<VignetteSample> {
        if !self.paused && !self.disposed {
            self.last = Some(self.simulator.step(delta_ms));
        }
        self.last
    }

    pub fn pause_all(&mut self) {
        self.paused = true;
    }

    pub fn resume_all(&mut self) {
        self.paused = false;
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.simulator.reset();
        self.last = None;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// 最近一帧的输出强度
    pub fn output(&self) -> f32 {
        self.last.map_or(0.0, |s| s.output)
    }

    pub fn last_sample(&self) -> Option<VignetteSample> {
        self.last
    }

    pub fn health(&self) -> f32 {
        self.simulator.health()
    }
}
