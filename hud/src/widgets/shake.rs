//! # ScreenShake 控件
//!
//! 受击震屏。每次受击登记一个带衰减的实例，相机偏移为所有实例偏移之和。

use fx_runtime::{
    EffectRenderer, EffectRequest, EventCategory, FxEngine, FxEvent, Handle, RenderFrame, Vec2,
};
use tracing::trace;

use super::{Widget, build_engine};
use crate::config::ScreenShakeConfig;
use crate::error::HudError;

/// 单个震屏实例对相机的贡献
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraOffset {
    pub offset: Vec2,
    pub intensity: f32,
}

#[derive(Debug, Default)]
pub struct ShakeRenderer;

impl EffectRenderer for ShakeRenderer {
    type Payload = CameraOffset;
    type Data = ();

    fn create(&mut self, _handle: Handle) -> CameraOffset {
        CameraOffset::default()
    }

    fn render(&mut self, camera: &mut CameraOffset, frame: &RenderFrame<'_, ()>) {
        if let Some(sample) = frame.shake {
            camera.offset = sample.offset;
            camera.intensity = sample.intensity;
        }
    }

    fn reset(&mut self, camera: &mut CameraOffset) {
        *camera = CameraOffset::default();
    }
}

/// 震屏控件
pub struct ScreenShake {
    engine: FxEngine<ShakeRenderer>,
    config: ScreenShakeConfig,
}

impl ScreenShake {
    pub fn new(config: &ScreenShakeConfig) -> Result<Self, HudError> {
        config
            .shake
            .validate()
            .map_err(|source| HudError::InvalidConfig {
                widget: "screen_shake",
                source,
            })?;
        Ok(Self {
            engine: build_engine("screen_shake", &config.widget, ShakeRenderer)?,
            config: config.clone(),
        })
    }

    /// 当前相机总偏移
    pub fn offset(&self) -> Vec2 {
        self.engine
            .busy_payloads()
            .fold(Vec2::ZERO, |acc, camera| acc + camera.offset)
    }

    /// 当前最大强度
    pub fn intensity(&self) -> f32 {
        self.engine
            .busy_payloads()
            .map(|camera| camera.intensity)
            .fold(0.0, f32::max)
    }
}

impl Widget for ScreenShake {
    type Renderer = ShakeRenderer;

    fn name(&self) -> &'static str {
        "screen_shake"
    }

    fn engine(&self) -> &FxEngine<ShakeRenderer> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut FxEngine<ShakeRenderer> {
        &mut self.engine
    }

    fn handle(&mut self, event: &FxEvent) {
        if !self.config.widget.enabled || event.category != EventCategory::DamageTaken {
            return;
        }
        let damage = event.magnitude.unwrap_or(0.0);
        let magnitude = (damage * self.config.magnitude_scale).min(self.config.max_magnitude);
        if magnitude <= self.config.shake.epsilon {
            trace!(damage, "伤害过小，不触发震屏");
            return;
        }

        let duration_ms = self
            .config
            .widget
            .duration_ms
            .min(self.config.shake.duration_ms);
        let mut request = EffectRequest::new(duration_ms, ())
            .with_magnitude(magnitude)
            .with_shake(self.config.shake.clone());
        if let Some(direction) = event.direction {
            request = request.with_direction(direction.to_vec2());
        }
        self.engine.schedule(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fx_runtime::{DecayMode, Direction, EffectEvent};

    fn hit(damage: f32) -> FxEvent {
        FxEvent::new(EventCategory::DamageTaken)
            .with_magnitude(damage)
            .with_direction(Direction::Angle(0.0))
    }

    #[test]
    fn test_shake_decays_to_rest() {
        let mut shake = ScreenShake::new(&ScreenShakeConfig::default()).unwrap();
        shake.handle(&hit(40.0));
        assert_eq!(shake.intensity(), 2.0);

        let mut last = shake.intensity();
        let mut settled = false;
        for _ in 0..40 {
            let events = shake.tick(16.0);
            let now = shake.intensity();
            assert!(now <= last);
            last = now;
            if events.iter().any(|e| matches!(e, EffectEvent::Completed(_))) {
                settled = true;
                break;
            }
        }
        assert!(settled);
        assert_eq!(shake.offset(), Vec2::ZERO);
    }

    #[test]
    fn test_small_hits_ignored() {
        let mut shake = ScreenShake::new(&ScreenShakeConfig::default()).unwrap();
        shake.handle(&hit(0.1));
        assert_eq!(shake.stats().active_count, 0);
    }

    #[test]
    fn test_magnitude_clamped() {
        let mut shake = ScreenShake::new(&ScreenShakeConfig::default()).unwrap();
        shake.handle(&hit(10_000.0));
        assert_eq!(shake.intensity(), 3.0);
    }

    #[test]
    fn test_exponential_mode() {
        let mut config = ScreenShakeConfig::default();
        config.shake.decay_mode = DecayMode::Exponential;
        let mut shake = ScreenShake::new(&config).unwrap();
        shake.handle(&hit(20.0));

        shake.tick(16.0);
        let first = shake.intensity();
        shake.tick(16.0);
        assert!(shake.intensity() < first);
    }

    #[test]
    fn test_pause_freezes_offset() {
        let mut shake = ScreenShake::new(&ScreenShakeConfig::default()).unwrap();
        shake.handle(&hit(40.0));
        shake.tick(32.0);
        let frozen = shake.offset();

        shake.pause_all();
        shake.tick(500.0);
        assert_eq!(shake.offset(), frozen);
        assert_eq!(shake.stats().active_count, 1);
    }
}
