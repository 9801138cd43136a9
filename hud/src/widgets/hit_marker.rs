//! # HitMarker 控件
//!
//! 命中准星标记。新命中挤掉最早的标记，暴击放大，击杀换色，击穿护甲时叠加碎盾图案。

use fx_runtime::{
    EffectRenderer, EffectRequest, EventCategory, EventFlags, FxEngine, FxEvent, Handle,
    ProgressCurve, RenderFrame,
};
use tracing::trace;

use super::{Widget, build_engine};
use crate::config::WidgetConfig;
use crate::error::HudError;

const CRITICAL_SCALE: f32 = 1.4;
/// 出现瞬间的额外放大比例
const POP_SCALE: f32 = 0.3;

/// 标记精灵
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSprite {
    pub visible: bool,
    pub opacity: f32,
    pub scale: f32,
    pub critical: bool,
    pub kill: bool,
    pub armor_break: bool,
}

impl MarkerSprite {
    fn hidden() -> Self {
        Self {
            visible: false,
            opacity: 0.0,
            scale: 1.0,
            critical: false,
            kill: false,
            armor_break: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct MarkerRenderer;

impl EffectRenderer for MarkerRenderer {
    type Payload = MarkerSprite;
    type Data = ();

    fn create(&mut self, _handle: Handle) -> MarkerSprite {
        MarkerSprite::hidden()
    }

    fn render(&mut self, sprite: &mut MarkerSprite, frame: &RenderFrame<'_, ()>) {
        let critical = frame.flags.contains(EventFlags::CRITICAL);
        let base = if critical { CRITICAL_SCALE } else { 1.0 };

        sprite.visible = true;
        sprite.opacity = frame.value;
        sprite.scale = base * (1.0 + POP_SCALE * (1.0 - frame.progress));
        sprite.critical = critical;
        sprite.kill = frame.flags.contains(EventFlags::KILL);
        sprite.armor_break = frame.flags.contains(EventFlags::ARMOR_BREAK);
    }

    fn reset(&mut self, sprite: &mut MarkerSprite) {
        *sprite = MarkerSprite::hidden();
    }
}

/// 命中标记控件
pub struct HitMarker {
    engine: FxEngine<MarkerRenderer>,
    enabled: bool,
    duration_ms: f64,
}

impl HitMarker {
    pub fn new(config: &WidgetConfig) -> Result<Self, HudError> {
        Ok(Self {
            engine: build_engine("hit_marker", config, MarkerRenderer)?,
            enabled: config.enabled,
            duration_ms: config.duration_ms,
        })
    }
}

impl Widget for HitMarker {
    type Renderer = MarkerRenderer;

    fn name(&self) -> &'static str {
        "hit_marker"
    }

    fn engine(&self) -> &FxEngine<MarkerRenderer> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut FxEngine<MarkerRenderer> {
        &mut self.engine
    }

    fn handle(&mut self, event: &FxEvent) {
        if !self.enabled {
            return;
        }
        let flags = match event.category {
            EventCategory::DamageDealt => event.flags,
            EventCategory::KillConfirmed => event.flags | EventFlags::KILL,
            _ => return,
        };

        let request = EffectRequest::new(self.duration_ms, ())
            .with_magnitude(event.magnitude.unwrap_or(1.0))
            .with_curve(ProgressCurve::LinearFade)
            .with_flags(flags);
        let ticket = self.engine.schedule(request);
        trace!(?ticket, "命中标记");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HudConfig;

    fn marker() -> HitMarker {
        HitMarker::new(&HudConfig::default().hit_marker).unwrap()
    }

    #[test]
    fn test_critical_hit_is_larger() {
        let mut marker = marker();
        marker.handle(&FxEvent::new(EventCategory::DamageDealt).with_magnitude(10.0));
        marker.handle(
            &FxEvent::new(EventCategory::DamageDealt)
                .with_magnitude(30.0)
                .with_flags(EventFlags::CRITICAL),
        );

        let visible = marker.visible();
        assert_eq!(visible.len(), 2);
        let normal = visible.iter().find(|s| !s.critical).unwrap();
        let critical = visible.iter().find(|s| s.critical).unwrap();
        assert!(critical.scale > normal.scale);
    }

    #[test]
    fn test_armor_break_marked() {
        let mut marker = marker();
        marker.handle(
            &FxEvent::new(EventCategory::DamageDealt)
                .with_magnitude(15.0)
                .with_flags(EventFlags::ARMOR_BREAK | EventFlags::CRITICAL),
        );
        let visible = marker.visible();
        assert!(visible[0].armor_break);
        assert!(visible[0].critical);

        // 复用的句柄不残留上一次的标记
        marker.tick(250.0);
        marker.handle(&FxEvent::new(EventCategory::DamageDealt).with_magnitude(5.0));
        assert!(!marker.visible()[0].armor_break);
    }

    #[test]
    fn test_fades_and_recycles() {
        let mut marker = marker();
        marker.handle(&FxEvent::new(EventCategory::KillConfirmed).with_text("击杀"));
        assert!(marker.visible()[0].kill);

        marker.tick(125.0);
        assert!((marker.visible()[0].opacity - 0.5).abs() < 1e-4);

        marker.tick(125.0);
        assert!(marker.visible().is_empty());
    }

    #[test]
    fn test_ignores_other_categories() {
        let mut marker = marker();
        marker.handle(&FxEvent::new(EventCategory::Footstep));
        assert_eq!(marker.stats().active_count, 0);
    }

    #[test]
    fn test_burst_keeps_cap() {
        let mut marker = marker();
        for _ in 0..10 {
            marker.handle(&FxEvent::new(EventCategory::DamageDealt).with_magnitude(1.0));
        }
        assert_eq!(marker.stats().active_count, 4);
    }
}
