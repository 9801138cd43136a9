//! # DamageNumbers 控件
//!
//! 浮动伤害数字。同一目标的连续命中按关联 ID 堆叠到同一个数字上。

use fx_runtime::{
    EasingFunction, EffectRenderer, EffectRequest, EventCategory, EventFlags, FxEngine, FxEvent,
    Handle, RenderFrame,
};

use super::{Widget, build_engine};
use crate::config::WidgetConfig;
use crate::error::HudError;

/// 整个生命周期内上浮的距离（像素）
const RISE_PX: f32 = 48.0;

/// 伤害数字
#[derive(Debug, Clone, PartialEq)]
pub struct DamageText {
    pub text: String,
    pub opacity: f32,
    /// 相对出生点的上浮距离
    pub rise: f32,
    /// 最近一击的伤害，堆叠后仍单独显示
    pub last_hit: f32,
    pub critical: bool,
}

impl DamageText {
    fn hidden() -> Self {
        Self {
            text: String::new(),
            opacity: 0.0,
            rise: 0.0,
            last_hit: 0.0,
            critical: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct DamageNumberRenderer;

impl EffectRenderer for DamageNumberRenderer {
    type Payload = DamageText;
    type Data = ();

    fn create(&mut self, _handle: Handle) -> DamageText {
        DamageText::hidden()
    }

    fn render(&mut self, text: &mut DamageText, frame: &RenderFrame<'_, ()>) {
        (text.text, text.last_hit) = match frame.label {
            Some(label) => (label.to_string(), label.latest()),
            None => (format!("{}", frame.magnitude.round() as i64), frame.magnitude),
        };
        // 前半段基本不透明，后半段加速淡出
        text.opacity = 1.0 - EasingFunction::EaseInQuad.apply(frame.progress);
        text.rise = RISE_PX * EasingFunction::EaseOutCubic.apply(frame.progress);
        text.critical = frame.flags.contains(EventFlags::CRITICAL);
    }

    fn reset(&mut self, text: &mut DamageText) {
        *text = DamageText::hidden();
    }
}

/// 伤害数字控件
pub struct DamageNumbers {
    engine: FxEngine<DamageNumberRenderer>,
    enabled: bool,
    duration_ms: f64,
}

impl DamageNumbers {
    pub fn new(config: &WidgetConfig) -> Result<Self, HudError> {
        Ok(Self {
            engine: build_engine("damage_numbers", config, DamageNumberRenderer)?,
            enabled: config.enabled,
            duration_ms: config.duration_ms,
        })
    }
}

impl Widget for DamageNumbers {
    type Renderer = DamageNumberRenderer;

    fn name(&self) -> &'static str {
        "damage_numbers"
    }

    fn engine(&self) -> &FxEngine<DamageNumberRenderer> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut FxEngine<DamageNumberRenderer> {
        &mut self.engine
    }

    fn handle(&mut self, event: &FxEvent) {
        if !self.enabled || event.category != EventCategory::DamageDealt {
            return;
        }
        let Some(magnitude) = event.magnitude else {
            return;
        };

        let mut request = EffectRequest::new(self.duration_ms, ())
            .with_magnitude(magnitude)
            .with_flags(event.flags);
        if let Some(id) = &event.correlation_id {
            request = request.with_correlation(id.clone());
        }
        self.engine.schedule(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HudConfig;

    fn hit(target: &str, amount: f32) -> FxEvent {
        FxEvent::new(EventCategory::DamageDealt)
            .with_magnitude(amount)
            .with_correlation(target)
    }

    #[test]
    fn test_hits_on_same_target_stack() {
        let mut numbers = DamageNumbers::new(&HudConfig::default().damage_numbers).unwrap();
        numbers.handle(&hit("enemy-7", 10.0));
        numbers.tick(100.0);
        numbers.handle(&hit("enemy-7", 12.0));

        let visible = numbers.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].last_hit, 12.0);
        insta::assert_snapshot!(visible[0].text.as_str(), @"10 + 12");
    }

    #[test]
    fn test_different_targets_separate() {
        let mut numbers = DamageNumbers::new(&HudConfig::default().damage_numbers).unwrap();
        numbers.handle(&hit("enemy-1", 10.0));
        numbers.handle(&hit("enemy-2", 10.0));
        assert_eq!(numbers.visible().len(), 2);
    }

    #[test]
    fn test_number_rises_while_fading() {
        let mut numbers = DamageNumbers::new(&HudConfig::default().damage_numbers).unwrap();
        numbers.handle(&FxEvent::new(EventCategory::DamageDealt).with_magnitude(42.0));
        assert_eq!(numbers.visible()[0].text, "42");

        numbers.tick(450.0);
        let text = numbers.visible()[0].clone();
        assert!(text.rise > 0.0 && text.rise < RISE_PX);
        assert!(text.opacity < 1.0);
    }
}
