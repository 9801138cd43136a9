//! # DamageIndicator 控件
//!
//! 屏幕边缘的方向弧：受击方向用二次衰减淡出，脚步声用正弦脉动提示。
//! 没有方向的事件不显示。

use fx_runtime::{
    EffectRenderer, EffectRequest, EventCategory, FxEngine, FxEvent, Handle, ProgressCurve,
    RenderFrame,
};

use super::{Widget, build_engine};
use crate::config::IndicatorConfig;
use crate::error::HudError;

/// 受击弧的最小/最大粗细（像素）
const MIN_THICKNESS: f32 = 4.0;
const MAX_THICKNESS: f32 = 16.0;
/// 伤害达到该值时弧线最粗
const FULL_DAMAGE: f32 = 50.0;

/// 指示器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndicatorKind {
    #[default]
    Damage,
    Footstep,
}

/// 方向弧
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorArc {
    pub visible: bool,
    /// 弧的中心角（弧度，0 指向屏幕右侧）
    pub angle: f32,
    pub opacity: f32,
    pub thickness: f32,
    pub kind: IndicatorKind,
}

impl IndicatorArc {
    fn hidden() -> Self {
        Self {
            visible: false,
            angle: 0.0,
            opacity: 0.0,
            thickness: MIN_THICKNESS,
            kind: IndicatorKind::Damage,
        }
    }
}

#[derive(Debug, Default)]
pub struct IndicatorRenderer;

impl EffectRenderer for IndicatorRenderer {
    type Payload = IndicatorArc;
    type Data = IndicatorKind;

    fn create(&mut self, _handle: Handle) -> IndicatorArc {
        IndicatorArc::hidden()
    }

    fn render(&mut self, arc: &mut IndicatorArc, frame: &RenderFrame<'_, IndicatorKind>) {
        let Some(direction) = frame.direction else {
            return;
        };
        arc.visible = true;
        arc.angle = direction.angle();
        arc.opacity = frame.value;
        arc.kind = *frame.data;
        arc.thickness = match arc.kind {
            IndicatorKind::Damage => {
                let weight = (frame.magnitude / FULL_DAMAGE).clamp(0.0, 1.0);
                MIN_THICKNESS + (MAX_THICKNESS - MIN_THICKNESS) * weight
            }
            IndicatorKind::Footstep => MIN_THICKNESS,
        };
    }

    fn reset(&mut self, arc: &mut IndicatorArc) {
        *arc = IndicatorArc::hidden();
    }
}

/// 方向指示控件
pub struct DamageIndicators {
    engine: FxEngine<IndicatorRenderer>,
    config: IndicatorConfig,
}

impl DamageIndicators {
    pub fn new(config: &IndicatorConfig) -> Result<Self, HudError> {
        Ok(Self {
            engine: build_engine("damage_indicators", &config.widget, IndicatorRenderer)?,
            config: config.clone(),
        })
    }
}

impl Widget for DamageIndicators {
    type Renderer = IndicatorRenderer;

    fn name(&self) -> &'static str {
        "damage_indicators"
    }

    fn engine(&self) -> &FxEngine<IndicatorRenderer> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut FxEngine<IndicatorRenderer> {
        &mut self.engine
    }

    fn handle(&mut self, event: &FxEvent) {
        if !self.config.widget.enabled {
            return;
        }
        let Some(direction) = event.direction else {
            return;
        };

        let request = match event.category {
            EventCategory::DamageTaken => {
                EffectRequest::new(self.config.widget.duration_ms, IndicatorKind::Damage)
                    .with_curve(ProgressCurve::QuadraticFalloff)
            }
            EventCategory::Footstep => {
                EffectRequest::new(self.config.footstep_duration_ms, IndicatorKind::Footstep)
                    .with_curve(ProgressCurve::SinePulse {
                        cycles: self.config.footstep_pulses,
                    })
            }
            _ => return,
        };

        let mut request = request
            .with_magnitude(event.magnitude.unwrap_or(1.0))
            .with_direction(direction.to_vec2());
        if let Some(id) = &event.correlation_id {
            request = request.with_correlation(id.clone());
        }
        self.engine.schedule(request);
    }
}
