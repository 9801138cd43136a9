//! # Notification 控件
//!
//! 右上角通知。同时最多显示几条，其余排队，按间隔依次滑入。

use fx_runtime::{
    EasingFunction, EffectRenderer, EffectRequest, EventCategory, FxEngine, FxEvent, Handle,
    RenderFrame,
};

use super::{Widget, build_engine};
use crate::config::WidgetConfig;
use crate::error::HudError;

/// 滑入阶段占总时长的比例
const ENTER: f32 = 0.1;
/// 淡出阶段占总时长的比例
const EXIT: f32 = 0.2;
/// 滑入距离（像素）
const SLIDE_PX: f32 = 80.0;

/// 通知条
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub text: String,
    pub opacity: f32,
    /// 距最终位置的水平偏移
    pub slide: f32,
}

impl Toast {
    fn hidden() -> Self {
        Self {
            text: String::new(),
            opacity: 0.0,
            slide: SLIDE_PX,
        }
    }
}

/// 出现 → 停留 → 消失 的不透明度与滑入偏移
pub(crate) fn enter_hold_exit(progress: f32) -> (f32, f32) {
    if progress < ENTER {
        let t = EasingFunction::EaseOutQuad.apply(progress / ENTER);
        (t, SLIDE_PX * (1.0 - t))
    } else if progress > 1.0 - EXIT {
        let t = (progress - (1.0 - EXIT)) / EXIT;
        (1.0 - EasingFunction::EaseInQuad.apply(t), 0.0)
    } else {
        (1.0, 0.0)
    }
}

#[derive(Debug, Default)]
pub struct ToastRenderer;

impl EffectRenderer for ToastRenderer {
    type Payload = Toast;
    type Data = String;

    fn create(&mut self, _handle: Handle) -> Toast {
        Toast::hidden()
    }

    fn render(&mut self, toast: &mut Toast, frame: &RenderFrame<'_, String>) {
        if toast.text != *frame.data {
            toast.text.clone_from(frame.data);
        }
        let (opacity, slide) = enter_hold_exit(frame.progress);
        toast.opacity = opacity;
        toast.slide = slide;
    }

    fn reset(&mut self, toast: &mut Toast) {
        *toast = Toast::hidden();
    }
}

/// 通知控件
pub struct Notifications {
    engine: FxEngine<ToastRenderer>,
    enabled: bool,
    duration_ms: f64,
}

impl Notifications {
    pub fn new(config: &WidgetConfig) -> Result<Self, HudError> {
        Ok(Self {
            engine: build_engine("notifications", config, ToastRenderer)?,
            enabled: config.enabled,
            duration_ms: config.duration_ms,
        })
    }

    /// 直接投递一条通知
    pub fn push(&mut self, text: impl Into<String>) {
        if self.enabled {
            self.engine
                .schedule(EffectRequest::new(self.duration_ms, text.into()));
        }
    }

    /// 当前可见的通知文本（按出现顺序）
    pub fn texts(&self) -> Vec<&str> {
        self.engine
            .instances()
            .map(|instance| instance.data.as_str())
            .collect()
    }
}

impl Widget for Notifications {
    type Renderer = ToastRenderer;

    fn name(&self) -> &'static str {
        "notifications"
    }

    fn engine(&self) -> &FxEngine<ToastRenderer> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut FxEngine<ToastRenderer> {
        &mut self.engine
    }

    fn handle(&mut self, event: &FxEvent) {
        if event.category != EventCategory::Notification {
            return;
        }
        if let Some(text) = &event.text {
            self.push(text.clone());
        }
    }
}
