//! # Achievement 控件
//!
//! 成就横幅。同一时刻只显示一条，后续的排队，
//! 上一条消失后冷却一段时间再弹出下一条。

use fx_runtime::{
    EasingFunction, EffectRenderer, EffectRequest, EventCategory, FxEngine, FxEvent, Handle,
    RenderFrame,
};

use super::notification::enter_hold_exit;
use super::{Widget, build_engine};
use crate::config::WidgetConfig;
use crate::error::HudError;

/// 弹出动画占总时长的比例
const POP: f32 = 0.15;

/// 成就横幅
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Banner {
    pub title: String,
    pub opacity: f32,
    pub scale: f32,
}

#[derive(Debug, Default)]
pub struct BannerRenderer;

impl EffectRenderer for BannerRenderer {
    type Payload = Banner;
    type Data = String;

    fn create(&mut self, _handle: Handle) -> Banner {
        Banner::default()
    }

    fn render(&mut self, banner: &mut Banner, frame: &RenderFrame<'_, String>) {
        if banner.title != *frame.data {
            banner.title.clone_from(frame.data);
        }
        banner.opacity = enter_hold_exit(frame.progress).0;
        banner.scale = if frame.progress < POP {
            EasingFunction::EaseOutBack.apply(frame.progress / POP)
        } else {
            1.0
        };
    }

    fn reset(&mut self, banner: &mut Banner) {
        *banner = Banner::default();
    }
}

/// 成就横幅控件
pub struct AchievementBanners {
    engine: FxEngine<BannerRenderer>,
    enabled: bool,
    duration_ms: f64,
}

impl AchievementBanners {
    pub fn new(config: &WidgetConfig) -> Result<Self, HudError> {
        Ok(Self {
            engine: build_engine("achievements", config, BannerRenderer)?,
            enabled: config.enabled,
            duration_ms: config.duration_ms,
        })
    }

    /// 正在显示的成就
    pub fn current(&self) -> Option<&str> {
        self.engine
            .instances()
            .next()
            .map(|instance| instance.data.as_str())
    }

    pub fn pending(&self) -> usize {
        self.engine.stats().queued_count
    }
}

impl Widget for AchievementBanners {
    type Renderer = BannerRenderer;

    fn name(&self) -> &'static str {
        "achievements"
    }

    fn engine(&self) -> &FxEngine<BannerRenderer> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut FxEngine<BannerRenderer> {
        &mut self.engine
    }

    fn handle(&mut self, event: &FxEvent) {
        if !self.enabled || event.category != EventCategory::Achievement {
            return;
        }
        if let Some(title) = &event.text {
            self.engine
                .schedule(EffectRequest::new(self.duration_ms, title.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HudConfig;

    fn unlock(title: &str) -> FxEvent {
        FxEvent::new(EventCategory::Achievement).with_text(title)
    }

    #[test]
    fn test_one_banner_at_a_time() {
        let mut banners = AchievementBanners::new(&HudConfig::default().achievements).unwrap();
        banners.handle(&unlock("首杀"));
        banners.handle(&unlock("连杀"));
        assert_eq!(banners.current(), Some("首杀"));
        assert_eq!(banners.pending(), 1);

        // 冷却从上一条派发算起，第一条结束时早已满足
        banners.tick(3999.0);
        assert_eq!(banners.current(), Some("首杀"));
        banners.tick(1.0);
        assert_eq!(banners.current(), Some("连杀"));
        assert_eq!(banners.pending(), 0);
    }

    #[test]
    fn test_banner_pops_then_settles() {
        let mut banners = AchievementBanners::new(&HudConfig::default().achievements).unwrap();
        banners.handle(&unlock("神枪手"));
        assert!(banners.visible()[0].scale.abs() < 1e-5);

        // 弹出过程中会略微超过 1
        banners.tick(400.0);
        assert!(banners.visible()[0].scale > 1.0);
        banners.tick(600.0);
        assert_eq!(banners.visible()[0].scale, 1.0);
        assert_eq!(banners.visible()[0].title, "神枪手");
    }
}
