//! # Widgets 模块
//!
//! 各个 HUD 控件。每个控件持有一个 [`FxEngine`]，只负责两件事：
//!
//! - 把领域事件翻译成 [`EffectRequest`](fx_runtime::EffectRequest)
//! - 提供 [`EffectRenderer`] 把帧参数写到自己的可视资源上
//!
//! 计时、池化、并发上限和堆叠都交给引擎。

mod achievement;
mod damage_indicator;
mod damage_numbers;
mod hit_marker;
mod kill_feed;
mod notification;
mod shake;
mod vignette;

pub use achievement::{AchievementBanners, Banner, BannerRenderer};
pub use damage_indicator::{DamageIndicators, IndicatorArc, IndicatorKind, IndicatorRenderer};
pub use damage_numbers::{DamageNumberRenderer, DamageNumbers, DamageText};
pub use hit_marker::{HitMarker, MarkerRenderer, MarkerSprite};
pub use kill_feed::{FeedEntry, FeedRenderer, KillFeed};
pub use notification::{Notifications, Toast, ToastRenderer};
pub use shake::{CameraOffset, ScreenShake, ShakeRenderer};
pub use vignette::HealthVignette;

use fx_runtime::{EffectEvent, EffectRenderer, EngineStats, FxEngine, FxEvent};

use crate::config::WidgetConfig;
use crate::error::HudError;

/// 基于调度引擎的控件
///
/// 除 `handle` 外的方法都有转发到引擎的默认实现。
pub trait Widget {
    type Renderer: EffectRenderer;

    /// 控件名称（用于日志和统计）
    fn name(&self) -> &'static str;

    fn engine(&self) -> &FxEngine<Self::Renderer>;

    fn engine_mut(&mut self) -> &mut FxEngine<Self::Renderer>;

    /// 处理一个已校验的事件
    ///
    /// 不关心的类别直接忽略。
    fn handle(&mut self, event: &FxEvent);

    fn tick(&mut self, delta_ms: f64) -> Vec<EffectEvent> {
        self.engine_mut().tick(delta_ms)
    }

    fn pause_all(&mut self) {
        self.engine_mut().pause_all();
    }

    fn resume_all(&mut self) {
        self.engine_mut().resume_all();
    }

    fn dispose(&mut self) {
        self.engine_mut().dispose();
    }

    fn stats(&self) -> EngineStats {
        self.engine().stats()
    }

    /// 当前可见（正在使用）的资源
    fn visible(&self) -> Vec<&<Self::Renderer as EffectRenderer>::Payload> {
        self.engine().busy_payloads().collect()
    }
}

/// 按控件配置创建引擎
pub(crate) fn build_engine<R: EffectRenderer>(
    name: &'static str,
    config: &WidgetConfig,
    renderer: R,
) -> Result<FxEngine<R>, HudError> {
    config.validate(name)?;
    Ok(FxEngine::new(config.engine.clone(), renderer)?)
}
