//! # HUD
//!
//! 基于 `fx-runtime` 的 FPS HUD 控件集合。
//!
//! ## 架构概述
//!
//! [`Hud`] 持有一个注入的 [`EventSource`] 和全部控件。每帧：
//!
//! ```text
//! EventSource ──poll──► Hud::dispatch ──► Widget::handle ──► FxEngine::schedule
//!                          │
//!                     Hud::tick(delta_ms)
//!                          │
//!                          ▼
//!               Widget::tick ──► Vec<WidgetEvent>
//! ```
//!
//! 非法事件（缺字段、数值非法）记录警告后丢弃，不影响其他事件。
//!
//! ## 模块结构
//!
//! - [`bus`]：单线程事件总线
//! - [`config`]：HUD 配置（JSON 读写）
//! - [`error`]：错误类型
//! - [`logging`]：tracing 订阅器初始化
//! - [`widgets`]：各控件

pub mod bus;
pub mod config;
pub mod error;
pub mod logging;
pub mod widgets;

use std::collections::BTreeMap;

use fx_runtime::{EffectEvent, EngineStats, EventCategory, EventSource, FxEvent, VignetteSample};
use serde::Serialize;
use tracing::{debug, info, warn};

pub use bus::{EventBus, EventPublisher};
pub use config::{HudConfig, IndicatorConfig, ScreenShakeConfig, WidgetConfig};
pub use error::HudError;
pub use logging::init_tracing;
pub use widgets::{
    AchievementBanners, DamageIndicators, DamageNumbers, HealthVignette, HitMarker, KillFeed,
    Notifications, ScreenShake, Widget,
};

/// 某个控件在本帧产生的生命周期事件
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetEvent {
    pub widget: &'static str,
    pub event: EffectEvent,
}

/// HUD 统计快照
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HudStats {
    pub widgets: BTreeMap<&'static str, EngineStats>,
    /// 暗角当前输出强度
    pub vignette: f32,
    /// 因校验失败被丢弃的事件数
    pub rejected_events: u64,
}

/// HUD 根对象
pub struct Hud {
    source: Box<dyn EventSource>,
    hit_marker: HitMarker,
    damage_numbers: DamageNumbers,
    damage_indicators: DamageIndicators,
    screen_shake: ScreenShake,
    vignette: HealthVignette,
    notifications: Notifications,
    kill_feed: KillFeed,
    achievements: AchievementBanners,
    rejected_events: u64,
    paused: bool,
    disposed: bool,
}

impl Hud {
    /// 按配置创建全部控件
    pub fn new(config: &HudConfig, source: Box<dyn EventSource>) -> Result<Self, HudError> {
        config.validate()?;
        let hud = Self {
            source,
            hit_marker: HitMarker::new(&config.hit_marker)?,
            damage_numbers: DamageNumbers::new(&config.damage_numbers)?,
            damage_indicators: DamageIndicators::new(&config.damage_indicators)?,
            screen_shake: ScreenShake::new(&config.screen_shake)?,
            vignette: HealthVignette::new(&config.vignette)?,
            notifications: Notifications::new(&config.notifications)?,
            kill_feed: KillFeed::new(&config.kill_feed)?,
            achievements: AchievementBanners::new(&config.achievements)?,
            rejected_events: 0,
            paused: false,
            disposed: false,
        };
        info!("HUD 初始化完成");
        Ok(hud)
    }

    /// 把一个事件路由到关心它的控件
    pub fn dispatch(&mut self, event: &FxEvent) {
        if self.disposed {
            return;
        }
        if let Err(e) = event.validate() {
            warn!(error = %e, "忽略非法事件");
            self.rejected_events += 1;
            return;
        }

        debug!(category = %event.category, "分发事件");
        match event.category {
            EventCategory::DamageDealt => {
                self.hit_marker.handle(event);
                self.damage_numbers.handle(event);
            }
            EventCategory::KillConfirmed => {
                self.hit_marker.handle(event);
                self.kill_feed.handle(event);
            }
            EventCategory::DamageTaken => {
                self.damage_indicators.handle(event);
                self.screen_shake.handle(event);
            }
            EventCategory::Footstep => self.damage_indicators.handle(event),
            EventCategory::Notification => self.notifications.handle(event),
            EventCategory::Achievement => self.achievements.handle(event),
            EventCategory::HealthChanged => self.vignette.handle(event),
        }
    }

    /// 推进一帧
    ///
    /// 先取走事件源中的全部事件并分发，再推进各控件。
    pub fn tick(&mut self, delta_ms: f64) -> Vec<WidgetEvent> {
        if self.disposed {
            return Vec::new();
        }
        for event in self.source.poll() {
            self.dispatch(&event);
        }

        let mut events = Vec::new();
        collect(&mut events, &mut self.hit_marker, delta_ms);
        collect(&mut events, &mut self.damage_numbers, delta_ms);
        collect(&mut events, &mut self.damage_indicators, delta_ms);
        collect(&mut events, &mut self.screen_shake, delta_ms);
        collect(&mut events, &mut self.notifications, delta_ms);
        collect(&mut events, &mut self.kill_feed, delta_ms);
        collect(&mut events, &mut self.achievements, delta_ms);
        self.vignette.tick(delta_ms);
        events
    }

    /// 暂停全部控件（如打开菜单）
    pub fn pause_all(&mut self) {
        if self.paused || self.disposed {
            return;
        }
        self.paused = true;
        self.hit_marker.pause_all();
        self.damage_numbers.pause_all();
        self.damage_indicators.pause_all();
        self.screen_shake.pause_all();
        self.vignette.pause_all();
        self.notifications.pause_all();
        self.kill_feed.pause_all();
        self.achievements.pause_all();
        info!("HUD 已暂停");
    }

    pub fn resume_all(&mut self) {
        if !self.paused || self.disposed {
            return;
        }
        self.paused = false;
        self.hit_marker.resume_all();
        self.damage_numbers.resume_all();
        self.damage_indicators.resume_all();
        self.screen_shake.resume_all();
        self.vignette.resume_all();
        self.notifications.resume_all();
        self.kill_feed.resume_all();
        self.achievements.resume_all();
        info!("HUD 已恢复");
    }

    /// 释放全部控件，之后的 tick / dispatch 不再生效
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.hit_marker.dispose();
        self.damage_numbers.dispose();
        self.damage_indicators.dispose();
        self.screen_shake.dispose();
        self.vignette.dispose();
        self.notifications.dispose();
        self.kill_feed.dispose();
        self.achievements.dispose();
        info!("HUD 已释放");
    }

    pub fn stats(&self) -> HudStats {
        let mut widgets = BTreeMap::new();
        widgets.insert(self.hit_marker.name(), self.hit_marker.stats());
        widgets.insert(self.damage_numbers.name(), self.damage_numbers.stats());
        widgets.insert(self.damage_indicators.name(), self.damage_indicators.stats());
        widgets.insert(self.screen_shake.name(), self.screen_shake.stats());
        widgets.insert(self.notifications.name(), self.notifications.stats());
        widgets.insert(self.kill_feed.name(), self.kill_feed.stats());
        widgets.insert(self.achievements.name(), self.achievements.stats());
        HudStats {
            widgets,
            vignette: self.vignette.output(),
            rejected_events: self.rejected_events,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn vignette_sample(&self) -> Option<VignetteSample> {
        self.vignette.last_sample()
    }

    pub fn hit_marker(&self) -> &HitMarker {
        &self.hit_marker
    }

    pub fn damage_numbers(&self) -> &DamageNumbers {
        &self.damage_numbers
    }

    pub fn damage_indicators(&self) -> &DamageIndicators {
        &self.damage_indicators
    }

    pub fn screen_shake(&self) -> &ScreenShake {
        &self.screen_shake
    }

    pub fn vignette(&self) -> &HealthVignette {
        &self.vignette
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    pub fn kill_feed(&self) -> &KillFeed {
        &self.kill_feed
    }

    pub fn achievements(&self) -> &AchievementBanners {
        &self.achievements
    }
}

fn collect<W: Widget>(out: &mut Vec<WidgetEvent>, widget: &mut W, delta_ms: f64) {
    let name = widget.name();
    out.extend(
        widget
            .tick(delta_ms)
            .into_iter()
            .map(|event| WidgetEvent {
                widget: name,
                event,
            }),
    );
}
