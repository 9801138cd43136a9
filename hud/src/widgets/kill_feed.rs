//! # KillFeed 控件
//!
//! 击杀信息列表。条数达到上限时挤掉最早的一条。

use fx_runtime::{
    EffectEvent, EffectRenderer, EffectRequest, EventCategory, EventFlags, FxEngine, FxEvent,
    Handle, RenderFrame,
};

use super::notification::enter_hold_exit;
use super::{Widget, build_engine};
use crate::config::WidgetConfig;
use crate::error::HudError;

/// 击杀信息行
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedEntry {
    pub text: String,
    pub opacity: f32,
    pub headshot: bool,
}

#[derive(Debug, Default)]
pub struct FeedRenderer;

impl EffectRenderer for FeedRenderer {
    type Payload = FeedEntry;
    type Data = String;

    fn create(&mut self, _handle: Handle) -> FeedEntry {
        FeedEntry::default()
    }

    fn render(&mut self, entry: &mut FeedEntry, frame: &RenderFrame<'_, String>) {
        if entry.text != *frame.data {
            entry.text.clone_from(frame.data);
        }
        entry.opacity = enter_hold_exit(frame.progress).0;
        entry.headshot = frame.flags.contains(EventFlags::HEADSHOT);
    }

    fn reset(&mut self, entry: &mut FeedEntry) {
        *entry = FeedEntry::default();
    }
}

/// 击杀信息控件
pub struct KillFeed {
    engine: FxEngine<FeedRenderer>,
    enabled: bool,
    duration_ms: f64,
    /// 被挤掉的条目总数
    evicted: u64,
}

impl KillFeed {
    pub fn new(config: &WidgetConfig) -> Result<Self, HudError> {
        Ok(Self {
            engine: build_engine("kill_feed", config, FeedRenderer)?,
            enabled: config.enabled,
            duration_ms: config.duration_ms,
            evicted: 0,
        })
    }

    /// 当前显示的行（最新的在前）
    pub fn lines(&self) -> Vec<&str> {
        let mut lines: Vec<_> = self
            .engine
            .instances()
            .map(|instance| instance.data.as_str())
            .collect();
        lines.reverse();
        lines
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl Widget for KillFeed {
    type Renderer = FeedRenderer;

    fn name(&self) -> &'static str {
        "kill_feed"
    }

    fn engine(&self) -> &FxEngine<FeedRenderer> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut FxEngine<FeedRenderer> {
        &mut self.engine
    }

    fn handle(&mut self, event: &FxEvent) {
        if !self.enabled || event.category != EventCategory::KillConfirmed {
            return;
        }
        let Some(text) = &event.text else {
            return;
        };
        let request = EffectRequest::new(self.duration_ms, text.clone()).with_flags(event.flags);
        self.engine.schedule(request);
    }

    fn tick(&mut self, delta_ms: f64) -> Vec<EffectEvent> {
        let events = self.engine.tick(delta_ms);
        self.evicted += events
            .iter()
            .filter(|e| matches!(e, EffectEvent::Evicted(_)))
            .count() as u64;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HudConfig;

    fn kill(text: &str) -> FxEvent {
        FxEvent::new(EventCategory::KillConfirmed).with_text(text)
    }

    #[test]
    fn test_newest_first_and_capped() {
        let mut feed = KillFeed::new(&HudConfig::default().kill_feed).unwrap();
        for i in 1..=6 {
            feed.handle(&kill(&format!("玩家 击败了 敌人{i}")));
        }
        feed.tick(16.0);

        let lines = feed.lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "玩家 击败了 敌人6");
        assert_eq!(lines[4], "玩家 击败了 敌人2");
        assert_eq!(feed.evicted(), 1);
    }

    #[test]
    fn test_headshot_flag_rendered() {
        let mut feed = KillFeed::new(&HudConfig::default().kill_feed).unwrap();
        feed.handle(&kill("爆头").with_flags(EventFlags::HEADSHOT));
        assert!(feed.visible()[0].headshot);
    }

    #[test]
    fn test_entries_expire() {
        let mut feed = KillFeed::new(&HudConfig::default().kill_feed).unwrap();
        feed.handle(&kill("a"));
        feed.tick(5000.0);
        assert!(feed.lines().is_empty());
    }
}
