//! # Stack 模块
//!
//! 把同一关联键上快速连续到达的事件合并到一个活跃实例中。
//!
//! 命中堆叠时直接改写已有实例并立即重绘，不向资源池借用新句柄，
//! 也不在生命周期中登记新实例。子事件超过 `stack_limit` 后标签折叠为
//! "次数×(合计)"。

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace};

use crate::backpressure::BackpressureController;
use crate::config::StackConfig;
use crate::event::EventFlags;
use crate::lifecycle::{EffectEvent, EffectInstance, Ticket};
use crate::render::EffectRenderer;

/// 堆叠标签
#[derive(Debug, Clone, PartialEq)]
pub enum StackLabel {
    /// 逐个列出子事件，如 `10 + 10 + 5`
    Enumerated { magnitudes: Vec<f32>, total: f32 },
    /// 折叠为次数与合计，如 `5×(50)`
    Collapsed { count: usize, latest: f32, total: f32 },
}

impl StackLabel {
    /// 单个事件的标签
    pub fn single(magnitude: f32) -> Self {
        StackLabel::Enumerated {
            magnitudes: vec![magnitude],
            total: magnitude,
        }
    }

    pub fn total(&self) -> f32 {
        match self {
            StackLabel::Enumerated { total, .. } | StackLabel::Collapsed { total, .. } => *total,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            StackLabel::Enumerated { magnitudes, .. } => magnitudes.len(),
            StackLabel::Collapsed { count, .. } => *count,
        }
    }

    /// 最近一次子事件的强度
    pub fn latest(&self) -> f32 {
        match self {
            StackLabel::Enumerated { magnitudes, .. } => magnitudes.last().copied().unwrap_or(0.0),
            StackLabel::Collapsed { latest, .. } => *latest,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        matches!(self, StackLabel::Collapsed { .. })
    }
}

impl fmt::Display for StackLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackLabel::Enumerated { magnitudes, .. } => {
                for (i, magnitude) in magnitudes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" + ")?;
                    }
                    write_amount(f, *magnitude)?;
                }
                Ok(())
            }
            StackLabel::Collapsed { count, total, .. } => {
                write!(f, "{count}×(")?;
                write_amount(f, *total)?;
                f.write_str(")")
            }
        }
    }
}

/// 整数值不带小数，其他保留一位
fn write_amount(f: &mut fmt::Formatter<'_>, value: f32) -> fmt::Result {
    if (value - value.round()).abs() < 1e-3 {
        write!(f, "{}", value.round() as i64)
    } else {
        write!(f, "{value:.1}")
    }
}

/// 堆叠中的一个子事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubEvent {
    pub magnitude: f32,
    pub flags: EventFlags,
    pub time_ms: f64,
}

/// 一个关联键的堆叠状态
#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    pub correlation_key: String,
    pub events: Vec<SubEvent>,
    pub last_event_ms: f64,
    pub total_magnitude: f32,
    /// 被改写的实例
    pub linked: Ticket,
}

impl StackEntry {
    fn new(correlation_key: String, first: SubEvent, linked: Ticket) -> Self {
        Self {
            correlation_key,
            events: vec![first],
            last_event_ms: first.time_ms,
            total_magnitude: first.magnitude,
            linked,
        }
    }

    fn push(&mut self, event: SubEvent) {
        self.total_magnitude += event.magnitude;
        self.last_event_ms = event.time_ms;
        self.events.push(event);
    }

    /// 所有子事件标记的并集
    pub fn flags(&self) -> EventFlags {
        self.events
            .iter()
            .fold(EventFlags::NONE, |acc, e| acc | e.flags)
    }

    /// 按上限生成标签
    pub fn label(&self, stack_limit: usize) -> StackLabel {
        if self.events.len() > stack_limit {
            StackLabel::Collapsed {
                count: self.events.len(),
                latest: self.events.last().map_or(0.0, |e| e.magnitude),
                total: self.total_magnitude,
            }
        } else {
            StackLabel::Enumerated {
                magnitudes: self.events.iter().map(|e| e.magnitude).collect(),
                total: self.total_magnitude,
            }
        }
    }

    fn is_fresh(&self, now_ms: f64, threshold_ms: f64) -> bool {
        now_ms - self.last_event_ms <= threshold_ms
    }
}

/// 堆叠聚合器
///
/// 包装 [`BackpressureController`]：未命中堆叠的请求原样交给背压控制。
pub struct StackAggregator<R: EffectRenderer> {
    config: StackConfig,
    backpressure: BackpressureController<R>,
    entries: HashMap<String, StackEntry>,
}

impl<R: EffectRenderer> fmt::Debug for StackAggregator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackAggregator")
            .field("config", &self.config)
            .field("backpressure", &self.backpressure)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<R: EffectRenderer> StackAggregator<R> {
    pub fn new(config: StackConfig, backpressure: BackpressureController<R>) -> Self {
        Self {
            config,
            backpressure,
            entries: HashMap::new(),
        }
    }

    /// 受理请求
    ///
    /// 命中堆叠时返回被改写实例的票据；否则返回背压控制的受理结果。
    pub fn submit(&mut self, mut instance: EffectInstance<R::Data>, now_ms: f64) -> Option<Ticket> {
        let key = match (&instance.correlation_key, self.config.enabled) {
            (Some(key), true) => key.clone(),
            _ => return self.backpressure.submit(instance, now_ms).accepted(),
        };

        let sub_event = SubEvent {
            magnitude: instance.magnitude,
            flags: instance.flags,
            time_ms: now_ms,
        };

        if let Some(entry) = self.entries.get_mut(&key)
            && entry.is_fresh(now_ms, self.config.threshold_ms)
            && self.backpressure.is_live(entry.linked)
        {
            entry.push(sub_event);
            let linked = entry.linked;
            let count = entry.events.len();
            let total = entry.total_magnitude;
            let flags = entry.flags();
            let label = entry.label(self.config.stack_limit);
            let data = instance.data;

            self.backpressure
                .rewrite(linked, now_ms, self.config.refresh_on_stack, |target| {
                    target.magnitude = total;
                    target.flags = flags;
                    target.label = Some(label);
                    target.data = data;
                });
            self.backpressure
                .lifecycle_mut()
                .emit(EffectEvent::Stacked { ticket: linked, count });
            trace!(key = %key, count, total, "事件合并到已有实例");
            return Some(linked);
        }

        instance.label = Some(StackLabel::single(instance.magnitude));
        let ticket = self.backpressure.submit(instance, now_ms).accepted()?;
        self.entries
            .insert(key.clone(), StackEntry::new(key, sub_event, ticket));
        Some(ticket)
    }

    /// 清除过期或实例已释放的堆叠状态
    pub fn sweep(&mut self, now_ms: f64) -> usize {
        let threshold = self.config.threshold_ms;
        let backpressure = &self.backpressure;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.is_fresh(now_ms, threshold) && backpressure.is_live(entry.linked));
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!(purged, "清除过期的堆叠状态");
        }
        purged
    }

    /// 推进时间并清扫
    pub fn advance(&mut self, now_ms: f64) {
        self.backpressure.advance(now_ms);
        self.sweep(now_ms);
    }

    pub fn cancel(&mut self, ticket: Ticket, now_ms: f64) -> bool {
        self.backpressure.cancel(ticket, now_ms)
    }

    pub fn entry(&self, key: &str) -> Option<&StackEntry> {
        self.entries.get(key)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn backpressure(&self) -> &BackpressureController<R> {
        &self.backpressure
    }

    pub fn backpressure_mut(&mut self) -> &mut BackpressureController<R> {
        &mut self.backpressure
    }

    pub fn dispose(&mut self) {
        self.entries.clear();
        self.backpressure.dispose();
    }
}
