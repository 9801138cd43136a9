//! # Lifecycle 模块
//!
//! 每个实例的定时状态机，暂停/恢复安全。
//!
//! ## 核心设计
//!
//! - 实例登记在按票据排序的表中，由单一的 [`EffectLifecycle::advance`] 轮询
//! - 剩余时长显式保存，不依赖延迟回调捕获的状态
//! - 完成由可取消的一次性定时器驱动：暂停时取消，恢复时按剩余时长重新登记
//!
//! 因此实例在 Active 状态下累计的时长恰好等于 `duration`，与暂停次数和暂停期间
//! 流逝的真实时间无关。
//!
//! ## 重入
//!
//! 渲染回调只拿到资源本身，拿不到调度器，所以回调中无法重入 `schedule`。
//! 需要在一次遍历中释放的实例先收集票据，遍历结束后再统一释放。

mod curve;
mod instance;

use std::collections::BTreeMap;

use tracing::debug;

use crate::decay::NoiseField;
use crate::pool::ResourcePool;
use crate::render::{EffectRenderer, RenderFrame};
use crate::timer::TimerQueue;

pub use curve::{EasingFunction, ProgressCurve};
pub use instance::{EffectInstance, EffectState, Ticket};

/// 调度器事件
#[derive(Debug, Clone, PartialEq)]
pub enum EffectEvent {
    /// 实例激活（已借到句柄）
    Started(Ticket),
    /// 新的子事件被合并进已有实例
    Stacked { ticket: Ticket, count: usize },
    /// 实例自然结束
    Completed(Ticket),
    /// 实例被取消
    Cancelled(Ticket),
    /// 实例因并发上限被淘汰
    Evicted(Ticket),
    /// 请求被丢弃（池耗尽或队列溢出）
    Dropped(Ticket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReleaseReason {
    Completed,
    Cancelled,
    Evicted,
}

/// 生命周期管理器
///
/// 持有资源池、定时器队列和所有持有句柄的实例。
pub struct EffectLifecycle<R: EffectRenderer> {
    pool: ResourcePool<R>,
    timers: TimerQueue,
    instances: BTreeMap<Ticket, EffectInstance<R::Data>>,
    noise: NoiseField,
    paused: bool,
    last_release_ms: f64,
    events: Vec<EffectEvent>,
}

impl<R: EffectRenderer> std::fmt::Debug for EffectLifecycle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectLifecycle")
            .field("pool", &self.pool)
            .field("instances", &self.instances.len())
            .field("timers", &self.timers.len())
            .field("paused", &self.paused)
            .finish()
    }
}

impl<R: EffectRenderer> EffectLifecycle<R> {
    pub fn new(pool: ResourcePool<R>, noise: NoiseField) -> Self {
        Self {
            pool,
            timers: TimerQueue::new(),
            instances: BTreeMap::new(),
            noise,
            paused: false,
            last_release_ms: f64::NEG_INFINITY,
            events: Vec::new(),
        }
    }

    // ========== 状态迁移 ==========

    /// 借出句柄并激活实例（Scheduled → Active）
    ///
    /// 池耗尽时返回 `false` 并产生 `Dropped` 事件。生命周期处于暂停状态时，
    /// 新实例以 Paused 状态登记，恢复后才开始计时。
    pub fn start(&mut self, mut instance: EffectInstance<R::Data>, now_ms: f64) -> bool {
        let ticket = instance.ticket;
        let Some(handle) = self.pool.acquire() else {
            debug!(%ticket, "没有可用的资源句柄，效果被丢弃");
            self.events.push(EffectEvent::Dropped(ticket));
            return false;
        };

        instance.handle = Some(handle);
        instance.start_ms = now_ms;
        instance.remaining_ms = instance.duration_ms;
        if self.paused {
            instance.state = EffectState::Paused;
        } else {
            instance.state = EffectState::Active;
            instance.timer = Some(self.timers.schedule(now_ms + instance.duration_ms, ticket));
        }

        self.instances.insert(ticket, instance);
        self.events.push(EffectEvent::Started(ticket));

        let settled = match self.instances.get_mut(&ticket) {
            Some(instance) => !Self::render_instance(&mut self.pool, &self.noise, instance, now_ms),
            None => false,
        };
        if settled {
            self.finish(ticket, ReleaseReason::Completed, now_ms);
        }
        true
    }

    /// 推进所有 Active 实例
    ///
    /// 先触发到期的完成定时器，再为仍在播放的实例计算进度曲线与衰减并渲染。
    pub fn advance(&mut self, now_ms: f64) {
        for ticket in self.timers.pop_due(now_ms) {
            self.finish(ticket, ReleaseReason::Completed, now_ms);
        }

        let mut settled = Vec::new();
        for instance in self.instances.values_mut() {
            if instance.state != EffectState::Active {
                continue;
            }
            if !Self::render_instance(&mut self.pool, &self.noise, instance, now_ms) {
                settled.push(instance.ticket);
            }
        }

        for ticket in settled {
            self.finish(ticket, ReleaseReason::Completed, now_ms);
        }
    }

    /// 暂停所有 Active 实例
    ///
    /// 记录剩余时长并取消完成定时器。
    pub fn pause(&mut self, now_ms: f64) {
        if self.paused {
            return;
        }
        self.paused = true;

        for instance in self.instances.values_mut() {
            if instance.state != EffectState::Active {
                continue;
            }
            let elapsed = (now_ms - instance.start_ms).clamp(0.0, instance.duration_ms);
            instance.remaining_ms = instance.duration_ms - elapsed;
            instance.state = EffectState::Paused;
            if let Some(timer) = instance.timer.take() {
                self.timers.cancel(timer);
            }
        }
    }

    /// 恢复所有 Paused 实例
    ///
    /// 重新计算 `start = now - (duration - remaining)`，并按剩余时长登记新的定时器。
    pub fn resume(&mut self, now_ms: f64) {
        if !self.paused {
            return;
        }
        self.paused = false;

        for instance in self.instances.values_mut() {
            if instance.state != EffectState::Paused {
                continue;
            }
            instance.start_ms = now_ms - (instance.duration_ms - instance.remaining_ms);
            instance.state = EffectState::Active;
            instance.timer = Some(
                self.timers
                    .schedule(now_ms + instance.remaining_ms, instance.ticket),
            );
        }
    }

    /// 取消实例；未知票据是 no-op
    pub fn cancel(&mut self, ticket: Ticket, now_ms: f64) -> bool {
        let cancelled = self.finish(ticket, ReleaseReason::Cancelled, now_ms);
        if !cancelled {
            debug!(%ticket, "取消了不存在或已释放的实例，忽略");
        }
        cancelled
    }

    /// 淘汰最早登记的持有句柄的实例
    pub fn evict_oldest(&mut self, now_ms: f64) -> Option<Ticket> {
        let oldest = self
            .instances
            .values()
            .find(|i| i.state.holds_handle())
            .map(|i| i.ticket)?;
        self.finish(oldest, ReleaseReason::Evicted, now_ms);
        Some(oldest)
    }

    /// 原地改写实例并立即重绘
    ///
    /// `refresh` 为真时实例从头开始计时（剩余时长恢复为 duration）。
    /// 不借用新句柄，也不登记新实例。
    pub fn rewrite(
        &mut self,
        ticket: Ticket,
        now_ms: f64,
        refresh: bool,
        update: impl FnOnce(&mut EffectInstance<R::Data>),
    ) -> bool {
        let Some(instance) = self.instances.get_mut(&ticket) else {
            return false;
        };

        update(instance);

        if refresh {
            instance.start_ms = now_ms;
            instance.remaining_ms = instance.duration_ms;
            if let Some(shake) = instance.shake.as_mut() {
                shake.restart(instance.magnitude);
            }
            if instance.state == EffectState::Active {
                if let Some(timer) = instance.timer.take() {
                    self.timers.cancel(timer);
                }
                instance.timer = Some(self.timers.schedule(now_ms + instance.duration_ms, ticket));
            }
        }

        Self::render_instance(&mut self.pool, &self.noise, instance, now_ms);
        true
    }

    /// 释放所有实例与资源池
    ///
    /// 不产生事件。
    pub fn dispose(&mut self) {
        for (_, mut instance) in std::mem::take(&mut self.instances) {
            if let Some(handle) = instance.handle.take() {
                self.pool.release(handle);
            }
        }
        self.timers.clear();
        self.events.clear();
        self.pool.dispose();
    }

    // ========== 查询方法 ==========

    /// 持有句柄的实例数量（Active + Paused）
    pub fn live_count(&self) -> usize {
        self.instances
            .values()
            .filter(|i| i.state.holds_handle())
            .count()
    }

    /// 正在播放的实例数量
    pub fn active_count(&self) -> usize {
        self.instances
            .values()
            .filter(|i| i.state == EffectState::Active)
            .count()
    }

    pub fn contains(&self, ticket: Ticket) -> bool {
        self.instances.contains_key(&ticket)
    }

    pub fn get(&self, ticket: Ticket) -> Option<&EffectInstance<R::Data>> {
        self.instances.get(&ticket)
    }

    /// 按插入顺序遍历实例
    pub fn instances(&self) -> impl Iterator<Item = &EffectInstance<R::Data>> {
        self.instances.values()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// 最近一次释放句柄的时刻
    pub fn last_release_ms(&self) -> f64 {
        self.last_release_ms
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn pool(&self) -> &ResourcePool<R> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ResourcePool<R> {
        &mut self.pool
    }

    /// 取出并清空事件队列
    pub fn take_events(&mut self) -> Vec<EffectEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: EffectEvent) {
        self.events.push(event);
    }

    // ========== 内部实现 ==========

    /// 移除实例、取消定时器并归还句柄
    fn finish(&mut self, ticket: Ticket, reason: ReleaseReason, now_ms: f64) -> bool {
        let Some(mut instance) = self.instances.remove(&ticket) else {
            return false;
        };

        if let Some(timer) = instance.timer.take() {
            self.timers.cancel(timer);
        }
        if let Some(handle) = instance.handle.take() {
            self.pool.release(handle);
        }
        instance.state = EffectState::Released;
        self.last_release_ms = now_ms;

        let event = match reason {
            ReleaseReason::Completed => EffectEvent::Completed(ticket),
            ReleaseReason::Cancelled => EffectEvent::Cancelled(ticket),
            ReleaseReason::Evicted => {
                debug!(%ticket, "并发已达上限，淘汰最早的实例");
                EffectEvent::Evicted(ticket)
            }
        };
        self.events.push(event);
        true
    }

    /// 采样一个实例并渲染到它的资源上
    ///
    /// 返回 `false` 表示震屏强度已低于阈值，实例应被释放。
    fn render_instance(
        pool: &mut ResourcePool<R>,
        noise: &NoiseField,
        instance: &mut EffectInstance<R::Data>,
        now_ms: f64,
    ) -> bool {
        let Some(handle) = instance.handle else {
            return true;
        };

        let elapsed = instance.elapsed_at(now_ms);
        let progress = instance.progress_at(now_ms);
        if instance.state == EffectState::Active {
            instance.remaining_ms = instance.duration_ms - elapsed;
        }

        let duration = instance.duration_ms;
        let shake = instance
            .shake
            .as_mut()
            .map(|shake| shake.sample(elapsed, duration, noise));

        let frame = RenderFrame {
            ticket: instance.ticket,
            progress,
            value: instance.curve.sample(progress),
            magnitude: instance.magnitude,
            elapsed_ms: elapsed,
            remaining_ms: instance.remaining_ms,
            direction: instance.direction,
            flags: instance.flags,
            label: instance.label.as_ref(),
            shake,
            data: &instance.data,
        };
        pool.render(handle, &frame);

        !shake.is_some_and(|s| s.settled)
    }
}
