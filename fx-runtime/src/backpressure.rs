//! # Backpressure 模块
//!
//! 并发上限控制。达到 `max_concurrent` 后按 [`OverflowPolicy`] 处理新请求：
//!
//! - `EvictOldest`：立即淘汰最早登记的实例（按插入顺序，不看优先级），再派发新请求
//! - `Queue`：追加到有界 FIFO 队列，由 [`BackpressureController::drain`] 在
//!   冷却与间隔允许时逐个派发；队列超长时先丢弃最早排队的请求
//!
//! `Queue` 策略下的有效上限是 `max_concurrent` 与资源池可达容量中较小的一个，
//! 池借不出句柄时请求继续排队而不是被丢弃。冷却按相邻两次派发计时，
//! 立即派发也计入。

use std::collections::VecDeque;

use tracing::debug;

use crate::config::{BackpressureConfig, OverflowPolicy};
use crate::lifecycle::{EffectEvent, EffectInstance, EffectLifecycle, EffectState, Ticket};
use crate::render::EffectRenderer;

/// 请求的受理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 已借到句柄并激活
    Dispatched(Ticket),
    /// 进入等待队列
    Queued(Ticket),
    /// 被丢弃（池耗尽或队列溢出）
    Dropped(Ticket),
}

impl Admission {
    /// 请求是否仍然有效（可以被取消）
    pub fn accepted(&self) -> Option<Ticket> {
        match *self {
            Admission::Dispatched(ticket) | Admission::Queued(ticket) => Some(ticket),
            Admission::Dropped(_) => None,
        }
    }
}

/// 背压控制器
pub struct BackpressureController<R: EffectRenderer> {
    config: BackpressureConfig,
    lifecycle: EffectLifecycle<R>,
    queue: VecDeque<EffectInstance<R::Data>>,
    /// 最近一次派发（含立即派发），用于冷却
    last_dispatch_ms: f64,
    /// 最近一次从队列派发，用于间隔
    last_drain_ms: f64,
}

impl<R: EffectRenderer> std::fmt::Debug for BackpressureController<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackpressureController")
            .field("config", &self.config)
            .field("lifecycle", &self.lifecycle)
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl<R: EffectRenderer> BackpressureController<R> {
    pub fn new(config: BackpressureConfig, lifecycle: EffectLifecycle<R>) -> Self {
        Self {
            config,
            lifecycle,
            queue: VecDeque::new(),
            last_dispatch_ms: f64::NEG_INFINITY,
            last_drain_ms: f64::NEG_INFINITY,
        }
    }

    /// 受理一个请求
    pub fn submit(&mut self, instance: EffectInstance<R::Data>, now_ms: f64) -> Admission {
        // 队列非空时新请求必须排在后面，保持 FIFO
        if self.has_room() && self.queue.is_empty() {
            return self.dispatch(instance, now_ms);
        }

        match self.config.overflow_policy {
            OverflowPolicy::EvictOldest => {
                while self.lifecycle.live_count() >= self.config.max_concurrent {
                    if self.lifecycle.evict_oldest(now_ms).is_none() {
                        break;
                    }
                }
                self.dispatch(instance, now_ms)
            }
            OverflowPolicy::Queue => self.enqueue(instance),
        }
    }

    /// 从队列头部派发请求
    ///
    /// 暂停期间不派发。每次派发需满足：距上次派发不少于 `cooldown_ms`，
    /// 距上次从队列派发不少于 `spacing_ms`，且资源池能借出句柄。
    pub fn drain(&mut self, now_ms: f64) -> usize {
        if self.lifecycle.is_paused() {
            return 0;
        }

        let mut dispatched = 0;
        while !self.queue.is_empty() && self.has_room() {
            if now_ms - self.last_dispatch_ms < self.config.cooldown_ms {
                break;
            }
            if now_ms - self.last_drain_ms < self.config.spacing_ms {
                break;
            }
            let Some(instance) = self.queue.pop_front() else {
                break;
            };
            self.last_drain_ms = now_ms;
            if matches!(self.dispatch(instance, now_ms), Admission::Dispatched(_)) {
                dispatched += 1;
            }
        }
        dispatched
    }

    /// 推进生命周期，然后尝试派发排队请求
    pub fn advance(&mut self, now_ms: f64) {
        self.lifecycle.advance(now_ms);
        self.drain(now_ms);
    }

    /// 取消排队中或活跃的请求
    pub fn cancel(&mut self, ticket: Ticket, now_ms: f64) -> bool {
        if let Some(pos) = self.queue.iter().position(|i| i.ticket == ticket) {
            self.queue.remove(pos);
            self.lifecycle.emit(EffectEvent::Cancelled(ticket));
            return true;
        }
        self.lifecycle.cancel(ticket, now_ms)
    }

    /// 原地改写排队中或活跃的实例
    ///
    /// 排队中的实例只更新数据，激活时才会渲染。
    pub fn rewrite(
        &mut self,
        ticket: Ticket,
        now_ms: f64,
        refresh: bool,
        update: impl FnOnce(&mut EffectInstance<R::Data>),
    ) -> bool {
        if let Some(instance) = self.queue.iter_mut().find(|i| i.ticket == ticket) {
            update(instance);
            return true;
        }
        self.lifecycle.rewrite(ticket, now_ms, refresh, update)
    }

    /// 票据是否仍然有效（排队中或持有句柄）
    pub fn is_live(&self, ticket: Ticket) -> bool {
        self.lifecycle.contains(ticket) || self.queue.iter().any(|i| i.ticket == ticket)
    }

    pub fn state(&self, ticket: Ticket) -> Option<EffectState> {
        if let Some(instance) = self.lifecycle.get(ticket) {
            return Some(instance.state);
        }
        self.queue
            .iter()
            .find(|i| i.ticket == ticket)
            .map(|i| i.state)
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// 排队中的票据（按派发顺序）
    pub fn queued_tickets(&self) -> impl Iterator<Item = Ticket> + '_ {
        self.queue.iter().map(|i| i.ticket)
    }

    pub fn config(&self) -> &BackpressureConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &EffectLifecycle<R> {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut EffectLifecycle<R> {
        &mut self.lifecycle
    }

    /// 清空队列并释放所有实例
    pub fn dispose(&mut self) {
        self.queue.clear();
        self.lifecycle.dispose();
    }

    /// 现在能否再激活一个实例
    ///
    /// `EvictOldest` 只看并发上限，池耗尽照常报告为 `Dropped`。
    fn has_room(&self) -> bool {
        if self.lifecycle.live_count() >= self.config.max_concurrent {
            return false;
        }
        match self.config.overflow_policy {
            OverflowPolicy::EvictOldest => true,
            OverflowPolicy::Queue => self.lifecycle.pool().can_acquire(),
        }
    }

    fn dispatch(&mut self, instance: EffectInstance<R::Data>, now_ms: f64) -> Admission {
        let ticket = instance.ticket;
        if self.lifecycle.start(instance, now_ms) {
            self.last_dispatch_ms = now_ms;
            Admission::Dispatched(ticket)
        } else {
            Admission::Dropped(ticket)
        }
    }

    fn enqueue(&mut self, instance: EffectInstance<R::Data>) -> Admission {
        let ticket = instance.ticket;
        self.queue.push_back(instance);

        let mut admission = Admission::Queued(ticket);
        while self.queue.len() > self.config.max_queue_len {
            let Some(dropped) = self.queue.pop_front() else {
                break;
            };
            debug!(ticket = %dropped.ticket, max_queue_len = self.config.max_queue_len, "队列已满，丢弃最早排队的请求");
            self.lifecycle.emit(EffectEvent::Dropped(dropped.ticket));
            if dropped.ticket == ticket {
                admission = Admission::Dropped(ticket);
            }
        }
        admission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::decay::NoiseField;
    use crate::pool::ResourcePool;
    use crate::pool::tests::TestRenderer;

    fn controller(config: BackpressureConfig, pool_size: usize) -> BackpressureController<TestRenderer> {
        let pool = ResourcePool::new(PoolConfig::fixed(pool_size), TestRenderer::default()).unwrap();
        BackpressureController::new(config, EffectLifecycle::new(pool, NoiseField::new(3)))
    }

    fn instance(id: u64) -> EffectInstance<()> {
        EffectInstance::scheduled(Ticket::new(id), 1000.0, ())
    }

    fn queue_config(max_concurrent: usize) -> BackpressureConfig {
        BackpressureConfig {
            max_concurrent,
            overflow_policy: OverflowPolicy::Queue,
            max_queue_len: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_evict_oldest_keeps_cap() {
        let config = BackpressureConfig {
            max_concurrent: 8,
            ..Default::default()
        };
        let mut bp = controller(config, 8);
        for id in 1..=9 {
            let admission = bp.submit(instance(id), 0.0);
            assert_eq!(admission, Admission::Dispatched(Ticket::new(id)));
        }

        assert_eq!(bp.lifecycle().live_count(), 8);
        assert!(!bp.is_live(Ticket::new(1)));
        assert!((2..=9).all(|id| bp.is_live(Ticket::new(id))));

        let events = bp.lifecycle_mut().take_events();
        assert!(events.contains(&EffectEvent::Evicted(Ticket::new(1))));
    }

    #[test]
    fn test_queue_fifo() {
        let mut bp = controller(queue_config(1), 4);
        assert_eq!(bp.submit(instance(1), 0.0), Admission::Dispatched(Ticket::new(1)));
        assert_eq!(bp.submit(instance(2), 0.0), Admission::Queued(Ticket::new(2)));
        assert_eq!(bp.submit(instance(3), 0.0), Admission::Queued(Ticket::new(3)));

        // 实例 1 完成后队头被派发
        bp.advance(1000.0);
        assert!(!bp.is_live(Ticket::new(1)));
        assert_eq!(bp.state(Ticket::new(2)), Some(EffectState::Active));
        assert_eq!(bp.state(Ticket::new(3)), Some(EffectState::Scheduled));
        assert_eq!(bp.queued_count(), 1);
    }

    #[test]
    fn test_queue_overflow_drops_oldest_queued() {
        let mut bp = controller(queue_config(1), 4);
        bp.submit(instance(1), 0.0);
        bp.submit(instance(2), 0.0);
        bp.submit(instance(3), 0.0);
        assert_eq!(bp.submit(instance(4), 0.0), Admission::Queued(Ticket::new(4)));

        let queued: Vec<_> = bp.queued_tickets().collect();
        assert_eq!(queued, vec![Ticket::new(3), Ticket::new(4)]);
        // 活跃实例不受影响
        assert!(bp.is_live(Ticket::new(1)));
        let events = bp.lifecycle_mut().take_events();
        assert!(events.contains(&EffectEvent::Dropped(Ticket::new(2))));
    }

    #[test]
    fn test_cooldown_and_spacing() {
        let config = BackpressureConfig {
            cooldown_ms: 100.0,
            spacing_ms: 50.0,
            max_queue_len: 8,
            ..queue_config(1)
        };
        let mut bp = controller(config, 4);
        bp.submit(EffectInstance::scheduled(Ticket::new(1), 40.0, ()), 0.0);
        bp.submit(instance(2), 0.0);

        // 40ms 释放，但距 0ms 的派发不足 100ms
        bp.advance(40.0);
        assert_eq!(bp.queued_count(), 1);
        bp.advance(99.0);
        assert_eq!(bp.queued_count(), 1);
        bp.advance(100.0);
        assert_eq!(bp.queued_count(), 0);
        assert_eq!(bp.state(Ticket::new(2)), Some(EffectState::Active));
    }

    #[test]
    fn test_cooldown_counts_from_dispatch_not_release() {
        let config = BackpressureConfig {
            cooldown_ms: 300.0,
            ..queue_config(1)
        };
        let mut bp = controller(config, 4);
        bp.submit(instance(1), 0.0);
        bp.submit(instance(2), 0.0);

        // 取消不会重新开始冷却
        bp.cancel(Ticket::new(1), 250.0);
        bp.drain(250.0);
        bp.drain(299.0);
        assert_eq!(bp.queued_count(), 1);
        bp.drain(300.0);
        assert_eq!(bp.state(Ticket::new(2)), Some(EffectState::Active));

        // 下一个排队请求从 300ms 的派发开始计时
        bp.submit(instance(3), 300.0);
        bp.cancel(Ticket::new(2), 310.0);
        bp.drain(599.0);
        assert_eq!(bp.queued_count(), 1);
        bp.drain(600.0);
        assert_eq!(bp.queued_count(), 0);
    }

    #[test]
    fn test_immediate_dispatch_starts_cooldown() {
        let config = BackpressureConfig {
            cooldown_ms: 100.0,
            ..queue_config(1)
        };
        let mut bp = controller(config, 4);
        bp.submit(instance(1), 500.0);
        bp.cancel(Ticket::new(1), 510.0);
        // 活跃数为 0 且队列为空时立即派发
        assert_eq!(bp.submit(instance(2), 520.0), Admission::Dispatched(Ticket::new(2)));
        bp.submit(instance(3), 520.0);
        bp.cancel(Ticket::new(2), 530.0);
        bp.drain(619.0);
        assert_eq!(bp.queued_count(), 1);
        bp.drain(620.0);
        assert_eq!(bp.state(Ticket::new(3)), Some(EffectState::Active));
    }

    #[test]
    fn test_queue_waits_for_pool_capacity() {
        let config = BackpressureConfig {
            max_queue_len: 8,
            ..queue_config(8)
        };
        let mut bp = controller(config, 2);
        let admissions: Vec<_> = (1..=4).map(|id| bp.submit(instance(id), 0.0)).collect();
        assert_eq!(
            admissions,
            vec![
                Admission::Dispatched(Ticket::new(1)),
                Admission::Dispatched(Ticket::new(2)),
                Admission::Queued(Ticket::new(3)),
                Admission::Queued(Ticket::new(4)),
            ]
        );
        let events = bp.lifecycle_mut().take_events();
        assert!(!events.iter().any(|e| matches!(e, EffectEvent::Dropped(_))));

        // 池满时 drain 不会弹出队头
        bp.drain(10.0);
        assert_eq!(bp.queued_count(), 2);

        bp.cancel(Ticket::new(1), 20.0);
        assert_eq!(bp.drain(20.0), 1);
        assert_eq!(bp.state(Ticket::new(3)), Some(EffectState::Active));
        assert_eq!(bp.state(Ticket::new(4)), Some(EffectState::Scheduled));
    }

    #[test]
    fn test_spacing_between_queued_items() {
        let config = BackpressureConfig {
            spacing_ms: 50.0,
            max_queue_len: 8,
            ..queue_config(2)
        };
        let mut bp = controller(config, 4);
        bp.submit(instance(1), 0.0);
        bp.submit(instance(2), 0.0);
        bp.submit(instance(3), 0.0);
        bp.submit(instance(4), 0.0);
        assert_eq!(bp.queued_count(), 2);

        bp.cancel(Ticket::new(1), 10.0);
        bp.cancel(Ticket::new(2), 10.0);
        bp.drain(10.0);
        assert_eq!(bp.queued_count(), 1);
        bp.drain(40.0);
        assert_eq!(bp.queued_count(), 1);
        bp.drain(60.0);
        assert_eq!(bp.queued_count(), 0);
    }

    #[test]
    fn test_no_drain_while_paused() {
        let mut bp = controller(queue_config(1), 4);
        bp.submit(instance(1), 0.0);
        bp.submit(instance(2), 0.0);
        bp.lifecycle_mut().pause(10.0);
        bp.cancel(Ticket::new(1), 20.0);
        bp.advance(30.0);
        assert_eq!(bp.queued_count(), 1);

        bp.lifecycle_mut().resume(40.0);
        bp.advance(40.0);
        assert_eq!(bp.queued_count(), 0);
    }

    #[test]
    fn test_cancel_queued() {
        let mut bp = controller(queue_config(1), 4);
        bp.submit(instance(1), 0.0);
        bp.submit(instance(2), 0.0);
        assert!(bp.cancel(Ticket::new(2), 0.0));
        assert!(!bp.cancel(Ticket::new(2), 0.0));
        assert_eq!(bp.queued_count(), 0);
    }

    #[test]
    fn test_pool_exhaustion_reported_as_dropped() {
        let config = BackpressureConfig {
            max_concurrent: 4,
            ..Default::default()
        };
        let mut bp = controller(config, 1);
        bp.submit(instance(1), 0.0);
        assert_eq!(bp.submit(instance(2), 0.0), Admission::Dropped(Ticket::new(2)));
        assert_eq!(Admission::Dropped(Ticket::new(2)).accepted(), None);
    }
}
