//! # Engine 模块
//!
//! 调度器对外的唯一入口。
//!
//! ```text
//! schedule ─▶ StackAggregator ─▶ BackpressureController ─▶ EffectLifecycle ─▶ ResourcePool
//!                                                              ▲
//! tick(delta) ─────────────────────────────────────────────────┘
//! ```
//!
//! 时钟由 `tick(delta_ms)` 累加得到，不读取系统时间。暂停期间时钟照常前进，
//! 但 Paused 实例不推进。

use std::f32::consts::TAU;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, warn};

use crate::backpressure::BackpressureController;
use crate::config::{EngineConfig, ShakeConfig};
use crate::decay::{NoiseField, ShakeState};
use crate::error::FxResult;
use crate::event::EventFlags;
use crate::lifecycle::{
    EffectEvent, EffectInstance, EffectLifecycle, EffectState, ProgressCurve, Ticket,
};
use crate::math::Vec2;
use crate::pool::ResourcePool;
use crate::render::EffectRenderer;
use crate::stack::StackAggregator;

/// 随机方向使用独立的种子流，避免与噪声表相关
const DIRECTION_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// 调度请求
#[derive(Debug, Clone)]
pub struct EffectRequest<D> {
    /// 持续时间（毫秒），必须为正
    pub duration_ms: f64,
    /// 堆叠用的关联键
    pub correlation_key: Option<String>,
    /// 强度，缺省为 1.0
    pub magnitude: Option<f32>,
    pub curve: ProgressCurve,
    pub direction: Option<Vec2>,
    /// 设置后实例按震屏衰减推进，强度低于 epsilon 时提前释放
    pub shake: Option<ShakeConfig>,
    pub flags: EventFlags,
    /// 交给渲染回调的数据
    pub render_data: D,
}

impl<D> EffectRequest<D> {
    pub fn new(duration_ms: f64, render_data: D) -> Self {
        Self {
            duration_ms,
            correlation_key: None,
            magnitude: None,
            curve: ProgressCurve::default(),
            direction: None,
            shake: None,
            flags: EventFlags::NONE,
            render_data,
        }
    }

    pub fn with_correlation(mut self, key: impl Into<String>) -> Self {
        self.correlation_key = Some(key.into());
        self
    }

    pub fn with_magnitude(mut self, magnitude: f32) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    pub fn with_curve(mut self, curve: ProgressCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_direction(mut self, direction: Vec2) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_shake(mut self, shake: ShakeConfig) -> Self {
        self.shake = Some(shake);
        self
    }

    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// 引擎统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EngineStats {
    /// 资源池当前句柄总数
    pub pool_size: usize,
    /// 持有句柄的实例数量（含暂停中）
    pub active_count: usize,
    /// 排队等待的请求数量
    pub queued_count: usize,
}

/// 效果调度引擎
pub struct FxEngine<R: EffectRenderer> {
    config: EngineConfig,
    stack: StackAggregator<R>,
    rng: SmallRng,
    now_ms: f64,
    next_ticket: u64,
    disposed: bool,
}

impl<R: EffectRenderer> std::fmt::Debug for FxEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FxEngine")
            .field("now_ms", &self.now_ms)
            .field("stack", &self.stack)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<R: EffectRenderer> FxEngine<R> {
    /// 创建引擎
    ///
    /// 配置无效时返回错误；这是引擎唯一会返回错误的地方。
    pub fn new(config: EngineConfig, renderer: R) -> FxResult<Self> {
        config.validate()?;

        let pool = ResourcePool::new(config.pool.clone(), renderer)?;
        let lifecycle = EffectLifecycle::new(pool, NoiseField::new(config.seed));
        let backpressure = BackpressureController::new(config.backpressure.clone(), lifecycle);
        let stack = StackAggregator::new(config.stack.clone(), backpressure);

        Ok(Self {
            rng: SmallRng::seed_from_u64(config.seed ^ DIRECTION_SEED_SALT),
            config,
            stack,
            now_ms: 0.0,
            next_ticket: 1,
            disposed: false,
        })
    }

    // ========== 对外接口 ==========

    /// 调度一个效果
    ///
    /// 返回 `None` 表示请求被丢弃（参数非法、池耗尽或引擎已释放），不是错误。
    /// 命中堆叠时返回被合并实例的票据。
    pub fn schedule(&mut self, request: EffectRequest<R::Data>) -> Option<Ticket> {
        if self.disposed {
            warn!("引擎已释放，忽略 schedule");
            return None;
        }

        if !(request.duration_ms.is_finite() && request.duration_ms > 0.0) {
            warn!(duration_ms = request.duration_ms, "持续时间无效，忽略请求");
            return None;
        }
        let magnitude = request.magnitude.unwrap_or(1.0);
        if !(magnitude.is_finite() && magnitude >= 0.0) {
            warn!(magnitude, "强度无效，忽略请求");
            return None;
        }
        if let Some(shake) = &request.shake
            && let Err(e) = shake.validate()
        {
            warn!(error = %e, "震屏配置无效，忽略请求");
            return None;
        }

        let ticket = Ticket::new(self.next_ticket);
        self.next_ticket += 1;

        let direction = request.direction.filter(|d| d.is_finite());
        let mut instance = EffectInstance::scheduled(ticket, request.duration_ms, request.render_data);
        instance.correlation_key = request.correlation_key;
        instance.magnitude = magnitude;
        instance.curve = request.curve;
        instance.flags = request.flags;
        instance.direction = direction.map(Vec2::normalize_or_zero);

        if let Some(shake) = request.shake {
            let direction = direction.unwrap_or_else(|| self.random_direction());
            instance.shake = Some(ShakeState::new(&shake, magnitude, direction));
            instance.direction = Some(direction.normalize_or_zero());
        }

        let accepted = self.stack.submit(instance, self.now_ms);
        debug!(%ticket, accepted = ?accepted, "受理调度请求");
        accepted
    }

    /// 取消效果；对任意状态有效且幂等
    pub fn cancel(&mut self, ticket: Ticket) -> bool {
        if self.disposed {
            return false;
        }
        self.stack.cancel(ticket, self.now_ms)
    }

    /// 暂停所有活跃实例
    pub fn pause_all(&mut self) {
        if self.disposed {
            return;
        }
        let now = self.now_ms;
        self.lifecycle_mut().pause(now);
    }

    /// 恢复所有暂停实例
    pub fn resume_all(&mut self) {
        if self.disposed {
            return;
        }
        let now = self.now_ms;
        self.lifecycle_mut().resume(now);
        self.stack.backpressure_mut().drain(now);
    }

    /// 推进时钟并返回期间产生的事件
    pub fn tick(&mut self, delta_ms: f64) -> Vec<EffectEvent> {
        if self.disposed {
            debug!("引擎已释放，忽略 tick");
            return Vec::new();
        }

        if delta_ms.is_finite() && delta_ms > 0.0 {
            self.now_ms += delta_ms;
        } else if delta_ms != 0.0 {
            warn!(delta_ms, "忽略非法的帧间隔");
        }

        self.stack.advance(self.now_ms);
        self.lifecycle_mut().take_events()
    }

    /// 释放引擎持有的全部资源
    ///
    /// 之后的 `schedule` 返回 `None`，`tick` 不做任何事。
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.stack.dispose();
        self.disposed = true;
    }

    pub fn stats(&self) -> EngineStats {
        let backpressure = self.stack.backpressure();
        EngineStats {
            pool_size: backpressure.lifecycle().pool().size(),
            active_count: backpressure.lifecycle().live_count(),
            queued_count: backpressure.queued_count(),
        }
    }

    // ========== 查询方法 ==========

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn is_paused(&self) -> bool {
        self.lifecycle().is_paused()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn state(&self, ticket: Ticket) -> Option<EffectState> {
        self.stack.backpressure().state(ticket)
    }

    pub fn instance(&self, ticket: Ticket) -> Option<&EffectInstance<R::Data>> {
        self.lifecycle().get(ticket)
    }

    /// 持有句柄的实例（按插入顺序）
    pub fn instances(&self) -> impl Iterator<Item = &EffectInstance<R::Data>> {
        self.lifecycle().instances()
    }

    /// 实例当前占用的资源
    pub fn payload(&self, ticket: Ticket) -> Option<&R::Payload> {
        let handle = self.instance(ticket)?.handle?;
        self.lifecycle().pool().payload(handle)
    }

    /// 所有正在使用的资源
    pub fn busy_payloads(&self) -> impl Iterator<Item = &R::Payload> {
        self.lifecycle().pool().busy_payloads()
    }

    pub fn renderer(&self) -> &R {
        self.lifecycle().pool().renderer()
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        self.lifecycle_mut().pool_mut().renderer_mut()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stack(&self) -> &StackAggregator<R> {
        &self.stack
    }

    fn lifecycle(&self) -> &EffectLifecycle<R> {
        self.stack.backpressure().lifecycle()
    }

    fn lifecycle_mut(&mut self) -> &mut EffectLifecycle<R> {
        self.stack.backpressure_mut().lifecycle_mut()
    }

    fn random_direction(&mut self) -> Vec2 {
        Vec2::from_angle(self.rng.gen_range(0.0..TAU))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackpressureConfig, OverflowPolicy, PoolConfig, StackConfig};
    use crate::error::{ConfigError, FxError};
    use crate::pool::tests::TestRenderer;

    fn engine(config: EngineConfig) -> FxEngine<TestRenderer> {
        FxEngine::new(config, TestRenderer::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            pool: PoolConfig {
                initial_size: 10,
                max_size: 4,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = FxEngine::new(config, TestRenderer::default());
        assert!(matches!(
            result,
            Err(FxError::Config(ConfigError::Inconsistent { field: "initial_size", .. }))
        ));
    }

    #[test]
    fn test_tickets_are_monotonic() {
        let mut engine = engine(EngineConfig::default());
        let a = engine.schedule(EffectRequest::new(100.0, ())).unwrap();
        let b = engine.schedule(EffectRequest::new(100.0, ())).unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_invalid_requests_ignored() {
        let mut engine = engine(EngineConfig::default());
        assert_eq!(engine.schedule(EffectRequest::new(0.0, ())), None);
        assert_eq!(engine.schedule(EffectRequest::new(f64::NAN, ())), None);
        assert_eq!(
            engine.schedule(EffectRequest::new(100.0, ()).with_magnitude(-1.0)),
            None
        );
        assert_eq!(engine.stats().active_count, 0);
    }

    #[test]
    fn test_tick_returns_events() {
        let mut engine = engine(EngineConfig::default());
        let ticket = engine.schedule(EffectRequest::new(100.0, ())).unwrap();
        assert_eq!(engine.tick(16.0), vec![EffectEvent::Started(ticket)]);
        assert!(engine.tick(16.0).is_empty());
        assert_eq!(engine.tick(100.0), vec![EffectEvent::Completed(ticket)]);
    }

    #[test]
    fn test_shake_gets_random_unit_direction() {
        let mut engine = engine(EngineConfig::default());
        let ticket = engine
            .schedule(EffectRequest::new(400.0, ()).with_shake(ShakeConfig::default()))
            .unwrap();
        let direction = engine.instance(ticket).unwrap().direction.unwrap();
        assert!((direction.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_same_seed_same_direction() {
        let request = || EffectRequest::new(400.0, ()).with_shake(ShakeConfig::default());
        let mut a = engine(EngineConfig::default());
        let mut b = engine(EngineConfig::default());
        let ta = a.schedule(request()).unwrap();
        let tb = b.schedule(request()).unwrap();
        assert_eq!(a.instance(ta).unwrap().direction, b.instance(tb).unwrap().direction);
    }

    #[test]
    fn test_stats() {
        let config = EngineConfig {
            pool: PoolConfig::fixed(4),
            backpressure: BackpressureConfig {
                max_concurrent: 1,
                overflow_policy: OverflowPolicy::Queue,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut engine = engine(config);
        engine.schedule(EffectRequest::new(100.0, ()));
        engine.schedule(EffectRequest::new(100.0, ()));
        assert_eq!(
            engine.stats(),
            EngineStats {
                pool_size: 4,
                active_count: 1,
                queued_count: 1,
            }
        );
    }

    #[test]
    fn test_stacking_through_engine() {
        let config = EngineConfig {
            stack: StackConfig {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut engine = engine(config);
        let request = || {
            EffectRequest::new(800.0, ())
                .with_correlation("enemy-1")
                .with_magnitude(7.0)
        };
        let first = engine.schedule(request()).unwrap();
        engine.tick(50.0);
        let second = engine.schedule(request()).unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.instance(first).unwrap().magnitude, 14.0);
    }

    #[test]
    fn test_resume_drains_queue_immediately() {
        let config = EngineConfig {
            backpressure: BackpressureConfig {
                max_concurrent: 1,
                overflow_policy: OverflowPolicy::Queue,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut engine = engine(config);
        let first = engine.schedule(EffectRequest::new(100.0, ())).unwrap();
        let second = engine.schedule(EffectRequest::new(100.0, ())).unwrap();
        engine.pause_all();
        engine.cancel(first);
        engine.tick(10.0);
        assert_eq!(engine.state(second), Some(EffectState::Scheduled));
        engine.resume_all();
        assert_eq!(engine.state(second), Some(EffectState::Active));
    }

    #[test]
    fn test_after_dispose() {
        let mut engine = engine(EngineConfig::default());
        let ticket = engine.schedule(EffectRequest::new(100.0, ())).unwrap();
        engine.dispose();
        assert!(engine.is_disposed());
        assert_eq!(engine.schedule(EffectRequest::new(100.0, ())), None);
        assert!(engine.tick(16.0).is_empty());
        assert!(!engine.cancel(ticket));
        assert_eq!(engine.stats().active_count, 0);
        // 重复 dispose 是 no-op
        engine.dispose();
    }
}
