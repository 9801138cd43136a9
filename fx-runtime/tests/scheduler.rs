//! # 调度器集成测试
//!
//! 只通过公开接口驱动 FxEngine / ResourcePool / 衰减模拟器。

use fx_runtime::{
    BackpressureConfig, DecayMode, EffectEvent, EffectRenderer, EffectRequest, EffectState,
    EngineConfig, FxEngine, Handle, NoiseField, OverflowPolicy, PoolConfig, ProgressCurve,
    RenderFrame, ResourcePool, ShakeConfig, ShakeState, StackConfig, Vec2, VignetteConfig,
    VignetteSimulator,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// 测试用精灵
#[derive(Debug, Clone, PartialEq)]
struct Sprite {
    alpha: f32,
    text: String,
    offset: Vec2,
}

impl Sprite {
    fn hidden() -> Self {
        Self {
            alpha: 0.0,
            text: String::new(),
            offset: Vec2::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct SpriteRenderer;

impl EffectRenderer for SpriteRenderer {
    type Payload = Sprite;
    type Data = ();

    fn create(&mut self, _handle: Handle) -> Sprite {
        Sprite::hidden()
    }

    fn render(&mut self, sprite: &mut Sprite, frame: &RenderFrame<'_, ()>) {
        sprite.alpha = frame.value;
        if let Some(label) = frame.label {
            sprite.text = label.to_string();
        }
        if let Some(shake) = frame.shake {
            sprite.offset = shake.offset;
        }
    }

    fn reset(&mut self, sprite: &mut Sprite) {
        *sprite = Sprite::hidden();
    }
}

fn engine(config: EngineConfig) -> FxEngine<SpriteRenderer> {
    FxEngine::new(config, SpriteRenderer).unwrap()
}

/// 场景 1：固定容量的池耗尽后返回空
#[test]
fn test_fixed_pool_exhaustion() {
    let config = PoolConfig {
        initial_size: 4,
        max_size: 4,
        block_size: 4,
        allow_growth: true,
    };
    let mut pool = ResourcePool::new(config, SpriteRenderer).unwrap();
    for _ in 0..4 {
        assert!(pool.acquire().is_some());
    }
    assert_eq!(pool.acquire(), None);
    assert_eq!(pool.size(), 4);
}

/// 场景 2：暂停期间流逝的时间不计入持续时间
#[test]
fn test_pause_does_not_consume_duration() {
    let mut engine = engine(EngineConfig::default());
    let ticket = engine.schedule(EffectRequest::new(1000.0, ())).unwrap();

    engine.tick(500.0);
    engine.pause_all();
    assert_eq!(engine.state(ticket), Some(EffectState::Paused));

    engine.tick(2000.0);
    engine.resume_all();
    assert_eq!(engine.state(ticket), Some(EffectState::Active));

    let events = engine.tick(499.0);
    assert!(!events.contains(&EffectEvent::Completed(ticket)));
    assert_eq!(engine.state(ticket), Some(EffectState::Active));

    let events = engine.tick(1.0);
    assert_eq!(events, vec![EffectEvent::Completed(ticket)]);
    assert_eq!(engine.state(ticket), None);
}

/// 场景 3：同一敌人的五次命中合并为一个实例
#[test]
fn test_damage_stacking() {
    let config = EngineConfig {
        stack: StackConfig {
            enabled: true,
            threshold_ms: 300.0,
            stack_limit: 3,
            refresh_on_stack: true,
        },
        ..Default::default()
    };
    let mut engine = engine(config);

    let request = || {
        EffectRequest::new(800.0, ())
            .with_correlation("enemy-7")
            .with_magnitude(10.0)
    };

    let first = engine.schedule(request()).unwrap();
    for _ in 0..4 {
        engine.tick(300.0);
        assert_eq!(engine.schedule(request()), Some(first));
    }

    assert_eq!(engine.stats().active_count, 1);
    assert_eq!(engine.instance(first).unwrap().magnitude, 50.0);
    let sprite = engine.payload(first).unwrap();
    insta::assert_snapshot!(sprite.text.as_str(), @"5×(50)");
}

/// 场景 4：淘汰策略下第 9 个请求挤掉最早的实例
#[test]
fn test_evict_oldest_at_cap() {
    let config = EngineConfig {
        backpressure: BackpressureConfig {
            max_concurrent: 8,
            overflow_policy: OverflowPolicy::EvictOldest,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut engine = engine(config);

    let tickets: Vec<_> = (0..9)
        .map(|_| engine.schedule(EffectRequest::new(1000.0, ())).unwrap())
        .collect();

    assert_eq!(engine.stats().active_count, 8);
    assert_eq!(engine.state(tickets[0]), None);
    assert!(tickets[1..].iter().all(|t| engine.state(*t) == Some(EffectState::Active)));

    let events = engine.tick(0.0);
    assert!(events.contains(&EffectEvent::Evicted(tickets[0])));
}

/// 场景 5：血量从 60% 降到 4%，暗角平滑上升并开始脉动
#[test]
fn test_vignette_ramp() {
    let config = VignetteConfig::default();
    let mut sim = VignetteSimulator::new(config.clone());

    sim.set_health(0.6);
    assert_eq!(sim.step(16.0).intensity, 0.0);

    let mut last_intensity = 0.0;
    let mut last_hz = None;
    for health in [0.5, 0.4, 0.3, 0.2, 0.12, 0.09, 0.06, 0.04] {
        sim.set_health(health);
        let sample = sim.step(16.0);

        // 每帧最多逼近 smoothing 比例，不会跳变
        let max_step = (sample.target - last_intensity) * config.smoothing;
        assert!(sample.intensity - last_intensity <= max_step + 1e-6);
        assert!(sample.intensity >= last_intensity);

        if health >= config.critical_threshold {
            assert_eq!(sample.pulse_hz, None);
        } else {
            let hz = sample.pulse_hz.unwrap();
            if let Some(previous) = last_hz {
                assert!(hz > previous);
            }
            last_hz = Some(hz);
        }
        last_intensity = sample.intensity;
    }

    for _ in 0..200 {
        last_intensity = sim.step(16.0).intensity;
    }
    assert!((last_intensity - config.max_intensity).abs() < 1e-3);
}

#[test]
fn test_release_restores_neutral_state() {
    let mut engine = engine(EngineConfig::default());
    let ticket = engine.schedule(EffectRequest::new(100.0, ())).unwrap();
    engine.tick(50.0);
    assert!(engine.payload(ticket).unwrap().alpha > 0.0);

    engine.cancel(ticket);
    assert!(!engine.cancel(ticket));
    assert!(engine.busy_payloads().next().is_none());

    let next = engine.schedule(EffectRequest::new(100.0, ())).unwrap();
    assert_eq!(engine.payload(next).unwrap().text, "");
}

#[test]
fn test_pool_growth_bounded() {
    let config = PoolConfig {
        initial_size: 2,
        max_size: 11,
        block_size: 4,
        allow_growth: true,
    };
    let mut pool = ResourcePool::new(config, SpriteRenderer).unwrap();
    let mut rng = SmallRng::seed_from_u64(42);
    let mut held = Vec::new();

    for _ in 0..2000 {
        if rng.gen_bool(0.6) {
            if let Some(handle) = pool.acquire() {
                held.push(handle);
            }
        } else if !held.is_empty() {
            let index = rng.gen_range(0..held.len());
            assert!(pool.release(held.swap_remove(index)));
        }
        assert!(pool.size() <= 11);
        assert_eq!(pool.busy_count(), held.len());
    }
    // 2 + 4 + 4 + 1
    assert_eq!(pool.block_count(), 4);
}

#[test]
fn test_random_pause_cycles_keep_duration() {
    let mut rng = SmallRng::seed_from_u64(7);
    let mut engine = engine(EngineConfig::default());
    let ticket = engine.schedule(EffectRequest::new(1000.0, ())).unwrap();

    let mut active_ms = 0.0;
    loop {
        let frame = 16.0;
        let events = engine.tick(frame);
        if !engine.is_paused() {
            active_ms += frame;
        }
        if events.contains(&EffectEvent::Completed(ticket)) {
            break;
        }
        if rng.gen_bool(0.1) {
            if engine.is_paused() {
                engine.resume_all();
            } else {
                engine.pause_all();
            }
        }
        assert!(active_ms <= 1000.0 + frame);
    }

    assert!(active_ms >= 1000.0);
    assert!(active_ms < 1000.0 + 16.0);
}

#[test]
fn test_queue_policy_dispatches_fifo() {
    let config = EngineConfig {
        backpressure: BackpressureConfig {
            max_concurrent: 2,
            overflow_policy: OverflowPolicy::Queue,
            spacing_ms: 100.0,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut engine = engine(config);
    let tickets: Vec<_> = (0..5)
        .map(|_| engine.schedule(EffectRequest::new(200.0, ())).unwrap())
        .collect();
    assert_eq!(engine.stats().queued_count, 3);

    engine.tick(200.0);
    assert_eq!(engine.state(tickets[2]), Some(EffectState::Active));
    assert_eq!(engine.state(tickets[3]), Some(EffectState::Scheduled));

    engine.tick(100.0);
    assert_eq!(engine.state(tickets[3]), Some(EffectState::Active));
    assert_eq!(engine.state(tickets[4]), Some(EffectState::Scheduled));
}

/// 并发上限大于池容量时，多出的请求排队等待句柄
#[test]
fn test_queue_policy_waits_for_small_pool() {
    let config = EngineConfig {
        pool: PoolConfig::fixed(2),
        backpressure: BackpressureConfig {
            max_concurrent: 8,
            overflow_policy: OverflowPolicy::Queue,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut engine = engine(config);
    let tickets: Vec<_> = (0..4)
        .map(|_| engine.schedule(EffectRequest::new(200.0, ())))
        .collect();
    assert!(tickets.iter().all(Option::is_some));
    assert_eq!(engine.stats().active_count, 2);
    assert_eq!(engine.stats().queued_count, 2);

    let events = engine.tick(200.0);
    assert!(!events.iter().any(|e| matches!(e, EffectEvent::Dropped(_))));
    assert_eq!(engine.stats().active_count, 2);
    assert_eq!(engine.stats().queued_count, 0);
    assert_eq!(engine.state(tickets[3].unwrap()), Some(EffectState::Active));
}

#[test]
fn test_shake_settles_before_duration() {
    let mut engine = engine(EngineConfig::default());
    let shake = ShakeConfig {
        decay_mode: DecayMode::Quadratic,
        ..Default::default()
    };
    let ticket = engine
        .schedule(
            EffectRequest::new(shake.duration_ms, ())
                .with_magnitude(1.0)
                .with_curve(ProgressCurve::QuadraticFalloff)
                .with_direction(Vec2::new(0.0, 1.0))
                .with_shake(shake.clone()),
        )
        .unwrap();

    engine.tick(16.0);
    assert_ne!(engine.payload(ticket).unwrap().offset, Vec2::ZERO);

    let mut released_at = None;
    for _ in 0..30 {
        if engine.tick(16.0).contains(&EffectEvent::Completed(ticket)) {
            released_at = Some(engine.now_ms());
            break;
        }
    }
    let released_at = released_at.unwrap();
    assert!(released_at < shake.duration_ms);
}

#[test]
fn test_shake_intensity_non_increasing() {
    let noise = NoiseField::new(11);
    for mode in [DecayMode::Quadratic, DecayMode::Exponential] {
        let config = ShakeConfig {
            decay_mode: mode,
            ..Default::default()
        };
        let mut state = ShakeState::new(&config, 2.0, Vec2::new(1.0, 1.0));
        let mut last = f32::INFINITY;
        let mut elapsed = 0.0;
        while elapsed <= config.duration_ms {
            let sample = state.sample(elapsed, config.duration_ms, &noise);
            assert!(sample.intensity <= last);
            last = sample.intensity;
            elapsed += 16.0;
        }
        if mode == DecayMode::Quadratic {
            assert!(last <= config.epsilon);
        }
    }
}
