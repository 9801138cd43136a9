//! # FX Runtime
//!
//! FPS HUD 瞬时效果的调度核心。
//!
//! ## 架构概述
//!
//! `fx-runtime` 是纯逻辑核心，不依赖任何 IO 或渲染引擎。
//! 控件（Widget）通过 [`EffectRenderer`] 提供资源的 create / render / reset，
//! 引擎负责资源池化、计时、并发上限和事件堆叠：
//!
//! ```text
//! Widget                          Engine
//!   │                               │
//!   │──── schedule(EffectRequest) ─►│ → Option<Ticket>
//!   │                               │
//!   │──── tick(delta_ms) ──────────►│ → 推进实例、调用 render/reset
//!   │◄─── Vec<EffectEvent> ─────────│
//!   │                               │
//! ```
//!
//! ## 核心类型
//!
//! - [`FxEngine`]：对外入口（schedule / cancel / pause_all / resume_all / tick / dispose）
//! - [`ResourcePool`]：按块扩容的资源池
//! - [`EffectLifecycle`]：暂停安全的实例状态机
//! - [`BackpressureController`]：并发上限（淘汰或排队）
//! - [`StackAggregator`]：同键事件合并
//! - [`ShakeState`] / [`VignetteSimulator`]：震屏衰减与血量暗角
//!
//! ## 使用示例
//!
//! ```ignore
//! use fx_runtime::{EffectRequest, EngineConfig, FxEngine};
//!
//! let mut engine = FxEngine::new(EngineConfig::default(), MarkerRenderer)?;
//! engine.schedule(EffectRequest::new(250.0, ()));
//!
//! // 主循环
//! loop {
//!     for event in engine.tick(frame_ms) {
//!         // 更新控件自身的记录
//!     }
//! }
//! ```
//!
//! ## 模块结构
//!
//! - [`pool`]：资源池与句柄
//! - [`lifecycle`]：实例、状态机、进度曲线
//! - [`backpressure`]：并发上限
//! - [`stack`]：堆叠聚合
//! - [`decay`]：震屏与暗角模拟
//! - [`timer`]：可取消的一次性定时器
//! - [`event`]：领域事件与事件源接口
//! - [`config`]：配置记录
//! - [`error`]：错误类型

pub mod backpressure;
pub mod config;
pub mod decay;
pub mod engine;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod math;
pub mod pool;
pub mod render;
pub mod stack;
pub mod timer;

// 重导出核心类型
pub use backpressure::{Admission, BackpressureController};
pub use config::{
    BackpressureConfig, DecayMode, EngineConfig, OverflowPolicy, PoolConfig, ShakeConfig,
    StackConfig, VignetteConfig,
};
pub use decay::{NoiseField, ShakeSample, ShakeState, VignetteSample, VignetteSimulator};
pub use engine::{EffectRequest, EngineStats, FxEngine};
pub use error::{ConfigError, EventError, FxError, FxResult};
pub use event::{Direction, EventCategory, EventFlags, EventSource, FxEvent};
pub use lifecycle::{
    EasingFunction, EffectEvent, EffectInstance, EffectLifecycle, EffectState, ProgressCurve,
    Ticket,
};
pub use math::Vec2;
pub use pool::{Handle, PoolStats, ResourcePool};
pub use render::{EffectRenderer, RenderFrame};
pub use stack::{StackAggregator, StackEntry, StackLabel, SubEvent};
pub use timer::{TimerId, TimerQueue};
