//! # Instance 模块
//!
//! 单个效果实例的定义。

use crate::decay::ShakeState;
use crate::event::EventFlags;
use crate::math::Vec2;
use crate::pool::Handle;
use crate::stack::StackLabel;
use crate::timer::TimerId;

use super::ProgressCurve;

/// 效果票据
///
/// 由 `schedule()` 返回，用于 `cancel()`。单调递增，因此票据顺序即插入顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ticket({})", self.0)
    }
}

/// 实例状态
///
/// ```text
/// Scheduled --(acquire 成功)--> Active
/// Active    --(pause)---------> Paused
/// Paused    --(resume)--------> Active      [remaining 精确保留]
/// Active    --(elapsed >= duration)--> Released
/// Scheduled/Active/Paused --(cancel)--> Released
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectState {
    /// 已受理，等待空位（在背压队列中）
    #[default]
    Scheduled,
    /// 正在播放
    Active,
    /// 已暂停
    Paused,
    /// 已释放（句柄已归还）
    Released,
}

impl EffectState {
    /// 是否持有句柄（计入并发上限）
    pub fn holds_handle(&self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }

    /// 是否仍可被取消/改写
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Released)
    }
}

/// 效果实例
#[derive(Debug, Clone)]
pub struct EffectInstance<D> {
    pub ticket: Ticket,
    /// 借用的资源句柄（Scheduled 状态下为空）
    pub handle: Option<Handle>,
    /// 激活起点；恢复时会被重新计算，使 `now - start` 始终等于已激活时长
    pub start_ms: f64,
    pub duration_ms: f64,
    /// 剩余时长，始终 ≥ 0
    pub remaining_ms: f64,
    pub state: EffectState,
    pub correlation_key: Option<String>,
    pub magnitude: f32,
    pub curve: ProgressCurve,
    pub direction: Option<Vec2>,
    pub flags: EventFlags,
    pub label: Option<StackLabel>,
    pub shake: Option<ShakeState>,
    pub data: D,
    pub(crate) timer: Option<TimerId>,
}

impl<D> EffectInstance<D> {
    /// 创建处于 Scheduled 状态的实例
    pub fn scheduled(ticket: Ticket, duration_ms: f64, data: D) -> Self {
        Self {
            ticket,
            handle: None,
            start_ms: 0.0,
            duration_ms,
            remaining_ms: duration_ms,
            state: EffectState::Scheduled,
            correlation_key: None,
            magnitude: 1.0,
            curve: ProgressCurve::default(),
            direction: None,
            flags: EventFlags::NONE,
            label: None,
            shake: None,
            data,
            timer: None,
        }
    }

    /// 在 `now_ms` 时刻的已激活时长
    pub fn elapsed_at(&self, now_ms: f64) -> f64 {
        match self.state {
            EffectState::Active => (now_ms - self.start_ms).clamp(0.0, self.duration_ms),
            EffectState::Paused | EffectState::Released => self.duration_ms - self.remaining_ms,
            EffectState::Scheduled => 0.0,
        }
    }

    /// 在 `now_ms` 时刻的线性进度 (0.0 - 1.0)
    pub fn progress_at(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        (self.elapsed_at(now_ms) / self.duration_ms).clamp(0.0, 1.0) as f32
    }
}
