//! # Timer 模块
//!
//! 可取消的一次性延迟回调队列。
//!
//! 不保存闭包：每个定时器只记录到期时刻与关联的 [`Ticket`]，由生命周期在
//! `tick()` 中轮询 [`TimerQueue::pop_due`] 取出已到期项。暂停时取消、恢复时
//! 按剩余时间重新登记，这样暂停期间流逝的真实时间不会被计入。

use crate::lifecycle::Ticket;

/// 定时器 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct PendingTimer {
    id: TimerId,
    due_ms: f64,
    ticket: Ticket,
}

/// 一次性定时器队列
#[derive(Debug, Default)]
pub struct TimerQueue {
    pending: Vec<PendingTimer>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个在 `due_ms` 到期的定时器
    pub fn schedule(&mut self, due_ms: f64, ticket: Ticket) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(PendingTimer { id, due_ms, ticket });
        id
    }

    /// 取消定时器；已到期或已取消时返回 `false`
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.id != id);
        self.pending.len() != before
    }

    /// 取出所有在 `now_ms` 时刻或之前到期的定时器，按到期时刻、登记顺序排列
    pub fn pop_due(&mut self, now_ms: f64) -> Vec<Ticket> {
        let mut due: Vec<PendingTimer> = Vec::new();
        self.pending.retain(|t| {
            if t.due_ms <= now_ms {
                due.push(t.clone());
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.due_ms.total_cmp(&b.due_ms).then(a.id.0.cmp(&b.id.0)));
        due.into_iter().map(|t| t.ticket).collect()
    }

    /// 待触发数量
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 清空所有定时器
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
