//! # Bus 模块
//!
//! 单线程事件总线。
//!
//! 游戏逻辑持有 [`EventPublisher`] 投递事件，HUD 持有 [`EventBus`] 并在每帧
//! 通过 [`EventSource::poll`] 取走全部事件。总线只在构造时注入，不存在全局实例。

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use fx_runtime::{EventSource, FxEvent};

type SharedQueue = Rc<RefCell<VecDeque<FxEvent>>>;

/// 事件总线（接收端）
#[derive(Debug, Default)]
pub struct EventBus {
    queue: SharedQueue,
}

/// 事件发布端，可任意克隆
#[derive(Debug, Clone)]
pub struct EventPublisher {
    queue: SharedQueue,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            queue: Rc::clone(&self.queue),
        }
    }

    /// 尚未取走的事件数量
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl EventSource for EventBus {
    fn poll(&mut self) -> Vec<FxEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }
}

impl EventPublisher {
    pub fn publish(&self, event: FxEvent) {
        self.queue.borrow_mut().push_back(event);
    }
}
