//! # Pool 模块
//!
//! 有界、按块扩容的可复用视觉资源分配器。
//!
//! ## 设计说明
//!
//! - 构造时按 `initial_size` 分配第一个块，之后每次按 `block_size` 整块扩容，
//!   直到 `max_size`
//! - 扩容单调：正常运行期间不收缩，只有 [`ResourcePool::dispose`] 释放所有块
//! - 句柄带代数（generation），归还后旧句柄失效，重复释放是 no-op
//! - 池耗尽时 `acquire()` 返回 `None`，调用方应静默丢弃该效果

use tracing::debug;

use crate::config::PoolConfig;
use crate::error::ConfigError;
use crate::render::{EffectRenderer, RenderFrame};

/// 资源句柄
///
/// `index` 是在整个池中的扁平位置，`generation` 每次归还后递增。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// 池内位置
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// 句柄代数
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({}#{})", self.index, self.generation)
    }
}

/// 单个资源槽
#[derive(Debug)]
struct Slot<P> {
    generation: u32,
    busy: bool,
    payload: P,
}

/// 资源块
#[derive(Debug)]
struct Block<P> {
    /// 块内第一个槽的扁平位置
    start: usize,
    capacity: usize,
    slots: Vec<Slot<P>>,
}

/// 资源池统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    /// 成功借出次数
    pub acquisitions: u64,
    /// 成功归还次数
    pub releases: u64,
    /// 扩容次数
    pub growth_events: u64,
    /// 因池耗尽而失败的借出次数
    pub exhausted: u64,
    /// 被忽略的重复/过期归还次数
    pub ignored_releases: u64,
}

/// 资源池
///
/// 持有调用方提供的 [`EffectRenderer`]，它的 `create`/`reset` 用于新建和复位资源。
pub struct ResourcePool<R: EffectRenderer> {
    config: PoolConfig,
    renderer: R,
    blocks: Vec<Block<R::Payload>>,
    size: usize,
    busy: usize,
    disposed: bool,
    stats: PoolStats,
}

impl<R: EffectRenderer> std::fmt::Debug for ResourcePool<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("size", &self.size)
            .field("busy", &self.busy)
            .field("blocks", &self.blocks.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<R: EffectRenderer> ResourcePool<R> {
    /// 创建资源池并预分配第一个块
    pub fn new(config: PoolConfig, renderer: R) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut pool = Self {
            config,
            renderer,
            blocks: Vec::new(),
            size: 0,
            busy: 0,
            disposed: false,
            stats: PoolStats::default(),
        };

        let initial = pool.config.initial_size;
        if initial > 0 {
            pool.allocate_block(initial);
        }
        Ok(pool)
    }

    /// 借出第一个空闲句柄
    ///
    /// 没有空闲句柄时尝试扩容一个块后重试一次；仍失败则返回 `None`。
    pub fn acquire(&mut self) -> Option<Handle> {
        if self.disposed {
            debug!("资源池已释放，acquire 返回空");
            return None;
        }

        if let Some(handle) = self.take_free() {
            return Some(handle);
        }

        if self.grow() {
            if let Some(handle) = self.take_free() {
                return Some(handle);
            }
        }

        self.stats.exhausted = self.stats.exhausted.saturating_add(1);
        debug!(size = self.size, max_size = self.config.max_size, "资源池耗尽，效果被丢弃");
        None
    }

    /// 归还句柄
    ///
    /// 调用 `reset` 恢复默认视觉状态并标记为空闲。
    /// 句柄已空闲或已过期时是 no-op，返回 `false`。
    pub fn release(&mut self, handle: Handle) -> bool {
        if self.disposed {
            return false;
        }

        let Some(slot) = Self::slot_mut(&mut self.blocks, handle) else {
            self.stats.ignored_releases = self.stats.ignored_releases.saturating_add(1);
            debug!(%handle, "归还了过期或重复的句柄，忽略");
            return false;
        };

        self.renderer.reset(&mut slot.payload);
        slot.busy = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.busy -= 1;
        self.stats.releases = self.stats.releases.saturating_add(1);
        true
    }

    /// 把一帧渲染到句柄对应的资源上
    pub fn render(&mut self, handle: Handle, frame: &RenderFrame<'_, R::Data>) -> bool {
        match Self::slot_mut(&mut self.blocks, handle) {
            Some(slot) => {
                self.renderer.render(&mut slot.payload, frame);
                true
            }
            None => false,
        }
    }

    /// 释放所有块
    ///
    /// 仍在使用中的资源会先被 `reset`。之后的 `acquire()` 一律失败。
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for block in &mut self.blocks {
            for slot in block.slots.iter_mut().filter(|s| s.busy) {
                self.renderer.reset(&mut slot.payload);
            }
        }
        self.blocks.clear();
        self.size = 0;
        self.busy = 0;
        self.disposed = true;
    }

    // ========== 查询方法 ==========

    /// 句柄总数
    pub fn size(&self) -> usize {
        self.size
    }

    /// 使用中的句柄数量
    pub fn busy_count(&self) -> usize {
        self.busy
    }

    /// 空闲句柄数量
    pub fn free_count(&self) -> usize {
        self.size - self.busy
    }

    /// 下一次 `acquire` 能否成功（有空闲句柄，或还能扩容）
    pub fn can_acquire(&self) -> bool {
        if self.disposed {
            return false;
        }
        self.free_count() > 0
            || (self.config.allow_growth
                && self.config.block_size > 0
                && self.size < self.config.max_size)
    }

    /// 块数量
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// 句柄是否仍被借出（且未过期）
    pub fn is_busy(&self, handle: Handle) -> bool {
        self.slot(handle).is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// 获取句柄对应的资源
    pub fn payload(&self, handle: Handle) -> Option<&R::Payload> {
        self.slot(handle).map(|s| &s.payload)
    }

    /// 按扁平位置查看资源（无论是否借出）
    pub fn payload_at(&self, index: usize) -> Option<&R::Payload> {
        self.blocks
            .iter()
            .find(|b| index >= b.start && index < b.start + b.capacity)
            .map(|b| &b.slots[index - b.start].payload)
    }

    /// 遍历所有借出中的资源
    pub fn busy_payloads(&self) -> impl Iterator<Item = &R::Payload> {
        self.blocks
            .iter()
            .flat_map(|b| b.slots.iter())
            .filter(|s| s.busy)
            .map(|s| &s.payload)
    }

    pub fn stats(&self) -> PoolStats {
        self.stats.clone()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    // ========== 内部实现 ==========

    fn take_free(&mut self) -> Option<Handle> {
        for block in &mut self.blocks {
            for (offset, slot) in block.slots.iter_mut().enumerate() {
                if !slot.busy {
                    slot.busy = true;
                    self.busy += 1;
                    self.stats.acquisitions = self.stats.acquisitions.saturating_add(1);
                    return Some(Handle {
                        index: (block.start + offset) as u32,
                        generation: slot.generation,
                    });
                }
            }
        }
        None
    }

    fn grow(&mut self) -> bool {
        if !self.config.allow_growth || self.config.block_size == 0 {
            return false;
        }
        if self.size >= self.config.max_size {
            return false;
        }

        let remaining = self.config.max_size - self.size;
        let capacity = self.config.block_size.min(remaining);
        self.allocate_block(capacity);
        self.stats.growth_events = self.stats.growth_events.saturating_add(1);
        debug!(capacity, size = self.size, "资源池扩容");
        true
    }

    fn allocate_block(&mut self, capacity: usize) {
        let start = self.size;
        let slots = (0..capacity)
            .map(|offset| Slot {
                generation: 0,
                busy: false,
                payload: self.renderer.create(Handle {
                    index: (start + offset) as u32,
                    generation: 0,
                }),
            })
            .collect();

        self.blocks.push(Block {
            start,
            capacity,
            slots,
        });
        self.size += capacity;
    }

    fn slot(&self, handle: Handle) -> Option<&Slot<R::Payload>> {
        let index = handle.index();
        let block = self
            .blocks
            .iter()
            .find(|b| index >= b.start && index < b.start + b.capacity)?;
        let slot = &block.slots[index - block.start];
        (slot.busy && slot.generation == handle.generation).then_some(slot)
    }

    fn slot_mut(
        blocks: &mut [Block<R::Payload>],
        handle: Handle,
    ) -> Option<&mut Slot<R::Payload>> {
        let index = handle.index();
        let block = blocks
            .iter_mut()
            .find(|b| index >= b.start && index < b.start + b.capacity)?;
        let slot = &mut block.slots[index - block.start];
        (slot.busy && slot.generation == handle.generation).then_some(slot)
    }
}
