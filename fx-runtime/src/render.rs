//! # Render 模块
//!
//! 调度器与具体控件之间的渲染接口。
//!
//! 调度器只负责 **时间轴与资源管理**：
//! - 知道某个实例在 duration 内的进度
//! - 计算进度曲线、衰减强度、震屏偏移
//! - **不假设资源类型**，控件自己决定如何把 [`RenderFrame`] 应用到资源上

use crate::decay::ShakeSample;
use crate::event::EventFlags;
use crate::lifecycle::Ticket;
use crate::math::Vec2;
use crate::pool::Handle;
use crate::stack::StackLabel;

/// 每种资源类型的 create / render / reset 回调集合
///
/// 由控件在构造时提供，资源池持有它并在以下时机调用：
/// - `create`：池分配新块时，为每个新句柄创建资源
/// - `render`：实例每帧推进时（以及堆叠原地重绘时）
/// - `reset`：句柄归还池时，恢复中性视觉状态
///
/// ## 实现示例
///
/// ```rust,ignore
/// struct MarkerRenderer;
///
/// impl EffectRenderer for MarkerRenderer {
///     type Payload = MarkerSprite;
///     type Data = ();
///
///     fn create(&mut self, _handle: Handle) -> MarkerSprite {
///         MarkerSprite::hidden()
///     }
///
///     fn render(&mut self, sprite: &mut MarkerSprite, frame: &RenderFrame<'_, ()>) {
///         sprite.alpha = frame.value;
///     }
///
///     fn reset(&mut self, sprite: &mut MarkerSprite) {
///         *sprite = MarkerSprite::hidden();
///     }
/// }
/// ```
pub trait EffectRenderer {
    /// 池化的可视资源
    type Payload;
    /// 每个请求附带的渲染数据（文本、图标等）
    type Data;

    /// 创建一个新资源
    fn create(&mut self, handle: Handle) -> Self::Payload;

    /// 把当前帧应用到资源
    fn render(&mut self, payload: &mut Self::Payload, frame: &RenderFrame<'_, Self::Data>);

    /// 把资源恢复到中性状态
    fn reset(&mut self, payload: &mut Self::Payload);
}

/// 单帧渲染参数
#[derive(Debug, Clone, Copy)]
pub struct RenderFrame<'a, D> {
    /// 实例票据
    pub ticket: Ticket,
    /// 线性进度 (0.0 - 1.0)
    pub progress: f32,
    /// 进度曲线的输出值
    pub value: f32,
    /// 实例强度（堆叠后为合计值）
    pub magnitude: f32,
    /// 已激活时长（毫秒，不含暂停）
    pub elapsed_ms: f64,
    /// 剩余时长（毫秒）
    pub remaining_ms: f64,
    /// 方向（方向指示器使用）
    pub direction: Option<Vec2>,
    /// 事件标记
    pub flags: EventFlags,
    /// 堆叠标签
    pub label: Option<&'a StackLabel>,
    /// 震屏采样
    pub shake: Option<ShakeSample>,
    /// 请求携带的渲染数据
    pub data: &'a D,
}
