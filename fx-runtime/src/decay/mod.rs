//! # Decay 模块
//!
//! 叠加在调度器之上的两种数值模拟：
//!
//! - [`shake`]：带方向的震屏衰减（二次有界 / 指数两种模式）
//! - [`vignette`]：血量驱动的非线性暗角强度与脉动
//!
//! 二者都只依赖时间与配置，不持有任何资源句柄。

mod noise;
pub mod shake;
pub mod vignette;

pub use noise::NoiseField;
pub use shake::{ShakeSample, ShakeState, exponential_step, quadratic_intensity};
pub use vignette::{VignetteSample, VignetteSimulator, VignetteState, pulse_hz, target_intensity};
