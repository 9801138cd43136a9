//! # Curve 模块
//!
//! 把实例进度 `p ∈ [0, 1]` 映射为渲染值的曲线。
//!
//! - [`ProgressCurve`]：由调用方为每个请求选择
//! - [`EasingFunction`]：缓动函数库，通过 `ProgressCurve::Eased` 接入

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// 缓动函数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EasingFunction {
    /// 线性（匀速）
    Linear,
    /// 二次缓入
    EaseInQuad,
    /// 二次缓出
    #[default]
    EaseOutQuad,
    /// 二次缓入缓出
    EaseInOutQuad,
    /// 三次缓出
    EaseOutCubic,
    /// 正弦缓入缓出
    EaseInOutSine,
    /// 回弹缓出（略微越过终点再回落，用于弹出式横幅）
    EaseOutBack,
}

impl EasingFunction {
    /// 计算缓动值
    ///
    /// # 参数
    /// - `t`: 时间进度 (0.0 - 1.0)
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match self {
            EasingFunction::Linear => t,
            EasingFunction::EaseInQuad => t * t,
            EasingFunction::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            EasingFunction::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            EasingFunction::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            EasingFunction::EaseInOutSine => -((PI * t).cos() - 1.0) / 2.0,
            EasingFunction::EaseOutBack => {
                let c1 = 1.70158;
                let c3 = c1 + 1.0;
                1.0 + c3 * (t - 1.0).powi(3) + c1 * (t - 1.0).powi(2)
            }
        }
    }
}

/// 进度曲线
///
/// 渲染值约定：`1.0` 表示完全可见/最大强度，`0.0` 表示完全消失。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressCurve {
    /// 线性淡出 `1 − p`
    LinearFade,
    /// 二次衰减 `(1 − p)²`
    QuadraticFalloff,
    /// 正弦脉动 `|sin(π · cycles · p)|`
    SinePulse { cycles: f32 },
    /// 缓动曲线 `easing(p)`
    Eased { easing: EasingFunction },
}

impl Default for ProgressCurve {
    fn default() -> Self {
        Self::LinearFade
    }
}

impl ProgressCurve {
    /// 计算给定进度的渲染值
    pub fn sample(&self, progress: f32) -> f32 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            ProgressCurve::LinearFade => 1.0 - p,
            ProgressCurve::QuadraticFalloff => (1.0 - p) * (1.0 - p),
            ProgressCurve::SinePulse { cycles } => (PI * cycles * p).sin().abs(),
            ProgressCurve::Eased { easing } => easing.apply(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_fade() {
        let curve = ProgressCurve::LinearFade;
        assert_eq!(curve.sample(0.0), 1.0);
        assert_eq!(curve.sample(0.25), 0.75);
        assert_eq!(curve.sample(1.0), 0.0);
        // 超出范围应该被限制
        assert_eq!(curve.sample(1.5), 0.0);
        assert_eq!(curve.sample(-1.0), 1.0);
    }

    #[test]
    fn test_quadratic_falloff_is_below_linear() {
        let quad = ProgressCurve::QuadraticFalloff;
        let linear = ProgressCurve::LinearFade;
        for i in 1..10 {
            let p = i as f32 / 10.0;
            assert!(quad.sample(p) < linear.sample(p));
        }
        assert_eq!(quad.sample(0.5), 0.25);
    }

    #[test]
    fn test_sine_pulse_peaks() {
        let pulse = ProgressCurve::SinePulse { cycles: 2.0 };
        assert!(pulse.sample(0.0).abs() < 1e-6);
        assert!((pulse.sample(0.25) - 1.0).abs() < 1e-6);
        assert!(pulse.sample(0.5).abs() < 1e-5);
        assert!((pulse.sample(0.75) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [
            EasingFunction::Linear,
            EasingFunction::EaseInQuad,
            EasingFunction::EaseOutQuad,
            EasingFunction::EaseInOutQuad,
            EasingFunction::EaseOutCubic,
            EasingFunction::EaseInOutSine,
            EasingFunction::EaseOutBack,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-5, "{easing:?}");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-5, "{easing:?}");
        }
    }

    #[test]
    fn test_ease_out_back_overshoots() {
        let peak = (1..100)
            .map(|i| EasingFunction::EaseOutBack.apply(i as f32 / 100.0))
            .fold(0.0_f32, f32::max);
        assert!(peak > 1.0);
    }
}
