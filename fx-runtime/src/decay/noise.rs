//! # Noise 模块
//!
//! 以时间为输入的确定性伪噪声。每个引擎实例在构造时用种子生成一次排列表，
//! 之后 `sample(t)` 是 `t` 的纯函数。

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::math::Vec2;

const TABLE_SIZE: usize = 256;

/// 一维梯度噪声场（两个独立通道，分别用于 x / y）
#[derive(Debug, Clone)]
pub struct NoiseField {
    perm: Vec<u8>,
    gradients: Vec<f32>,
}

impl NoiseField {
    /// 用种子构建噪声场
    pub fn new(seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);

        let mut perm: Vec<u8> = (0..=255).collect();
        perm.shuffle(&mut rng);
        // 重复一遍，避免索引回绕
        perm.extend_from_within(..);

        let gradients = (0..TABLE_SIZE)
            .map(|_| rng.gen_range(-1.0_f32..=1.0))
            .collect();

        Self { perm, gradients }
    }

    /// 采样二维噪声，分量范围 [-1, 1]
    pub fn sample(&self, t: f32) -> Vec2 {
        Vec2::new(self.channel(t, 0), self.channel(t, 97))
    }

    fn channel(&self, t: f32, offset: usize) -> f32 {
        if !t.is_finite() {
            return 0.0;
        }
        let cell = t.floor();
        let frac = t - cell;
        let i = (cell as i64).rem_euclid(TABLE_SIZE as i64) as usize;

        let g0 = self.gradient(i, offset);
        let g1 = self.gradient(i + 1, offset);
        let a = g0 * frac;
        let b = g1 * (frac - 1.0);

        let u = fade(frac);
        // 一维梯度噪声的理论范围约为 [-0.5, 0.5]
        ((a + (b - a) * u) * 2.0).clamp(-1.0, 1.0)
    }

    fn gradient(&self, i: usize, offset: usize) -> f32 {
        let index = self.perm[(i + offset) % (TABLE_SIZE * 2)] as usize;
        self.gradients[index]
    }
}

/// Perlin 平滑曲线 6t⁵ − 15t⁴ + 10t³
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}
