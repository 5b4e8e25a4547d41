//! Base noise primitives and fractal Brownian motion.
//!
//! [`GradientNoise`] is mirrored line for line by the compute kernel in
//! `render/noise.wgsl`, and both read the same [`Permutation`] table, so the
//! CPU and GPU paths agree up to float rounding. All evaluation is `f32` for
//! the same reason.

use noise::{NoiseFn, OpenSimplex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Ken Perlin's reference permutation, used for seed 0
const REFERENCE_PERMUTATION: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

/// Octave settings consumed by [`sample_fbm`]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NoiseParameters {
    /// Number of accumulated layers (>= 1)
    pub octaves: u32,
    /// Amplitude multiplier per octave, in `[0, 1]`
    pub persistence: f32,
    /// Frequency multiplier per octave (> 0)
    pub lacunarity: f32,
}

impl Default for NoiseParameters {
    fn default() -> Self {
        Self {
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Smooth deterministic noise over the plane with output in `[0, 1]`
pub trait BaseNoise {
    fn sample(&self, x: f32, y: f32) -> f32;
}

/// Selects the base noise primitive
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseBasis {
    /// Permutation-table gradient noise, available on both render paths
    #[default]
    Gradient,
    /// OpenSimplex from the `noise` crate, CPU path only
    OpenSimplex,
}

impl NoiseBasis {
    /// Whether the compute kernel implements this primitive
    pub fn gpu_supported(self) -> bool {
        matches!(self, Self::Gradient)
    }

    pub fn build(self, seed: u32) -> Box<dyn BaseNoise> {
        match self {
            Self::Gradient => Box::new(GradientNoise::new(Permutation::from_seed(seed))),
            Self::OpenSimplex => Box::new(SimplexNoise::new(seed)),
        }
    }
}

/// 256-entry hash permutation, stored twice so lookups never wrap
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    table: [u32; 512],
}

impl Permutation {
    /// Seed 0 yields the reference table; any other seed shuffles it.
    pub fn from_seed(seed: u32) -> Self {
        let mut p = REFERENCE_PERMUTATION;
        if seed != 0 {
            let mut rng = StdRng::seed_from_u64(u64::from(seed));
            p.shuffle(&mut rng);
        }

        let mut table = [0u32; 512];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = u32::from(p[i & 255]);
        }
        Self { table }
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.table
    }

    #[inline]
    fn at(&self, i: u32) -> u32 {
        self.table[i as usize]
    }
}

impl Default for Permutation {
    fn default() -> Self {
        Self::from_seed(0)
    }
}

#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

#[inline]
fn grad(hash: u32, x: f32, y: f32) -> f32 {
    match hash & 7 {
        0 => x + y,
        1 => -x + y,
        2 => x - y,
        3 => -x - y,
        4 => x,
        5 => -x,
        6 => y,
        _ => -y,
    }
}

/// Classic 2D improved-Perlin gradient noise remapped to `[0, 1]`
#[derive(Clone, Debug, Default)]
pub struct GradientNoise {
    perm: Permutation,
}

impl GradientNoise {
    pub fn new(perm: Permutation) -> Self {
        Self { perm }
    }
}

impl BaseNoise for GradientNoise {
    fn sample(&self, x: f32, y: f32) -> f32 {
        let xf = x.floor();
        let yf = y.floor();
        // Two's complement wrap keeps negative cells in 0..=255
        let xi = (xf as i32 as u32) & 255;
        let yi = (yf as i32 as u32) & 255;
        let fx = x - xf;
        let fy = y - yf;
        let u = fade(fx);
        let v = fade(fy);

        let p = &self.perm;
        let a = p.at(xi);
        let b = p.at(xi + 1);
        let aa = p.at(a + yi);
        let ab = p.at(a + yi + 1);
        let ba = p.at(b + yi);
        let bb = p.at(b + yi + 1);

        let x1 = lerp(grad(aa, fx, fy), grad(ba, fx - 1.0, fy), u);
        let x2 = lerp(grad(ab, fx, fy - 1.0), grad(bb, fx - 1.0, fy - 1.0), u);
        let n = lerp(x1, x2, v);

        ((n + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

/// OpenSimplex noise remapped from `[-1, 1]` to `[0, 1]`
pub struct SimplexNoise {
    simplex: OpenSimplex,
}

impl SimplexNoise {
    pub fn new(seed: u32) -> Self {
        Self {
            simplex: OpenSimplex::new(seed),
        }
    }
}

impl BaseNoise for SimplexNoise {
    fn sample(&self, x: f32, y: f32) -> f32 {
        let v = self.simplex.get([f64::from(x), f64::from(y)]) as f32;
        ((v + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

/// Fractal Brownian motion: sum of `octaves` layers, normalized by the
/// total amplitude so the result stays in the base noise range.
pub fn sample_fbm<N: BaseNoise + ?Sized>(
    noise: &N,
    x: f32,
    y: f32,
    params: &NoiseParameters,
) -> f32 {
    let mut total = 0.0;
    let mut frequency = 1.0;
    let mut amplitude = 1.0;
    let mut max_value = 0.0;

    for _ in 0..params.octaves {
        total += noise.sample(x * frequency, y * frequency) * amplitude;
        max_value += amplitude;
        amplitude *= params.persistence;
        frequency *= params.lacunarity;
    }

    total / max_value
}
