//! Fractal noise parameters.

use serde::{Deserialize, Serialize};

use crate::noise::{NoiseBasis, NoiseParameters};

/// Noise synthesis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Number of FBM layers, 1..=10
    pub octaves: u32,

    /// Amplitude falloff per octave, 0..=1
    /// 0.5 halves each layer's contribution
    pub persistence: f32,

    /// Frequency growth per octave, (0, 10]
    pub lacunarity: f32,

    /// Permutation seed (0 = reference table)
    pub seed: u32,

    /// Base noise primitive
    pub basis: NoiseBasis,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            octaves: 6,
            persistence: 0.5,
            lacunarity: 2.0,
            seed: 0,
            basis: NoiseBasis::Gradient,
        }
    }
}

impl NoiseConfig {
    pub fn parameters(&self) -> NoiseParameters {
        NoiseParameters {
            octaves: self.octaves,
            persistence: self.persistence,
            lacunarity: self.lacunarity,
        }
    }
}
