//! Rendering and post-process lighting configuration.

use serde::{Deserialize, Serialize};

use crate::render::Shading;

/// Which render path produces frames
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Backend {
    /// Per-texel evaluation on the calling thread
    #[default]
    Cpu,
    /// wgpu compute dispatch
    Gpu,
}

/// Rendering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Noise texture resolution (texels)
    pub width: u32,
    pub height: u32,

    pub backend: Backend,

    /// Noise-to-color strategy
    pub shading: Shading,

    /// Viewer window size (pixels); the noise texture is stretched to fit
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            backend: Backend::Cpu,
            shading: Shading::Gradient,
            window_width: 768,
            window_height: 768,
        }
    }
}

/// Ray-marched height-field lighting (GPU path only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub enabled: bool,

    /// Light position: x/y in texels, z in elevation units
    pub light_pos: [f32; 3],

    /// March step length (texels), 0..=10
    pub step_size: f32,

    /// Step budget per shadow ray, 50..=10000
    pub max_steps: u32,

    /// Elevation of a height value of 1.0 (texels)
    pub height_scale: f32,

    /// Light level in full shadow, 0..=1
    pub ambient: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            light_pos: [-128.0, -128.0, 160.0], // Low sun from the frame's origin corner
            step_size: 1.0,
            max_steps: 512,
            height_scale: 48.0,
            ambient: 0.35,
        }
    }
}
