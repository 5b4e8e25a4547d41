//! Frame types shared by the CPU and GPU render paths.

mod cpu;
mod gpu;
mod lighting;

use serde::{Deserialize, Serialize};

use crate::gradient::Rgba;
use crate::params::PreviewConfig;
use crate::viewport::CoordinateMapping;

pub use cpu::CpuRenderer;
pub use gpu::{GpuContext, GpuFrame, GpuRenderer, KernelParams};
pub use lighting::{LightingPass, LightingUniforms};

/// Largest frame edge accepted by configuration (wgpu's default 2D texture limit)
pub const MAX_FRAME_DIMENSION: u32 = 8192;

/// Noise-to-color strategy, selected per configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shading {
    /// Map each texel's FBM value through the gradient table
    #[default]
    Gradient,
    /// Raw FBM value as opaque gray
    Grayscale,
    /// Evaluate on a lattice of `cell` texels, color each lattice corner
    /// through the gradient, then blend the four colors bilinearly.
    /// The blend happens in color space, so band edges soften differently
    /// than blending values would.
    Smooth { cell: u32 },
}

impl Shading {
    /// Numeric id passed to the compute kernel
    pub fn kernel_id(self) -> u32 {
        match self {
            Self::Gradient => 0,
            Self::Grayscale => 1,
            Self::Smooth { .. } => 2,
        }
    }

    /// Lattice spacing in texels (1 for the direct strategies)
    pub fn cell_size(self) -> u32 {
        match self {
            Self::Smooth { cell } => cell.max(1),
            _ => 1,
        }
    }
}

/// Per-run frame layout shared by both renderers
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameSettings {
    pub width: u32,
    pub height: u32,
    pub mapping: CoordinateMapping,
    pub shading: Shading,
}

impl FrameSettings {
    pub fn from_config(config: &PreviewConfig) -> Self {
        Self {
            width: config.render.width,
            height: config.render.height,
            mapping: config.viewport.mapping,
            shading: config.render.shading,
        }
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Row-major RGBA frame
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl PixelBuffer {
    /// Wrap `pixels` laid out row-major; panics if the length does not match
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Rgba>) -> Self {
        assert_eq!(
            pixels.len(),
            width as usize * height as usize,
            "pixel count does not match {}x{}",
            width,
            height
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> Rgba {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Raw `Rgba32Float` bytes for texture upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Largest per-channel difference against a frame of the same size
    pub fn max_channel_delta(&self, other: &PixelBuffer) -> f32 {
        assert_eq!((self.width, self.height), (other.width, other.height));
        self.pixels
            .iter()
            .zip(&other.pixels)
            .map(|(a, b)| a.max_channel_delta(*b))
            .fold(0.0, f32::max)
    }

    /// 8-bit copy for PNG export
    pub fn to_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            image::Rgba(self.get(x, y).to_rgba8())
        })
    }
}

/// Raw FBM values aligned texel-for-texel with the color frame
#[derive(Clone, Debug, PartialEq)]
pub struct HeightMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl HeightMap {
    pub fn from_values(width: u32, height: u32, values: Vec<f32>) -> Self {
        assert_eq!(values.len(), width as usize * height as usize);
        Self {
            width,
            height,
            values,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }

    pub fn to_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([(self.get(x, y).clamp(0.0, 1.0) * 255.0).round() as u8])
        })
    }
}
