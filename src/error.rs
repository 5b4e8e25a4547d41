//! Error types for configuration loading and the GPU render path.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a [`crate::params::PreviewConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid RON for the expected schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// A numeric option lies outside its documented range.
    #[error("{field} = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A value is not a finite number.
    #[error("{field} must be finite")]
    NotFinite { field: &'static str },

    /// Two options that cannot be combined.
    #[error("Unsupported configuration: {0}")]
    Unsupported(String),
}

/// Errors from the wgpu-backed render path. All of them are fatal for that path.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("Failed to find suitable GPU adapter")]
    NoAdapter,

    #[error("Failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("Kernel validation failed: {0}")]
    Validation(String),

    #[error("Buffer readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    #[error("Readback was dropped before the device signalled completion")]
    ReadbackCancelled,

    #[error("Frame size {width}x{height} exceeds the device texture limit {limit}")]
    FrameTooLarge { width: u32, height: u32, limit: u32 },

    #[error("Frame {width}x{height} needs a {size}-byte readback buffer (limit {limit})")]
    ReadbackTooLarge {
        width: u32,
        height: u32,
        size: u64,
        limit: u64,
    },
}

/// Top-level error for library entry points that touch several subsystems.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("Image export failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
}
