//! noiseview library - fractal noise preview with matching CPU and GPU paths

pub mod app;
pub mod cli;
pub mod error;
pub mod fps;
pub mod gradient;
pub mod headless;
pub mod noise;
pub mod params;
pub mod render;
pub mod rendering;
pub mod viewport;
