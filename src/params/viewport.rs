//! Viewport navigation parameters.

use serde::{Deserialize, Serialize};

use crate::viewport::{CoordinateMapping, PanMode};

/// Initial view and pan/zoom response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Initial plane offset (plane units)
    pub offset_x: f32,
    pub offset_y: f32,

    /// Initial frame width in plane units
    pub scale: f32,

    /// Pan speed multiplier, 1..=100
    pub translate_speed: f32,

    /// Zoom factor per scroll step, 1..=100
    /// 1.1 = 10% per notch
    pub zoom_speed: f32,

    /// Scale clamp bounds
    pub min_scale: f32,
    pub max_scale: f32,

    /// Texel-to-plane mapping
    pub mapping: CoordinateMapping,

    /// Pan delta policy
    pub pan_mode: PanMode,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            offset_x: 100.0,
            offset_y: 100.0,
            scale: 20.0,
            translate_speed: 1.0, // One frame width per second in refined mode
            zoom_speed: 1.1,
            min_scale: 0.05,
            max_scale: 2000.0,
            mapping: CoordinateMapping::Centered,
            pan_mode: PanMode::Refined,
        }
    }
}
