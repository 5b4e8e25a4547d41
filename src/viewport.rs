//! Pan/zoom state and the texel-to-plane mapping.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::params::ViewportConfig;

/// Current pan offset and zoom scale on the sampling plane
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ViewportState {
    pub offset_x: f32,
    pub offset_y: f32,
    /// Width of the frame in plane units
    pub scale: f32,
}

impl ViewportState {
    pub fn new(offset_x: f32, offset_y: f32, scale: f32) -> Self {
        Self {
            offset_x,
            offset_y,
            scale,
        }
    }
}

/// How texel coordinates are placed relative to the viewport offset
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum CoordinateMapping {
    /// Frame center sits on the offset: `(px - w/2) / w * scale + offset`
    #[default]
    Centered,
    /// Frame corner sits on the offset: `px / w * scale + offset`
    Corner,
}

impl CoordinateMapping {
    /// Numeric id passed to the compute kernel
    pub fn kernel_id(self) -> u32 {
        match self {
            Self::Centered => 0,
            Self::Corner => 1,
        }
    }

    /// Map a (possibly fractional) texel coordinate to the sampling plane
    #[inline]
    pub fn to_plane(
        self,
        state: &ViewportState,
        px: f32,
        py: f32,
        width: u32,
        height: u32,
    ) -> (f32, f32) {
        let w = width as f32;
        let h = height as f32;
        match self {
            Self::Centered => (
                (px - w / 2.0) / w * state.scale + state.offset_x,
                (py - h / 2.0) / h * state.scale + state.offset_y,
            ),
            Self::Corner => (
                px / w * state.scale + state.offset_x,
                py / h * state.scale + state.offset_y,
            ),
        }
    }

    /// Inverse of [`Self::to_plane`]
    pub fn to_texel(
        self,
        state: &ViewportState,
        x: f32,
        y: f32,
        width: u32,
        height: u32,
    ) -> (f32, f32) {
        let w = width as f32;
        let h = height as f32;
        let u = (x - state.offset_x) / state.scale * w;
        let v = (y - state.offset_y) / state.scale * h;
        match self {
            Self::Centered => (u + w / 2.0, v + h / 2.0),
            Self::Corner => (u, v),
        }
    }
}

/// How pan input is converted into an offset delta
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanMode {
    /// `delta = pan * dt * translate_speed`
    Simple,
    /// Pan magnitude is clamped to 1 and the delta scales with zoom, so
    /// diagonal input is no faster and panning feels constant on screen.
    #[default]
    Refined,
}

/// Applies input deltas to a [`ViewportState`] within configured limits
#[derive(Clone, Debug)]
pub struct ViewportTransform {
    pub mapping: CoordinateMapping,
    pub pan_mode: PanMode,
    pub translate_speed: f32,
    pub zoom_speed: f32,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl ViewportTransform {
    pub fn new(config: &ViewportConfig) -> Self {
        Self {
            mapping: config.mapping,
            pan_mode: config.pan_mode,
            translate_speed: config.translate_speed,
            zoom_speed: config.zoom_speed,
            min_scale: config.min_scale,
            max_scale: config.max_scale,
        }
    }

    /// Initial state from config, with the scale pulled into range
    pub fn initial_state(&self, config: &ViewportConfig) -> ViewportState {
        ViewportState::new(
            config.offset_x,
            config.offset_y,
            self.clamp_scale(config.scale),
        )
    }

    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }

    /// Update `state` from one cycle of input.
    ///
    /// # Arguments
    /// * `pan` - Pan axis, each component nominally in `[-1, 1]`
    /// * `zoom` - Scroll axis; positive zooms in, negative zooms out
    /// * `dt` - Seconds since the previous cycle
    ///
    /// # Returns
    /// Whether any field of `state` changed
    pub fn apply_input(&self, state: &mut ViewportState, pan: Vec2, zoom: f32, dt: f32) -> bool {
        let before = *state;

        if pan != Vec2::ZERO {
            let delta = match self.pan_mode {
                PanMode::Simple => pan * dt * self.translate_speed,
                PanMode::Refined => {
                    pan.clamp_length_max(1.0) * dt * self.translate_speed * state.scale
                }
            };
            state.offset_x += delta.x;
            state.offset_y += delta.y;
        }

        if zoom > 0.0 {
            state.scale = self.clamp_scale(state.scale / self.zoom_speed);
        } else if zoom < 0.0 {
            state.scale = self.clamp_scale(state.scale * self.zoom_speed);
        }

        *state != before
    }
}
