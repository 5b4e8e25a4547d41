//! Interval-based color gradient used to map noise values to colors.
//!
//! A [`GradientTable`] is an ordered list of [`ColorInterval`]s. Lookups scan
//! the list in order and the first interval containing the value wins, so
//! overlapping bands are resolved by position rather than averaged.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Intervals narrower than this are never matched.
pub const DEGENERATE_WIDTH: f32 = f32::EPSILON;

/// Straight RGBA color with channels in `[0, 1]`
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Returned when no interval matches a value
    pub const FALLBACK: Self = Self::new(0.5, 0.5, 0.5, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque gray with every color channel set to `v`
    pub const fn gray(v: f32) -> Self {
        Self::new(v, v, v, 1.0)
    }

    /// Component-wise `self + (other - self) * t`
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Quantize to 8 bits per channel for export
    pub fn to_rgba8(self) -> [u8; 4] {
        self.to_array()
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    /// Largest absolute per-channel difference
    pub fn max_channel_delta(self, other: Self) -> f32 {
        (self.r - other.r)
            .abs()
            .max((self.g - other.g).abs())
            .max((self.b - other.b).abs())
            .max((self.a - other.a).abs())
    }

    pub fn is_finite(self) -> bool {
        self.to_array().iter().all(|c| c.is_finite())
    }
}

/// One band of the gradient: values in `[start, end)` blend from
/// `color_start` to `color_end`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorInterval {
    pub start: f32,
    pub end: f32,
    pub color_start: Rgba,
    pub color_end: Rgba,
}

impl ColorInterval {
    pub const fn new(start: f32, end: f32, color_start: Rgba, color_end: Rgba) -> Self {
        Self {
            start,
            end,
            color_start,
            color_end,
        }
    }

    /// True when the interval is too narrow to interpolate across
    pub fn is_degenerate(&self) -> bool {
        !(self.end - self.start > DEGENERATE_WIDTH)
    }

    /// Color for `value` if this interval contains it
    pub fn sample(&self, value: f32) -> Option<Rgba> {
        if self.is_degenerate() || !(self.start <= value && value < self.end) {
            return None;
        }
        let t = (value - self.start) / (self.end - self.start);
        Some(self.color_start.lerp(self.color_end, t))
    }
}

/// GPU wire format of a [`ColorInterval`]: 10 floats, 40 bytes, no padding.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct IntervalRecord {
    pub start: f32,
    pub end: f32,
    pub color_start: [f32; 4],
    pub color_end: [f32; 4],
}

/// Number of `f32`s per [`IntervalRecord`]
pub const RECORD_STRIDE_FLOATS: usize = 10;

/// Ordered set of color intervals
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradientTable {
    intervals: Vec<ColorInterval>,
}

impl GradientTable {
    pub fn new(intervals: Vec<ColorInterval>) -> Self {
        Self { intervals }
    }

    pub fn intervals(&self) -> &[ColorInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Color of the first interval containing `value`, or [`Rgba::FALLBACK`]
    pub fn color_at(&self, value: f32) -> Rgba {
        self.intervals
            .iter()
            .find_map(|interval| interval.sample(value))
            .unwrap_or(Rgba::FALLBACK)
    }

    /// Pack the table for upload into the kernel's interval buffer
    pub fn to_records(&self) -> Vec<IntervalRecord> {
        self.intervals
            .iter()
            .map(|i| IntervalRecord {
                start: i.start,
                end: i.end,
                color_start: i.color_start.to_array(),
                color_end: i.color_end.to_array(),
            })
            .collect()
    }

    /// Terrain palette from deep water up to snow caps
    pub fn terrain() -> Self {
        let deep = Rgba::new(0.02, 0.08, 0.28, 1.0);
        let shallow = Rgba::new(0.12, 0.38, 0.66, 1.0);
        let sand = Rgba::new(0.82, 0.76, 0.52, 1.0);
        let grass = Rgba::new(0.22, 0.52, 0.18, 1.0);
        let forest = Rgba::new(0.10, 0.32, 0.10, 1.0);
        let rock = Rgba::new(0.45, 0.40, 0.36, 1.0);
        let snow = Rgba::new(0.96, 0.97, 1.0, 1.0);

        Self::new(vec![
            ColorInterval::new(0.0, 0.42, deep, shallow),
            ColorInterval::new(0.42, 0.46, shallow, sand),
            ColorInterval::new(0.46, 0.50, sand, grass),
            ColorInterval::new(0.50, 0.62, grass, forest),
            ColorInterval::new(0.62, 0.74, forest, rock),
            ColorInterval::new(0.74, 1.0, rock, snow),
        ])
    }
}

impl From<Vec<ColorInterval>> for GradientTable {
    fn from(intervals: Vec<ColorInterval>) -> Self {
        Self::new(intervals)
    }
}
