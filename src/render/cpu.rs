//! Reference render path: sequential per-texel evaluation on the calling thread.

use std::time::Instant;

use crate::gradient::{GradientTable, Rgba};
use crate::noise::{sample_fbm, BaseNoise, NoiseParameters};
use crate::params::PreviewConfig;
use crate::viewport::ViewportState;

use super::{FrameSettings, PixelBuffer, Shading};

pub struct CpuRenderer {
    settings: FrameSettings,
    noise: Box<dyn BaseNoise>,
    gradient: GradientTable,
}

impl CpuRenderer {
    pub fn new(
        settings: FrameSettings,
        noise: Box<dyn BaseNoise>,
        gradient: GradientTable,
    ) -> Self {
        Self {
            settings,
            noise,
            gradient,
        }
    }

    pub fn from_config(config: &PreviewConfig) -> Self {
        Self::new(
            FrameSettings::from_config(config),
            config.noise.basis.build(config.noise.seed),
            config.gradient.clone(),
        )
    }

    /// Evaluate every texel of the frame for the given view
    pub fn render(&self, viewport: &ViewportState, params: &NoiseParameters) -> PixelBuffer {
        let start = Instant::now();
        let FrameSettings { width, height, .. } = self.settings;

        let mut pixels = Vec::with_capacity(self.settings.texel_count());
        for py in 0..height {
            for px in 0..width {
                pixels.push(self.shade(viewport, params, px, py));
            }
        }

        log::debug!(
            "CPU frame {}x{} in {:.2}ms",
            width,
            height,
            start.elapsed().as_secs_f64() * 1000.0
        );
        PixelBuffer::from_pixels(width, height, pixels)
    }

    /// FBM value at a (possibly fractional) texel coordinate
    fn value_at(
        &self,
        viewport: &ViewportState,
        params: &NoiseParameters,
        px: f32,
        py: f32,
    ) -> f32 {
        let FrameSettings {
            width,
            height,
            mapping,
            ..
        } = self.settings;
        let (x, y) = mapping.to_plane(viewport, px, py, width, height);
        sample_fbm(&*self.noise, x, y, params)
    }

    fn shade(&self, viewport: &ViewportState, params: &NoiseParameters, px: u32, py: u32) -> Rgba {
        match self.settings.shading {
            Shading::Gradient => {
                let value = self.value_at(viewport, params, px as f32, py as f32);
                self.gradient.color_at(value)
            }
            Shading::Grayscale => Rgba::gray(self.value_at(viewport, params, px as f32, py as f32)),
            Shading::Smooth { cell } => {
                let c = cell.max(1) as f32;
                let gx = px as f32 / c;
                let gy = py as f32 / c;
                let x0 = gx.floor();
                let y0 = gy.floor();
                let sx = gx - x0;
                let sy = gy - y0;

                let corner = |lx: f32, ly: f32| {
                    self.gradient
                        .color_at(self.value_at(viewport, params, lx * c, ly * c))
                };
                let top = corner(x0, y0).lerp(corner(x0 + 1.0, y0), sx);
                let bottom = corner(x0, y0 + 1.0).lerp(corner(x0 + 1.0, y0 + 1.0), sx);
                top.lerp(bottom, sy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::ColorInterval;
    use crate::noise::{GradientNoise, Permutation};
    use crate::viewport::CoordinateMapping;

    fn settings(shading: Shading) -> FrameSettings {
        FrameSettings {
            width: 24,
            height: 16,
            mapping: CoordinateMapping::Centered,
            shading,
        }
    }

    fn renderer(shading: Shading, gradient: GradientTable) -> CpuRenderer {
        CpuRenderer::new(
            settings(shading),
            Box::new(GradientNoise::new(Permutation::default())),
            gradient,
        )
    }

    fn view() -> ViewportState {
        ViewportState::new(100.0, 100.0, 20.0)
    }

    #[test]
    fn test_grayscale_matches_fbm() {
        let params = NoiseParameters::default();
        let frame = renderer(Shading::Grayscale, GradientTable::terrain()).render(&view(), &params);
        let noise = GradientNoise::new(Permutation::default());

        for (px, py) in [(0, 0), (5, 3), (23, 15), (12, 8)] {
            let (x, y) =
                CoordinateMapping::Centered.to_plane(&view(), px as f32, py as f32, 24, 16);
            let expected = sample_fbm(&noise, x, y, &params);
            assert_eq!(frame.get(px, py), Rgba::gray(expected));
        }
    }

    #[test]
    fn test_gradient_shading_uses_table() {
        let gradient = GradientTable::new(vec![ColorInterval::new(
            0.0,
            1.0,
            Rgba::BLACK,
            Rgba::WHITE,
        )]);
        let params = NoiseParameters::default();
        let gray = renderer(Shading::Grayscale, gradient.clone()).render(&view(), &params);
        let colored = renderer(Shading::Gradient, gradient).render(&view(), &params);

        // A black-to-white band over [0, 1) reproduces the raw value
        assert!(gray.max_channel_delta(&colored) < 1e-6);
    }

    #[test]
    fn test_smooth_cell_one_equals_direct() {
        let params = NoiseParameters::default();
        let direct = renderer(Shading::Gradient, GradientTable::terrain()).render(&view(), &params);
        let smooth = renderer(Shading::Smooth { cell: 1 }, GradientTable::terrain())
            .render(&view(), &params);
        assert_eq!(direct, smooth);
    }

    #[test]
    fn test_smooth_lattice_corners_match_direct() {
        let params = NoiseParameters::default();
        let direct = renderer(Shading::Gradient, GradientTable::terrain()).render(&view(), &params);
        let smooth = renderer(Shading::Smooth { cell: 4 }, GradientTable::terrain())
            .render(&view(), &params);

        for py in (0..16).step_by(4) {
            for px in (0..24).step_by(4) {
                assert_eq!(direct.get(px, py), smooth.get(px, py));
            }
        }
    }

    fn mirrored_bands() -> GradientTable {
        GradientTable::new(vec![
            ColorInterval::new(0.0, 0.5, Rgba::BLACK, Rgba::WHITE),
            ColorInterval::new(0.5, 1.0, Rgba::WHITE, Rgba::BLACK),
        ])
    }

    #[test]
    fn test_smooth_interior_blends_corner_colors() {
        let params = NoiseParameters::default();
        let gradient = mirrored_bands();
        let direct = renderer(Shading::Gradient, gradient.clone()).render(&view(), &params);
        let smooth = renderer(Shading::Smooth { cell: 4 }, gradient).render(&view(), &params);

        // Texel (6, 5) sits at (0.5, 0.25) inside the cell spanning (4, 4)..(8, 8)
        let top = direct.get(4, 4).lerp(direct.get(8, 4), 0.5);
        let bottom = direct.get(4, 8).lerp(direct.get(8, 8), 0.5);
        assert_eq!(smooth.get(6, 5), top.lerp(bottom, 0.25));
    }

    #[test]
    fn test_smooth_differs_from_value_blending() {
        let params = NoiseParameters::default();
        let gradient = mirrored_bands();
        let values = renderer(Shading::Grayscale, gradient.clone()).render(&view(), &params);
        let smooth =
            renderer(Shading::Smooth { cell: 4 }, gradient.clone()).render(&view(), &params);

        // Coloring a blended value differs wherever a cell's corners straddle the 0.5 peak
        let value = |x, y| values.get(x, y).r;
        let mut differs = false;
        for cy in (0..12).step_by(4) {
            for cx in (0..20).step_by(4) {
                for (dx, dy) in (1..4u32).flat_map(|dy| (1..4u32).map(move |dx| (dx, dy))) {
                    let (sx, sy) = (dx as f32 / 4.0, dy as f32 / 4.0);
                    let top = value(cx, cy) + (value(cx + 4, cy) - value(cx, cy)) * sx;
                    let bottom =
                        value(cx, cy + 4) + (value(cx + 4, cy + 4) - value(cx, cy + 4)) * sx;
                    let blended = gradient.color_at(top + (bottom - top) * sy);
                    differs |= smooth.get(cx + dx, cy + dy).max_channel_delta(blended) > 1e-3;
                }
            }
        }
        assert!(differs);
    }

    #[test]
    fn test_every_texel_is_written() {
        let frame = renderer(Shading::Gradient, GradientTable::terrain())
            .render(&view(), &NoiseParameters::default());
        assert_eq!(frame.pixels().len(), 24 * 16);
        assert!(frame.pixels().iter().all(|p| p.is_finite() && p.a == 1.0));
    }

    #[test]
    fn test_empty_gradient_is_all_fallback() {
        let frame = renderer(Shading::Gradient, GradientTable::default())
            .render(&view(), &NoiseParameters::default());
        assert!(frame.pixels().iter().all(|p| *p == Rgba::FALLBACK));
    }

    #[test]
    fn test_render_is_deterministic() {
        let r = renderer(Shading::Gradient, GradientTable::terrain());
        let params = NoiseParameters::default();
        assert_eq!(r.render(&view(), &params), r.render(&view(), &params));
    }
}
