//! Parameter definitions with documented ranges and defaults.
//!
//! Everything tunable lives here:
//! - Documented ranges and meanings
//! - Defaults that produce a sensible preview without a config file
//! - Validation that fails fast instead of rendering degenerate output

mod noise;
mod render;
mod viewport;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gradient::GradientTable;
use crate::render::{Shading, MAX_FRAME_DIMENSION};

// Re-export all types
pub use noise::NoiseConfig;
pub use render::{Backend, LightingConfig, RenderConfig};
pub use viewport::ViewportConfig;

/// Complete preview configuration, loadable from a RON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub render: RenderConfig,
    pub noise: NoiseConfig,
    pub viewport: ViewportConfig,
    pub lighting: LightingConfig,
    /// Ordered color bands; first match wins
    pub gradient: GradientTable,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            noise: NoiseConfig::default(),
            viewport: ViewportConfig::default(),
            lighting: LightingConfig::default(),
            gradient: GradientTable::terrain(),
        }
    }
}

impl PreviewConfig {
    /// Parse a RON document; missing fields take their defaults
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Check every option against its documented range
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.render;
        let max_dim = f64::from(MAX_FRAME_DIMENSION);
        check_range("render.width", f64::from(r.width), 1.0, max_dim)?;
        check_range("render.height", f64::from(r.height), 1.0, max_dim)?;
        check_range("render.window_width", f64::from(r.window_width), 1.0, max_dim)?;
        check_range("render.window_height", f64::from(r.window_height), 1.0, max_dim)?;
        if let Shading::Smooth { cell } = r.shading {
            check_range("render.shading.cell", f64::from(cell), 1.0, 256.0)?;
        }

        let n = &self.noise;
        check_range("noise.octaves", f64::from(n.octaves), 1.0, 10.0)?;
        check_range("noise.persistence", f64::from(n.persistence), 0.0, 1.0)?;
        check_range("noise.lacunarity", f64::from(n.lacunarity), 0.0, 10.0)?;
        if n.lacunarity <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "noise.lacunarity",
                value: f64::from(n.lacunarity),
                min: f64::from(f32::MIN_POSITIVE),
                max: 10.0,
            });
        }
        if r.backend == Backend::Gpu && !n.basis.gpu_supported() {
            return Err(ConfigError::Unsupported(format!(
                "noise basis {:?} has no GPU kernel",
                n.basis
            )));
        }

        let v = &self.viewport;
        check_finite("viewport.offset_x", v.offset_x)?;
        check_finite("viewport.offset_y", v.offset_y)?;
        check_range("viewport.translate_speed", f64::from(v.translate_speed), 1.0, 100.0)?;
        check_range("viewport.zoom_speed", f64::from(v.zoom_speed), 1.0, 100.0)?;
        check_finite("viewport.max_scale", v.max_scale)?;
        check_range(
            "viewport.min_scale",
            f64::from(v.min_scale),
            f64::from(f32::MIN_POSITIVE),
            f64::from(v.max_scale),
        )?;
        check_finite("viewport.scale", v.scale)?;
        if v.scale < v.min_scale || v.scale > v.max_scale {
            log::warn!(
                "viewport.scale {} outside [{}, {}], clamping",
                v.scale,
                v.min_scale,
                v.max_scale
            );
        }

        let l = &self.lighting;
        check_range("lighting.step_size", f64::from(l.step_size), 0.0, 10.0)?;
        check_range("lighting.max_steps", f64::from(l.max_steps), 50.0, 10000.0)?;
        check_range("lighting.ambient", f64::from(l.ambient), 0.0, 1.0)?;
        check_range("lighting.height_scale", f64::from(l.height_scale), 1e-3, 1e4)?;
        for c in l.light_pos {
            check_finite("lighting.light_pos", c)?;
        }
        if l.enabled && r.backend != Backend::Gpu {
            log::warn!("Lighting is a GPU post-process; ignored on the CPU backend");
        }

        for (i, interval) in self.gradient.intervals().iter().enumerate() {
            check_finite("gradient.start", interval.start)?;
            check_finite("gradient.end", interval.end)?;
            if !interval.color_start.is_finite() || !interval.color_end.is_finite() {
                return Err(ConfigError::NotFinite {
                    field: "gradient.color",
                });
            }
            if interval.is_degenerate() {
                log::warn!(
                    "Gradient interval {} [{}, {}) is degenerate and will never match",
                    i,
                    interval.start,
                    interval.end
                );
            }
        }
        if self.gradient.is_empty() {
            log::warn!("Gradient is empty; every texel will use the fallback color");
        }

        Ok(())
    }
}

fn check_finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field })
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoiseBasis;

    fn field_of(err: ConfigError) -> &'static str {
        match err {
            ConfigError::OutOfRange { field, .. } | ConfigError::NotFinite { field } => field,
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        PreviewConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_zero_octaves() {
        let mut config = PreviewConfig::default();
        config.noise.octaves = 0;
        assert_eq!(field_of(config.validate().unwrap_err()), "noise.octaves");

        config.noise.octaves = 11;
        assert_eq!(field_of(config.validate().unwrap_err()), "noise.octaves");
    }

    #[test]
    fn test_rejects_out_of_range_fields() {
        let cases: Vec<(&str, Box<dyn Fn(&mut PreviewConfig)>)> = vec![
            ("render.width", Box::new(|c| c.render.width = 0)),
            ("noise.persistence", Box::new(|c| c.noise.persistence = 1.5)),
            ("noise.lacunarity", Box::new(|c| c.noise.lacunarity = 0.0)),
            ("noise.lacunarity", Box::new(|c| c.noise.lacunarity = 12.0)),
            ("viewport.translate_speed", Box::new(|c| c.viewport.translate_speed = 0.5)),
            ("viewport.zoom_speed", Box::new(|c| c.viewport.zoom_speed = 101.0)),
            ("viewport.min_scale", Box::new(|c| c.viewport.min_scale = 5000.0)),
            ("viewport.offset_x", Box::new(|c| c.viewport.offset_x = f32::NAN)),
            ("lighting.step_size", Box::new(|c| c.lighting.step_size = 11.0)),
            ("lighting.max_steps", Box::new(|c| c.lighting.max_steps = 10)),
            ("render.shading.cell", Box::new(|c| c.render.shading = Shading::Smooth { cell: 0 })),
        ];

        for (expected, mutate) in cases {
            let mut config = PreviewConfig::default();
            mutate(&mut config);
            assert_eq!(field_of(config.validate().unwrap_err()), expected);
        }
    }

    #[test]
    fn test_rejects_simplex_on_gpu() {
        let mut config = PreviewConfig::default();
        config.noise.basis = NoiseBasis::OpenSimplex;
        config.validate().unwrap();

        config.render.backend = Backend::Gpu;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Unsupported(_))
        ));
    }

    #[test]
    fn test_degenerate_interval_is_not_an_error() {
        use crate::gradient::{ColorInterval, Rgba};

        let mut config = PreviewConfig::default();
        config.gradient = GradientTable::new(vec![ColorInterval::new(
            0.5,
            0.5,
            Rgba::BLACK,
            Rgba::WHITE,
        )]);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = PreviewConfig::from_ron(
            r#"(
                render: (width: 64, height: 32, backend: Gpu, shading: Smooth(cell: 4)),
                noise: (octaves: 9, lacunarity: 3.0),
                gradient: [
                    (start: 0.0, end: 0.5,
                     color_start: (r: 0.0, g: 0.0, b: 0.0, a: 1.0),
                     color_end: (r: 1.0, g: 1.0, b: 1.0, a: 1.0)),
                ],
            )"#,
        )
        .unwrap();

        assert_eq!(config.render.width, 64);
        assert_eq!(config.render.height, 32);
        assert_eq!(config.render.backend, Backend::Gpu);
        assert_eq!(config.render.shading, Shading::Smooth { cell: 4 });
        assert_eq!(config.noise.octaves, 9);
        assert_eq!(config.noise.lacunarity, 3.0);
        assert_eq!(config.noise.persistence, NoiseConfig::default().persistence);
        assert_eq!(config.viewport, ViewportConfig::default());
        assert_eq!(config.gradient.len(), 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_bundled_config_is_valid() {
        let config = PreviewConfig::from_ron(include_str!("../configs/preview.ron")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.render.backend, Backend::Gpu);
        assert!(config.lighting.enabled);
        assert_eq!(config.gradient.len(), 4);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(PreviewConfig::from_ron("()").unwrap(), PreviewConfig::default());
    }

    #[test]
    fn test_malformed_ron_is_parse_error() {
        assert!(matches!(
            PreviewConfig::from_ron("(render: (width: \"wide\"))"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PreviewConfig::load(Path::new("/nonexistent/noiseview.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
