//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::ConfigError;
use crate::params::{Backend, PreviewConfig};
use crate::viewport::CoordinateMapping;

/// Command line arguments; every override is applied on top of the config file
#[derive(Parser, Debug)]
#[command(name = "noiseview")]
#[command(about = "Fractal noise previewer with CPU and GPU render paths", long_about = None)]
pub struct Args {
    /// RON config file (defaults apply when omitted)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Render path
    #[arg(long, value_enum, global = true)]
    pub backend: Option<Backend>,

    /// Noise texture width (texels)
    #[arg(long, global = true)]
    pub width: Option<u32>,

    /// Noise texture height (texels)
    #[arg(long, global = true)]
    pub height: Option<u32>,

    /// FBM octave count, 1..=10
    #[arg(long, global = true)]
    pub octaves: Option<u32>,

    /// Amplitude falloff per octave, 0..=1
    #[arg(long, global = true)]
    pub persistence: Option<f32>,

    /// Frequency growth per octave, (0, 10]
    #[arg(long, global = true)]
    pub lacunarity: Option<f32>,

    /// Permutation seed (0 = reference table)
    #[arg(long, global = true)]
    pub seed: Option<u32>,

    /// Texel-to-plane mapping
    #[arg(long, value_enum, global = true)]
    pub mapping: Option<CoordinateMapping>,

    /// Enable ray-marched lighting (GPU backend)
    #[arg(long, global = true)]
    pub lighting: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Interactive pan/zoom window (default)
    View,

    /// Write the initial view to a PNG
    Render {
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Also write the raw height map as grayscale (GPU backend)
        #[arg(long, value_name = "PATH")]
        heightmap: Option<PathBuf>,
    },

    /// Render on both paths and fail if they disagree
    Compare {
        #[arg(long, default_value_t = 1e-4)]
        tolerance: f32,
    },
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::View)
    }

    /// Load the config file (or defaults), apply overrides, and validate
    pub fn load_config(&self) -> Result<PreviewConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => PreviewConfig::load(path)?,
            None => PreviewConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut PreviewConfig) {
        if let Some(backend) = self.backend {
            config.render.backend = backend;
        }
        if let Some(width) = self.width {
            config.render.width = width;
        }
        if let Some(height) = self.height {
            config.render.height = height;
        }
        if let Some(octaves) = self.octaves {
            config.noise.octaves = octaves;
        }
        if let Some(persistence) = self.persistence {
            config.noise.persistence = persistence;
        }
        if let Some(lacunarity) = self.lacunarity {
            config.noise.lacunarity = lacunarity;
        }
        if let Some(seed) = self.seed {
            config.noise.seed = seed;
        }
        if let Some(mapping) = self.mapping {
            config.viewport.mapping = mapping;
        }
        if self.lighting {
            config.lighting.enabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("noiseview").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_command_is_view() {
        assert_eq!(parse(&[]).command(), Command::View);
    }

    #[test]
    fn test_overrides_apply() {
        let args = parse(&[
            "--backend",
            "gpu",
            "--octaves",
            "9",
            "--lacunarity",
            "3.0",
            "--mapping",
            "corner",
            "--lighting",
        ]);
        let config = args.load_config().unwrap();
        assert_eq!(config.render.backend, Backend::Gpu);
        assert_eq!(config.noise.octaves, 9);
        assert_eq!(config.noise.lacunarity, 3.0);
        assert_eq!(config.viewport.mapping, CoordinateMapping::Corner);
        assert!(config.lighting.enabled);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&["render", "--output", "out.png", "--width", "64"]);
        assert_eq!(
            args.command(),
            Command::Render {
                output: PathBuf::from("out.png"),
                heightmap: None,
            }
        );
        assert_eq!(args.load_config().unwrap().render.width, 64);
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let args = parse(&["--octaves", "0"]);
        assert!(matches!(
            args.load_config(),
            Err(ConfigError::OutOfRange {
                field: "noise.octaves",
                ..
            })
        ));
    }

    #[test]
    fn test_compare_default_tolerance() {
        assert_eq!(parse(&["compare"]).command(), Command::Compare { tolerance: 1e-4 });
    }
}
