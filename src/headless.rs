//! Single-frame commands that run without a window: PNG export and
//! CPU/GPU comparison.

use std::path::Path;

use crate::error::{ConfigError, Error, GpuError};
use crate::params::{Backend, PreviewConfig};
use crate::render::{CpuRenderer, GpuContext, GpuRenderer, HeightMap, PixelBuffer};
use crate::viewport::ViewportTransform;

/// Render the configured initial view on the configured backend
pub fn render_frame(config: &PreviewConfig) -> Result<(PixelBuffer, Option<HeightMap>), Error> {
    config.validate()?;
    let viewport = ViewportTransform::new(&config.viewport).initial_state(&config.viewport);
    let noise = config.noise.parameters();

    match config.render.backend {
        Backend::Cpu => {
            let frame = CpuRenderer::from_config(config).render(&viewport, &noise);
            Ok((frame, None))
        }
        Backend::Gpu => {
            let frame = pollster::block_on(async {
                let ctx = GpuContext::headless().await?;
                let renderer = GpuRenderer::from_config(&ctx, config).await?;
                renderer.dispatch(&ctx, &viewport, &noise).await
            })?;
            Ok((frame.image, Some(frame.heightmap)))
        }
    }
}

/// Write the initial view as an 8-bit PNG, plus the height map when asked
pub fn export(
    config: &PreviewConfig,
    output: &Path,
    heightmap: Option<&Path>,
) -> Result<(), Error> {
    if heightmap.is_some() && config.render.backend != Backend::Gpu {
        return Err(ConfigError::Unsupported(
            "height map export needs the GPU backend".to_string(),
        )
        .into());
    }

    let (frame, heights) = render_frame(config)?;
    frame.to_image().save(output)?;
    log::info!(
        "Wrote {}x{} frame to {}",
        frame.width(),
        frame.height(),
        output.display()
    );

    if let (Some(path), Some(heights)) = (heightmap, heights) {
        heights.to_image().save(path)?;
        log::info!("Wrote height map to {}", path.display());
    }
    Ok(())
}

/// Render the initial view on both paths and return the largest channel deviation.
///
/// The configured backend and lighting are ignored: both paths render the
/// unlit frame.
pub fn compare(config: &PreviewConfig) -> Result<f32, Error> {
    config.validate()?;
    if !config.noise.basis.gpu_supported() {
        return Err(ConfigError::Unsupported(format!(
            "noise basis {:?} has no GPU kernel",
            config.noise.basis
        ))
        .into());
    }

    let mut unlit = config.clone();
    unlit.lighting.enabled = false;

    let viewport = ViewportTransform::new(&unlit.viewport).initial_state(&unlit.viewport);
    let noise = unlit.noise.parameters();

    let cpu = CpuRenderer::from_config(&unlit).render(&viewport, &noise);
    let gpu = pollster::block_on(async {
        let ctx = GpuContext::headless().await?;
        let renderer = GpuRenderer::from_config(&ctx, &unlit).await?;
        Ok::<_, GpuError>(renderer.dispatch(&ctx, &viewport, &noise).await?)
    })?;

    let delta = cpu.max_channel_delta(&gpu.image);
    log::info!(
        "CPU/GPU max channel deviation over {}x{}: {:e}",
        cpu.width(),
        cpu.height(),
        delta
    );
    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoiseBasis;

    fn small_config() -> PreviewConfig {
        let mut config = PreviewConfig::default();
        config.render.width = 16;
        config.render.height = 16;
        config
    }

    #[test]
    fn test_cpu_render_frame() {
        let (frame, heights) = render_frame(&small_config()).unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 16));
        assert!(heights.is_none());
    }

    #[test]
    fn test_cpu_heightmap_export_is_rejected() {
        let dir = std::env::temp_dir();
        let err = export(
            &small_config(),
            &dir.join("noiseview_frame.png"),
            Some(&dir.join("noiseview_heights.png")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Unsupported(_))));
    }

    #[test]
    fn test_cpu_export_writes_png() {
        let path =
            std::env::temp_dir().join(format!("noiseview_export_{}.png", std::process::id()));
        export(&small_config(), &path, None).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (16, 16));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_inverted_scale_limits_are_rejected() {
        let mut config = small_config();
        config.viewport.min_scale = 10.0;
        config.viewport.max_scale = 1.0;

        for result in [render_frame(&config).map(|_| ()), compare(&config).map(|_| ())] {
            assert!(matches!(
                result,
                Err(Error::Config(ConfigError::OutOfRange {
                    field: "viewport.min_scale",
                    ..
                }))
            ));
        }
    }

    #[test]
    fn test_compare_rejects_cpu_only_basis() {
        let mut config = small_config();
        config.noise.basis = NoiseBasis::OpenSimplex;
        assert!(matches!(
            compare(&config),
            Err(Error::Config(ConfigError::Unsupported(_)))
        ));
    }
}
