//! noiseview - interactive fractal noise previewer
//!
//! Pan and zoom an FBM gradient-noise field colored through configurable
//! gradient bands, rendered per texel on the CPU or by a wgpu compute kernel.

use anyhow::{bail, Context, Result};
use clap::Parser;
use winit::event_loop::EventLoop;

use noiseview::app::Viewer;
use noiseview::cli::{Args, Command};
use noiseview::headless;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.load_config().context("Invalid configuration")?;

    match args.command() {
        Command::View => {
            let mut viewer = Viewer::new(config);
            let event_loop = EventLoop::new().context("Failed to create event loop")?;
            event_loop.run_app(&mut viewer)?;
            viewer.finish()?;
        }
        Command::Render { output, heightmap } => {
            headless::export(&config, &output, heightmap.as_deref())?;
        }
        Command::Compare { tolerance } => {
            let delta = headless::compare(&config)?;
            if delta > tolerance {
                bail!("CPU and GPU frames differ by {:e} (tolerance {:e})", delta, tolerance);
            }
            log::info!("CPU and GPU frames agree within {:e}", tolerance);
        }
    }

    Ok(())
}
