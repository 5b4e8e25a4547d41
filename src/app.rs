//! Interactive viewer: winit event loop driving the viewport and a renderer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec2;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::error::Error;
use crate::fps::FpsTracker;
use crate::noise::NoiseParameters;
use crate::params::{Backend, PreviewConfig};
use crate::render::{CpuRenderer, GpuContext, GpuRenderer};
use crate::rendering::Presenter;
use crate::viewport::{ViewportState, ViewportTransform};

/// Held keys and accumulated scroll since the last cycle
#[derive(Debug, Default)]
struct InputState {
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    zoom_in: bool,
    zoom_out: bool,
    scroll: f32,
}

impl InputState {
    /// Track a pan/zoom key; returns false for keys the viewer ignores
    fn set_key(&mut self, key: KeyCode, pressed: bool) -> bool {
        let slot = match key {
            KeyCode::KeyA | KeyCode::ArrowLeft => &mut self.left,
            KeyCode::KeyD | KeyCode::ArrowRight => &mut self.right,
            KeyCode::KeyW | KeyCode::ArrowUp => &mut self.up,
            KeyCode::KeyS | KeyCode::ArrowDown => &mut self.down,
            KeyCode::Equal | KeyCode::NumpadAdd => &mut self.zoom_in,
            KeyCode::Minus | KeyCode::NumpadSubtract => &mut self.zoom_out,
            _ => return false,
        };
        *slot = pressed;
        true
    }

    fn scroll(&mut self, delta: MouseScrollDelta) {
        self.scroll += match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
        };
    }

    /// Texel-space pan direction: +x right, +y down the frame
    fn pan_axis(&self) -> Vec2 {
        let axis = |neg: bool, pos: bool| f32::from(u8::from(pos)) - f32::from(u8::from(neg));
        Vec2::new(axis(self.left, self.right), axis(self.up, self.down))
    }

    /// Zoom axis for this cycle; consumes accumulated scroll
    fn take_zoom(&mut self) -> f32 {
        let held = f32::from(u8::from(self.zoom_in)) - f32::from(u8::from(self.zoom_out));
        let zoom = self.scroll + held;
        self.scroll = 0.0;
        zoom
    }
}

enum FrameSource {
    Cpu(CpuRenderer),
    Gpu(GpuRenderer),
}

/// Everything that exists once the window is open
struct ViewerState {
    window: Arc<Window>,
    ctx: GpuContext,
    presenter: Presenter,
    source: FrameSource,
    transform: ViewportTransform,
    viewport: ViewportState,
    noise: NoiseParameters,
    input: InputState,
    last_cycle: Instant,
    /// CPU frames are only regenerated when this is set
    stale: bool,
    fps: FpsTracker,
}

impl ViewerState {
    fn new(event_loop: &ActiveEventLoop, config: &PreviewConfig) -> Result<Self, Error> {
        config.validate()?;
        let window_attributes = Window::default_attributes()
            .with_title("noiseview")
            .with_inner_size(winit::dpi::LogicalSize::new(
                config.render.window_width,
                config.render.window_height,
            ));
        let window = Arc::new(event_loop.create_window(window_attributes)?);

        let instance = GpuContext::create_instance();
        let surface = instance
            .create_surface(Arc::clone(&window))
            .map_err(crate::error::GpuError::from)?;
        let ctx = pollster::block_on(GpuContext::new(instance, Some(&surface)))?;

        let presenter = Presenter::new(
            &ctx,
            surface,
            window.inner_size(),
            config.render.width,
            config.render.height,
        );

        let source = match config.render.backend {
            Backend::Cpu => FrameSource::Cpu(CpuRenderer::from_config(config)),
            Backend::Gpu => {
                FrameSource::Gpu(pollster::block_on(GpuRenderer::from_config(&ctx, config))?)
            }
        };

        let transform = ViewportTransform::new(&config.viewport);
        let viewport = transform.initial_state(&config.viewport);

        log::info!("Viewer running on the {:?} backend", config.render.backend);
        log::info!("WASD/arrows pan, scroll or +/- zoom, R resets, Esc quits");

        Ok(Self {
            window,
            ctx,
            presenter,
            source,
            transform,
            viewport,
            noise: config.noise.parameters(),
            input: InputState::default(),
            last_cycle: Instant::now(),
            stale: true,
            fps: FpsTracker::new(Duration::from_secs(1)),
        })
    }

    /// One input/regenerate/present cycle
    fn cycle(&mut self) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let dt = (now - self.last_cycle).as_secs_f32();
        self.last_cycle = now;

        let pan = self.input.pan_axis();
        let zoom = self.input.take_zoom();
        if self.transform.apply_input(&mut self.viewport, pan, zoom, dt) {
            self.stale = true;
        }

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Cycle Encoder"),
            });

        match &self.source {
            FrameSource::Cpu(renderer) => {
                if self.stale {
                    let frame = renderer.render(&self.viewport, &self.noise);
                    self.presenter.upload(&self.ctx, &frame);
                }
            }
            // Regenerated every cycle, changed or not
            FrameSource::Gpu(renderer) => {
                renderer.encode(&self.ctx, &mut encoder, &self.viewport, &self.noise);
                self.presenter
                    .copy_from(&mut encoder, renderer.output_texture());
            }
        }
        self.stale = false;

        self.presenter.present(&self.ctx, encoder)?;
        self.fps.record_frame();
        Ok(())
    }

    fn reset_view(&mut self, config: &PreviewConfig) {
        self.viewport = self.transform.initial_state(&config.viewport);
        self.stale = true;
    }
}

/// winit application; reports a fatal setup error through [`Viewer::finish`]
pub struct Viewer {
    config: PreviewConfig,
    state: Option<ViewerState>,
    error: Option<Error>,
}

impl Viewer {
    pub fn new(config: PreviewConfig) -> Self {
        Self {
            config,
            state: None,
            error: None,
        }
    }

    /// Consume the viewer after the event loop returns
    pub fn finish(self) -> Result<(), Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return; // Already initialized
        }

        match ViewerState::new(event_loop, &self.config) {
            Ok(state) => self.state = Some(state),
            Err(err) => {
                log::error!("Viewer setup failed: {}", err);
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: key_state,
                        physical_key: PhysicalKey::Code(key),
                        ..
                    },
                ..
            } => {
                let pressed = key_state == ElementState::Pressed;
                match key {
                    KeyCode::Escape if pressed => event_loop.exit(),
                    KeyCode::KeyR if pressed => state.reset_view(&self.config),
                    _ => {
                        state.input.set_key(key, pressed);
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => state.input.scroll(delta),
            WindowEvent::Resized(physical_size) => {
                state.presenter.resize(&state.ctx, physical_size);
            }
            WindowEvent::RedrawRequested => match state.cycle() {
                Ok(_) => {}
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    let size = state.presenter.size();
                    state.presenter.resize(&state.ctx, size);
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    log::error!("Surface out of memory, exiting");
                    event_loop.exit();
                }
                // Previous frame stays on screen
                Err(e) => log::warn!("Render error: {:?}", e),
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_input_is_zero() {
        let mut input = InputState::default();
        assert_eq!(input.pan_axis(), Vec2::ZERO);
        assert_eq!(input.take_zoom(), 0.0);
    }

    #[test]
    fn test_pan_keys() {
        let mut input = InputState::default();
        assert!(input.set_key(KeyCode::KeyD, true));
        assert!(input.set_key(KeyCode::ArrowUp, true));
        assert_eq!(input.pan_axis(), Vec2::new(1.0, -1.0));

        input.set_key(KeyCode::KeyA, true);
        assert_eq!(input.pan_axis(), Vec2::new(0.0, -1.0));

        input.set_key(KeyCode::ArrowUp, false);
        assert_eq!(input.pan_axis(), Vec2::ZERO);
        assert!(!input.set_key(KeyCode::KeyQ, true));
    }

    #[test]
    fn test_scroll_is_consumed_once() {
        let mut input = InputState::default();
        input.scroll(MouseScrollDelta::LineDelta(0.0, 2.0));
        input.scroll(MouseScrollDelta::LineDelta(0.0, -0.5));
        assert_eq!(input.take_zoom(), 1.5);
        assert_eq!(input.take_zoom(), 0.0);
    }

    #[test]
    fn test_held_zoom_keys() {
        let mut input = InputState::default();
        input.set_key(KeyCode::Minus, true);
        assert_eq!(input.take_zoom(), -1.0);
        assert_eq!(input.take_zoom(), -1.0);
    }
}
