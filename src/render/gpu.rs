//! GPU render path: one compute dispatch per frame, optional lighting stage,
//! and padded texture readback for export and comparison.

use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::error::GpuError;
use crate::gradient::{GradientTable, IntervalRecord, Rgba};
use crate::noise::{NoiseParameters, Permutation};
use crate::params::{LightingConfig, PreviewConfig};
use crate::viewport::ViewportState;

use super::lighting::LightingPass;
use super::{FrameSettings, HeightMap, PixelBuffer};

const WORKGROUP_SIZE: u32 = 8;

/// Bytes per texel of the color and height textures
const IMAGE_TEXEL_BYTES: u32 = 16;
const HEIGHT_TEXEL_BYTES: u32 = 4;

/// Kernel uniform block; field order matches `KernelParams` in noise.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct KernelParams {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub octaves: u32,
    pub interval_count: u32,
    pub shading: u32,
    pub mapping: u32,
    pub cell_size: u32,
}

impl KernelParams {
    pub fn new(
        settings: &FrameSettings,
        viewport: &ViewportState,
        noise: &NoiseParameters,
        interval_count: u32,
    ) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            scale: viewport.scale,
            offset_x: viewport.offset_x,
            offset_y: viewport.offset_y,
            persistence: noise.persistence,
            lacunarity: noise.lacunarity,
            octaves: noise.octaves,
            interval_count,
            shading: settings.shading.kernel_id(),
            mapping: settings.mapping.kernel_id(),
            cell_size: settings.shading.cell_size(),
        }
    }
}

/// Adapter, device and queue shared by the renderer and the presenter
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub fn create_instance() -> wgpu::Instance {
        wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        })
    }

    /// Request an adapter (compatible with `surface` when given) and a device
    pub async fn new(
        instance: wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Noiseview Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Context with no presentation surface, for export and comparison
    pub async fn headless() -> Result<Self, GpuError> {
        Self::new(Self::create_instance(), None).await
    }
}

/// Read back result of one dispatch
pub struct GpuFrame {
    /// Final colors, lit when the lighting stage is enabled
    pub image: PixelBuffer,
    pub heightmap: HeightMap,
}

pub struct GpuRenderer {
    settings: FrameSettings,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    params_buffer: wgpu::Buffer,
    image: wgpu::Texture,
    heightmap: wgpu::Texture,
    lighting: Option<LightingPass>,
    interval_count: u32,
}

impl GpuRenderer {
    /// Compile the kernel and allocate its resources.
    ///
    /// The permutation and gradient are uploaded once here; later frames
    /// only rewrite the uniform block.
    pub async fn new(
        ctx: &GpuContext,
        settings: FrameSettings,
        permutation: &Permutation,
        gradient: &GradientTable,
        lighting: Option<&LightingConfig>,
    ) -> Result<Self, GpuError> {
        let device = &ctx.device;
        check_frame_limits(&settings, &device.limits())?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Noise Kernel"),
            source: wgpu::ShaderSource::Wgsl(include_str!("noise.wgsl").into()),
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Kernel Params"),
            size: std::mem::size_of::<KernelParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Storage bindings cannot be empty
        let mut records = gradient.to_records();
        if records.is_empty() {
            records.push(IntervalRecord::zeroed());
        }
        let interval_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Gradient Intervals"),
            contents: bytemuck::cast_slice(&records),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let perm_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Permutation"),
            contents: bytemuck::cast_slice(permutation.as_slice()),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let image = storage_texture(
            device,
            "Noise Image",
            settings.width,
            settings.height,
            wgpu::TextureFormat::Rgba32Float,
        );
        let heightmap = storage_texture(
            device,
            "Noise Heights",
            settings.width,
            settings.height,
            wgpu::TextureFormat::R32Float,
        );

        let storage_buffer = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let storage_image = |binding, format| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Noise Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_buffer(1),
                storage_buffer(2),
                storage_image(3, wgpu::TextureFormat::Rgba32Float),
                storage_image(4, wgpu::TextureFormat::R32Float),
            ],
        });

        let image_view = image.create_view(&wgpu::TextureViewDescriptor::default());
        let height_view = heightmap.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Noise Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: interval_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: perm_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&image_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&height_view),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Noise Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Noise Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let lighting = lighting.map(|config| LightingPass::new(device, config, &image, &heightmap));

        if let Some(err) = device.pop_error_scope().await {
            return Err(GpuError::Validation(err.to_string()));
        }

        log::info!(
            "GPU renderer ready: {}x{}, {} gradient intervals, lighting {}",
            settings.width,
            settings.height,
            gradient.len(),
            if lighting.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            settings,
            pipeline,
            bind_group,
            params_buffer,
            image,
            heightmap,
            lighting,
            interval_count: gradient.len() as u32,
        })
    }

    pub async fn from_config(ctx: &GpuContext, config: &PreviewConfig) -> Result<Self, GpuError> {
        let lighting = config.lighting.enabled.then_some(&config.lighting);
        Self::new(
            ctx,
            FrameSettings::from_config(config),
            &Permutation::from_seed(config.noise.seed),
            &config.gradient,
            lighting,
        )
        .await
    }

    /// Upload this frame's uniforms and record the kernel (and lighting) passes
    pub fn encode(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        viewport: &ViewportState,
        noise: &NoiseParameters,
    ) {
        let params = KernelParams::new(&self.settings, viewport, noise, self.interval_count);
        ctx.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Noise Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(
                workgroups(self.settings.width),
                workgroups(self.settings.height),
                1,
            );
        }

        if let Some(lighting) = &self.lighting {
            lighting.encode(encoder);
        }
    }

    /// Texture holding the final colors of the last encoded frame
    pub fn output_texture(&self) -> &wgpu::Texture {
        match &self.lighting {
            Some(lighting) => lighting.output(),
            None => &self.image,
        }
    }

    /// Render one frame and read it back
    pub async fn dispatch(
        &self,
        ctx: &GpuContext,
        viewport: &ViewportState,
        noise: &NoiseParameters,
    ) -> Result<GpuFrame, GpuError> {
        let start = Instant::now();
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Dispatch Encoder"),
            });

        self.encode(ctx, &mut encoder, viewport, noise);
        let image = Readback::stage(
            &ctx.device,
            &mut encoder,
            self.output_texture(),
            IMAGE_TEXEL_BYTES,
        );
        let heights = Readback::stage(
            &ctx.device,
            &mut encoder,
            &self.heightmap,
            HEIGHT_TEXEL_BYTES,
        );
        ctx.queue.submit(Some(encoder.finish()));

        let colors = image.read(&ctx.device).await?;
        let values = heights.read(&ctx.device).await?;

        let FrameSettings { width, height, .. } = self.settings;
        let pixels = colors
            .chunks_exact(4)
            .map(|c| Rgba::new(c[0], c[1], c[2], c[3]))
            .collect();

        log::debug!(
            "GPU frame {}x{} in {:.2}ms (including readback)",
            width,
            height,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(GpuFrame {
            image: PixelBuffer::from_pixels(width, height, pixels),
            heightmap: HeightMap::from_values(width, height, values),
        })
    }
}

/// Reject frames whose textures or readback buffers the device cannot hold.
///
/// Readback buffers are created outside any error scope, so an oversized one
/// would surface as an uncaptured device error rather than a `GpuError`.
fn check_frame_limits(settings: &FrameSettings, limits: &wgpu::Limits) -> Result<(), GpuError> {
    let FrameSettings { width, height, .. } = *settings;
    let limit = limits.max_texture_dimension_2d;
    if width > limit || height > limit {
        return Err(GpuError::FrameTooLarge {
            width,
            height,
            limit,
        });
    }

    let size = staging_size(width, height, IMAGE_TEXEL_BYTES);
    if size > limits.max_buffer_size {
        return Err(GpuError::ReadbackTooLarge {
            width,
            height,
            size,
            limit: limits.max_buffer_size,
        });
    }
    Ok(())
}

fn padded_bytes_per_row(width: u32, bytes_per_texel: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * bytes_per_texel).div_ceil(align) * align
}

/// Size of the staging buffer a readback of this frame allocates
fn staging_size(width: u32, height: u32, bytes_per_texel: u32) -> u64 {
    u64::from(padded_bytes_per_row(width, bytes_per_texel)) * u64::from(height)
}

pub(super) fn workgroups(extent: u32) -> u32 {
    extent.div_ceil(WORKGROUP_SIZE)
}

/// Texture written by a compute stage and readable by later stages and copies
pub(super) fn storage_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Staging copy of a float texture with rows padded to the copy alignment
struct Readback {
    buffer: wgpu::Buffer,
    height: u32,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
}

impl Readback {
    fn stage(
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        bytes_per_texel: u32,
    ) -> Self {
        let width = texture.width();
        let height = texture.height();
        let unpadded_bytes_per_row = width * bytes_per_texel;
        let padded_bytes_per_row = padded_bytes_per_row(width, bytes_per_texel);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: staging_size(width, height, bytes_per_texel),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        Self {
            buffer,
            height,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
        }
    }

    /// Map the staging buffer and strip row padding
    async fn read(self, device: &wgpu::Device) -> Result<Vec<f32>, GpuError> {
        let slice = self.buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // Receiver only disappears if the caller was dropped
            let _ = sender.send(result);
        });

        device.poll(wgpu::Maintain::Wait);
        receiver.await.map_err(|_| GpuError::ReadbackCancelled)??;

        let data = slice.get_mapped_range();
        let mut values =
            Vec::with_capacity((self.unpadded_bytes_per_row / 4 * self.height) as usize);
        for row in 0..self.height {
            let start = (row * self.padded_bytes_per_row) as usize;
            let end = start + self.unpadded_bytes_per_row as usize;
            values.extend_from_slice(bytemuck::cast_slice(&data[start..end]));
        }

        drop(data);
        self.buffer.unmap();
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::ColorInterval;
    use crate::noise::GradientNoise;
    use crate::render::{CpuRenderer, Shading};
    use crate::viewport::CoordinateMapping;

    const TOLERANCE: f32 = 1e-4;

    fn context() -> Option<GpuContext> {
        match pollster::block_on(GpuContext::headless()) {
            Ok(ctx) => Some(ctx),
            Err(err) => {
                eprintln!("Skipping GPU test: {}", err);
                None
            }
        }
    }

    fn settings(shading: Shading) -> FrameSettings {
        FrameSettings {
            width: 64,
            height: 64,
            mapping: CoordinateMapping::Centered,
            shading,
        }
    }

    fn mirrored_bands() -> GradientTable {
        GradientTable::new(vec![
            ColorInterval::new(0.0, 0.5, Rgba::BLACK, Rgba::WHITE),
            ColorInterval::new(0.5, 1.0, Rgba::WHITE, Rgba::BLACK),
        ])
    }

    fn high_octave_params() -> NoiseParameters {
        NoiseParameters {
            octaves: 9,
            persistence: 0.5,
            lacunarity: 3.0,
        }
    }

    fn view() -> ViewportState {
        ViewportState::new(100.0, 100.0, 20.0)
    }

    fn cpu_frame(shading: Shading, gradient: &GradientTable) -> PixelBuffer {
        CpuRenderer::new(
            settings(shading),
            Box::new(GradientNoise::new(Permutation::default())),
            gradient.clone(),
        )
        .render(&view(), &high_octave_params())
    }

    fn gpu_frame(
        ctx: &GpuContext,
        shading: Shading,
        gradient: &GradientTable,
        lighting: Option<&LightingConfig>,
    ) -> GpuFrame {
        let renderer = pollster::block_on(GpuRenderer::new(
            ctx,
            settings(shading),
            &Permutation::default(),
            gradient,
            lighting,
        ))
        .unwrap();
        pollster::block_on(renderer.dispatch(ctx, &view(), &high_octave_params())).unwrap()
    }

    #[test]
    fn test_kernel_params_layout() {
        assert_eq!(std::mem::size_of::<KernelParams>(), 48);
        assert_eq!(
            std::mem::size_of::<IntervalRecord>(),
            crate::gradient::RECORD_STRIDE_FLOATS * 4
        );
    }

    #[test]
    fn test_kernel_params_from_settings() {
        let params = KernelParams::new(
            &settings(Shading::Smooth { cell: 4 }),
            &view(),
            &high_octave_params(),
            2,
        );
        assert_eq!(params.shading, 2);
        assert_eq!(params.cell_size, 4);
        assert_eq!(params.mapping, 0);
        assert_eq!(params.octaves, 9);
        assert_eq!(params.interval_count, 2);
    }

    #[test]
    fn test_workgroup_count_covers_frame() {
        assert_eq!(workgroups(64), 8);
        assert_eq!(workgroups(65), 9);
        assert_eq!(workgroups(1), 1);
    }

    #[test]
    fn test_rows_pad_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(64, IMAGE_TEXEL_BYTES), 1024);
        assert_eq!(padded_bytes_per_row(65, HEIGHT_TEXEL_BYTES), 512);
        assert_eq!(staging_size(4200, 4200, IMAGE_TEXEL_BYTES), 4224 * 16 * 4200);
    }

    #[test]
    fn test_frame_limits_bound_readback_size() {
        let limits = wgpu::Limits::default();
        let sized = |width, height| FrameSettings {
            width,
            height,
            ..settings(Shading::Gradient)
        };

        // 4096 * 16 bytes per row is already aligned: exactly 256 MiB
        assert!(check_frame_limits(&sized(4096, 4096), &limits).is_ok());
        assert!(matches!(
            check_frame_limits(&sized(4200, 4200), &limits),
            Err(GpuError::ReadbackTooLarge { size, limit, .. }) if size > limit
        ));
        assert!(matches!(
            check_frame_limits(&sized(9000, 16), &limits),
            Err(GpuError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_gpu_matches_cpu() {
        let Some(ctx) = context() else { return };
        let gradient = mirrored_bands();

        let cpu = cpu_frame(Shading::Gradient, &gradient);
        let gpu = gpu_frame(&ctx, Shading::Gradient, &gradient, None);

        let delta = cpu.max_channel_delta(&gpu.image);
        assert!(delta < TOLERANCE, "max channel delta {} exceeds {}", delta, TOLERANCE);
    }

    #[test]
    fn test_gpu_heightmap_matches_grayscale() {
        let Some(ctx) = context() else { return };
        let gradient = mirrored_bands();

        let gray = cpu_frame(Shading::Grayscale, &gradient);
        let gpu = gpu_frame(&ctx, Shading::Gradient, &gradient, None);

        for y in 0..64 {
            for x in 0..64 {
                let delta = (gray.get(x, y).r - gpu.heightmap.get(x, y)).abs();
                assert!(delta < TOLERANCE, "texel ({}, {}) differs by {}", x, y, delta);
            }
        }
    }

    #[test]
    fn test_gpu_smooth_matches_cpu() {
        let Some(ctx) = context() else { return };
        let gradient = GradientTable::terrain();
        let shading = Shading::Smooth { cell: 4 };

        let cpu = cpu_frame(shading, &gradient);
        let gpu = gpu_frame(&ctx, shading, &gradient, None);
        assert!(cpu.max_channel_delta(&gpu.image) < TOLERANCE);
    }

    #[test]
    fn test_gpu_empty_gradient_is_fallback() {
        let Some(ctx) = context() else { return };
        let gpu = gpu_frame(&ctx, Shading::Gradient, &GradientTable::default(), None);
        assert!(gpu.image.pixels().iter().all(|p| *p == Rgba::FALLBACK));
    }

    #[test]
    fn test_full_ambient_lighting_is_identity() {
        let Some(ctx) = context() else { return };
        let gradient = GradientTable::terrain();
        let lighting = LightingConfig {
            enabled: true,
            ambient: 1.0,
            ..LightingConfig::default()
        };

        let unlit = gpu_frame(&ctx, Shading::Gradient, &gradient, None);
        let lit = gpu_frame(&ctx, Shading::Gradient, &gradient, Some(&lighting));
        assert_eq!(unlit.image, lit.image);
    }

    #[test]
    fn test_lighting_darkens_and_keeps_alpha() {
        let Some(ctx) = context() else { return };
        let gradient = GradientTable::terrain();
        let lighting = LightingConfig {
            enabled: true,
            ambient: 0.2,
            ..LightingConfig::default()
        };

        let unlit = gpu_frame(&ctx, Shading::Gradient, &gradient, None);
        let lit = gpu_frame(&ctx, Shading::Gradient, &gradient, Some(&lighting));

        for (before, after) in unlit.image.pixels().iter().zip(lit.image.pixels()) {
            assert_eq!(before.a, after.a);
            assert!(after.r <= before.r + 1e-6);
            assert!(after.r >= before.r * 0.2 - 1e-6);
        }
    }
}
