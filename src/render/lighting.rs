//! Ray-marched post-process over the compute kernel's color and height outputs.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::params::LightingConfig;

use super::gpu::{storage_texture, workgroups};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LightingUniforms {
    /// Light position: x/y in texels, z in elevation units
    pub light_pos: [f32; 3],
    pub step_size: f32,
    pub max_steps: u32,
    pub height_scale: f32,
    pub ambient: f32,
    pub _padding: f32,
}

impl From<&LightingConfig> for LightingUniforms {
    fn from(config: &LightingConfig) -> Self {
        Self {
            light_pos: config.light_pos,
            step_size: config.step_size,
            max_steps: config.max_steps,
            height_scale: config.height_scale,
            ambient: config.ambient,
            _padding: 0.0,
        }
    }
}

/// Second compute stage writing the lit frame into its own texture
pub struct LightingPass {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    output: wgpu::Texture,
}

impl LightingPass {
    /// Build the stage reading `image` and `heightmap`.
    /// Validation errors surface through the caller's error scope.
    pub fn new(
        device: &wgpu::Device,
        config: &LightingConfig,
        image: &wgpu::Texture,
        heightmap: &wgpu::Texture,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lighting Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("lighting.wgsl").into()),
        });

        let uniforms = LightingUniforms::from(config);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lighting Uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let output = storage_texture(
            device,
            "Lit Image",
            image.width(),
            image.height(),
            wgpu::TextureFormat::Rgba32Float,
        );

        let sampled = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lighting Bind Group Layout"),
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
                sampled(1),
                sampled(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba32Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let image_view = image.create_view(&wgpu::TextureViewDescriptor::default());
        let height_view = heightmap.create_view(&wgpu::TextureViewDescriptor::default());
        let output_view = output.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lighting Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&image_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&height_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&output_view),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lighting Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Lighting Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            bind_group,
            output,
        }
    }

    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Lighting Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(
            workgroups(self.output.width()),
            workgroups(self.output.height()),
            1,
        );
    }

    pub fn output(&self) -> &wgpu::Texture {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout_matches_wgsl() {
        // vec3 + f32 share the first 16 bytes; the struct rounds up to 32
        assert_eq!(std::mem::size_of::<LightingUniforms>(), 32);
        assert_eq!(std::mem::offset_of!(LightingUniforms, step_size), 12);
        assert_eq!(std::mem::offset_of!(LightingUniforms, max_steps), 16);
    }

    #[test]
    fn test_uniforms_from_config() {
        let config = LightingConfig::default();
        let uniforms = LightingUniforms::from(&config);
        assert_eq!(uniforms.light_pos, config.light_pos);
        assert_eq!(uniforms.max_steps, config.max_steps);
        assert_eq!(uniforms.ambient, config.ambient);
    }
}
