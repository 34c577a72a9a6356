use bytemuck::{Pod, Zeroable};
use pixelscene_render::PixelationConfig;
use wgpu::util::DeviceExt;

use crate::shaders;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct PixelateParams {
    resolution: [f32; 2],
    grid: [f32; 2],
    pixel_size: f32,
    normal_edge_strength: f32,
    depth_edge_strength: f32,
    _pad: f32,
}

impl PixelateParams {
    pub(crate) fn new(config: &PixelationConfig, viewport: (u32, u32)) -> Self {
        let (gw, gh) = config.grid_size(viewport.0, viewport.1);
        Self {
            resolution: [viewport.0 as f32, viewport.1 as f32],
            grid: [gw as f32, gh as f32],
            pixel_size: config.pixel_size as f32,
            normal_edge_strength: config.normal_edge_strength,
            depth_edge_strength: config.depth_edge_strength,
            _pad: 0.0,
        }
    }
}

/// Full-screen pass reading the low-resolution targets with `textureLoad`.
///
/// The pipeline and layout are built once. Only the parameter uniform and
/// the bind group (when the targets are reallocated) change afterwards.
pub(crate) struct PixelatePass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl PixelatePass {
    pub(crate) fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
        color: &wgpu::TextureView,
        normal_depth: &wgpu::TextureView,
        params: PixelateParams,
    ) -> Self {
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pixelate_params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let unfiltered = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pixelate_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                unfiltered(1),
                unfiltered(2),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pixelate_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pixelate_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::PIXELATE_SHADER.into()),
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("pixelate_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_fullscreen"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_pixelate"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: output_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let bind_group = Self::bind(device, &layout, &params_buffer, color, normal_depth);
        Self {
            pipeline,
            layout,
            params: params_buffer,
            bind_group,
        }
    }

    fn bind(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        params: &wgpu::Buffer,
        color: &wgpu::TextureView,
        normal_depth: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pixelate_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(color),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(normal_depth),
                },
            ],
        })
    }

    /// Point the pass at freshly allocated low-resolution targets.
    pub(crate) fn rebind(
        &mut self,
        device: &wgpu::Device,
        color: &wgpu::TextureView,
        normal_depth: &wgpu::TextureView,
    ) {
        self.bind_group = Self::bind(device, &self.layout, &self.params, color, normal_depth);
    }

    pub(crate) fn write_params(&self, queue: &wgpu::Queue, params: PixelateParams) {
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
    }

    pub(crate) fn draw(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pixelate_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
