use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use pixelscene_assets::{SamplerSettings, TextureFilter, TextureStore, WrapMode};
use pixelscene_common::TextureId;
use pixelscene_ecs::{hex_rgb, MeshKind};
use pixelscene_render::{PixelationConfig, RenderError, SceneGraph};
use std::collections::BTreeMap;
use wgpu::util::DeviceExt;

use crate::camera::OrthoCamera;
use crate::mesh::{Mesh, Vertex};
use crate::pixelate::{PixelateParams, PixelatePass};
use crate::shaders;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const NORMAL_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    ambient: [f32; 4],
    light_color: [f32; 4],
    light_dir: [f32; 4],
    depth_range: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct InstanceData {
    model: [[f32; 4]; 4],
    color: [f32; 4],
    emissive: [f32; 4],
    uv_repeat: [f32; 4],
}

impl InstanceData {
    const ATTRIBUTES: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x4,
    ];
}

/// Ambient plus one directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub ambient: [f32; 3],
    pub ambient_intensity: f32,
    pub directional: [f32; 3],
    pub directional_intensity: f32,
    /// Position of the directional light; it shines towards the origin.
    pub direction: Vec3,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            ambient: hex_rgb(0x2d3645),
            ambient_intensity: 0.5,
            directional: hex_rgb(0xfffc9c),
            directional_intensity: 0.5,
            direction: Vec3::splat(100.0),
        }
    }
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

/// Low-resolution render targets, reallocated whenever the grid changes.
struct LowResTargets {
    grid: (u32, u32),
    color: wgpu::TextureView,
    normal_depth: wgpu::TextureView,
    depth: wgpu::TextureView,
}

impl LowResTargets {
    fn new(device: &wgpu::Device, grid: (u32, u32)) -> Self {
        let make = |label, format, usage| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: grid.0.max(1),
                        height: grid.1.max(1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage,
                    view_formats: &[],
                })
                .create_view(&Default::default())
        };
        let sampled = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        Self {
            grid,
            color: make("lowres_color", COLOR_FORMAT, sampled),
            normal_depth: make("lowres_normal_depth", NORMAL_DEPTH_FORMAT, sampled),
            depth: make("lowres_depth", DEPTH_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT),
        }
    }
}

/// wgpu-based pixel scene renderer.
pub struct WgpuRenderer {
    scene_pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    textures: BTreeMap<TextureId, (wgpu::BindGroup, [f32; 2])>,
    untextured: wgpu::BindGroup,
    meshes: BTreeMap<MeshKind, GpuMesh>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    targets: LowResTargets,
    pixelate: PixelatePass,
    config: PixelationConfig,
    viewport: (u32, u32),
    surface_format: wgpu::TextureFormat,
    clear_color: [f32; 3],
    lights: LightRig,
}

impl WgpuRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: PixelationConfig,
        textures: &TextureStore,
    ) -> Result<Self, RenderError> {
        config.validate()?;
        let viewport = (width.max(1), height.max(1));

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals_buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals_bind_group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("albedo_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&globals_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SCENE_SHADER.into()),
        });
        let scene_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[
                    Vertex::layout(),
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<InstanceData>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &InstanceData::ATTRIBUTES,
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[
                    Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                    Some(wgpu::ColorTargetState {
                        format: NORMAL_DEPTH_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                ],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let meshes = [
            MeshKind::Cube,
            MeshKind::Plane,
            MeshKind::Icosahedron,
            MeshKind::Cone,
        ]
        .into_iter()
        .map(|kind| (kind, upload_mesh(device, kind)))
        .collect();

        let untextured = upload_texture(
            device,
            queue,
            &texture_layout,
            "white",
            (1, 1),
            &[0xff; 4],
            &SamplerSettings::default(),
        );
        let textures = textures
            .iter()
            .map(|(id, texture)| {
                let group = upload_texture(
                    device,
                    queue,
                    &texture_layout,
                    &texture.name,
                    (texture.width, texture.height),
                    &texture.pixels,
                    &texture.sampler,
                );
                (id, (group, texture.sampler.repeat))
            })
            .collect::<BTreeMap<_, _>>();
        tracing::info!(textures = textures.len(), "uploaded textures");

        let instance_capacity = 256;
        let instance_buffer = create_instance_buffer(device, instance_capacity);

        let targets = LowResTargets::new(device, config.grid_size(viewport.0, viewport.1));
        let pixelate = PixelatePass::new(
            device,
            surface_format,
            &targets.color,
            &targets.normal_depth,
            PixelateParams::new(&config, viewport),
        );

        Ok(Self {
            scene_pipeline,
            globals_buffer,
            globals_bind_group,
            texture_layout,
            textures,
            untextured,
            meshes,
            instance_buffer,
            instance_capacity,
            targets,
            pixelate,
            config,
            viewport,
            surface_format,
            clear_color: hex_rgb(0x151729),
            lights: LightRig::default(),
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    pub fn config(&self) -> &PixelationConfig {
        &self.config
    }

    /// Low-resolution grid the scene is drawn at.
    pub fn grid_size(&self) -> (u32, u32) {
        self.targets.grid
    }

    pub fn set_clear_color(&mut self, rgb: [f32; 3]) {
        self.clear_color = rgb;
    }

    pub fn set_lights(&mut self, lights: LightRig) {
        self.lights = lights;
    }

    /// Upload a texture registered after construction.
    pub fn add_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        store: &TextureStore,
        id: TextureId,
    ) {
        let Some(texture) = store.get(id) else {
            tracing::warn!(texture = id.0, "texture not in store");
            return;
        };
        let group = upload_texture(
            device,
            queue,
            &self.texture_layout,
            &texture.name,
            (texture.width, texture.height),
            &texture.pixels,
            &texture.sampler,
        );
        self.textures.insert(id, (group, texture.sampler.repeat));
    }

    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
        self.refresh_targets(device, queue);
    }

    /// Apply new pixelation parameters. The previous ones stay on error.
    pub fn reconfigure(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: PixelationConfig,
    ) -> Result<(), RenderError> {
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "gpu pixelation reconfigure rejected");
            return Err(e);
        }
        self.config = config;
        self.refresh_targets(device, queue);
        tracing::info!(pixel_size = config.pixel_size, "gpu pixelation reconfigured");
        Ok(())
    }

    fn refresh_targets(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let grid = self.config.grid_size(self.viewport.0, self.viewport.1);
        if grid != self.targets.grid {
            self.targets = LowResTargets::new(device, grid);
            self.pixelate
                .rebind(device, &self.targets.color, &self.targets.normal_depth);
            tracing::debug!(width = grid.0, height = grid.1, "low-res targets reallocated");
        }
        self.pixelate
            .write_params(queue, PixelateParams::new(&self.config, self.viewport));
    }

    /// Colour as the surface should receive it.
    fn surface_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        if self.surface_format.is_srgb() {
            rgb.map(srgb_to_linear)
        } else {
            rgb
        }
    }

    fn instance(&self, node: &pixelscene_render::SceneNode) -> InstanceData {
        let color = self.surface_rgb(node.spec.material.color);
        let emissive = self
            .surface_rgb(node.spec.material.emissive)
            .map(|c| c * node.emissive_intensity);
        let repeat = node
            .spec
            .material
            .texture
            .and_then(|id| self.textures.get(&id))
            .map_or([1.0, 1.0], |(_, repeat)| *repeat);
        InstanceData {
            model: node.transform.to_matrix().to_cols_array_2d(),
            color: [color[0], color[1], color[2], 1.0],
            emissive: [emissive[0], emissive[1], emissive[2], 0.0],
            uv_repeat: [repeat[0], repeat[1], 0.0, 0.0],
        }
    }

    /// Render one frame: scene into the low-res targets, then pixelate into
    /// `output`.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        output: &wgpu::TextureView,
        camera: &OrthoCamera,
        scene: &SceneGraph,
    ) {
        let (near, far) = camera.depth_range();
        let ambient = self
            .surface_rgb(self.lights.ambient)
            .map(|c| c * self.lights.ambient_intensity);
        let light = self
            .surface_rgb(self.lights.directional)
            .map(|c| c * self.lights.directional_intensity);
        let dir = self.lights.direction.normalize_or(Vec3::Y);
        let globals = Globals {
            view_proj: camera.view_projection().to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            ambient: [ambient[0], ambient[1], ambient[2], 1.0],
            light_color: [light[0], light[1], light[2], 1.0],
            light_dir: [dir.x, dir.y, dir.z, 0.0],
            depth_range: [near, far, 0.0, 0.0],
        };
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        // One instanced draw per (mesh, texture) pair.
        let mut batches: BTreeMap<(MeshKind, Option<TextureId>), Vec<InstanceData>> =
            BTreeMap::new();
        for (_, node) in scene.iter() {
            batches
                .entry((node.spec.mesh, node.spec.material.texture))
                .or_default()
                .push(self.instance(node));
        }
        let mut instances = Vec::with_capacity(scene.len());
        let mut draws = Vec::with_capacity(batches.len());
        for ((mesh, texture), batch) in batches {
            let start = instances.len() as u32;
            instances.extend(batch);
            draws.push((mesh, texture, start..instances.len() as u32));
        }

        if instances.len() > self.instance_capacity {
            self.instance_capacity = instances.len().next_power_of_two();
            self.instance_buffer = create_instance_buffer(device, self.instance_capacity);
            tracing::debug!(capacity = self.instance_capacity, "instance buffer grown");
        }
        if !instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        let clear = self.surface_rgb(self.clear_color);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.targets.color,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: clear[0] as f64,
                                g: clear[1] as f64,
                                b: clear[2] as f64,
                                a: 1.0,
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.targets.normal_depth,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            // Background: facing the camera at the far plane.
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: 0.0,
                                g: 0.0,
                                b: 1.0,
                                a: 1.0,
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&self.scene_pipeline);
            pass.set_bind_group(0, &self.globals_bind_group, &[]);
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for (kind, texture, range) in draws {
                let Some(mesh) = self.meshes.get(&kind) else {
                    continue;
                };
                let albedo = texture
                    .and_then(|id| self.textures.get(&id))
                    .map_or(&self.untextured, |(group, _)| group);
                pass.set_bind_group(1, albedo, &[]);
                pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..mesh.index_count, 0, range);
            }
        }
        self.pixelate.draw(&mut encoder, output);

        queue.submit(std::iter::once(encoder.finish()));
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("instance_buffer"),
        size: (capacity * std::mem::size_of::<InstanceData>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn upload_mesh(device: &wgpu::Device, kind: MeshKind) -> GpuMesh {
    let mesh = Mesh::for_kind(kind);
    let label = format!("{kind:?}");
    GpuMesh {
        vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }),
        indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        }),
        index_count: mesh.indices.len() as u32,
    }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    name: &str,
    (width, height): (u32, u32),
    pixels: &[u8],
    sampler: &SamplerSettings,
) -> wgpu::BindGroup {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    // Mip chains would blur the texels; only the base level is uploaded.
    if sampler.generate_mipmaps {
        tracing::debug!(texture = name, "mipmap generation requested, uploading base level only");
    }
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(name),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let filter = match sampler.filter {
        TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        TextureFilter::Linear => wgpu::FilterMode::Linear,
    };
    let address = match sampler.wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    };
    let gpu_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(name),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    let view = texture.create_view(&Default::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(name),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&gpu_sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layouts_are_vec4_aligned() {
        assert_eq!(std::mem::size_of::<Globals>() % 16, 0);
        assert_eq!(std::mem::size_of::<InstanceData>(), 7 * 16);
    }

    #[test]
    fn srgb_conversion_endpoints() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        assert!(srgb_to_linear(0.5) < 0.5);
    }

    #[test]
    fn default_lights_match_scene() {
        let lights = LightRig::default();
        assert_eq!(lights.ambient_intensity, 0.5);
        assert_eq!(lights.directional, hex_rgb(0xfffc9c));
    }
}
