use anyhow::{Context, Result};
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec3;
use pixelscene_assets::{TextureManifest, TextureStore};
use pixelscene_kernel::{FrameReport, KinematicBodies, Scene, SceneConfig};
use pixelscene_render::{PixelationConfig, SceneGraph};
use pixelscene_render_wgpu::{OrthoCamera, WgpuRenderer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "pixelscene-desktop", about = "Pixelated 3D scene viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Scene config (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Everything that lives independently of the GPU.
struct AppState {
    config: SceneConfig,
    textures: TextureStore,
    scene: Scene,
    bodies: KinematicBodies,
    graph: SceneGraph,
    camera: OrthoCamera,
    /// Pixelation settings edited in the overlay; applied on change.
    pending_pixelation: PixelationConfig,
    last_report: Option<FrameReport>,
    show_overlay: bool,
    last_frame: Instant,
}

impl AppState {
    fn new(config: SceneConfig) -> Result<Self> {
        let textures = TextureStore::from_manifest(&TextureManifest::pixel_scene(
            config.box_texture_repeat,
            config.floor_texture_repeat,
        ))?;
        let mut bodies = KinematicBodies::new(config.gravity);
        let mut scene = Scene::new(&config)?;
        scene.populate(&config, &textures, &mut bodies)?;
        Ok(Self {
            camera: OrthoCamera::new(config.camera, 1280, 720),
            pending_pixelation: config.pixelation,
            config,
            textures,
            scene,
            bodies,
            graph: SceneGraph::new(),
            last_report: None,
            show_overlay: true,
            last_frame: Instant::now(),
        })
    }

    fn update(&mut self, dt: f32) {
        self.bodies.step(dt);
        match self.scene.tick(dt as f64, &self.bodies, &mut self.graph) {
            Ok(report) => self.last_report = Some(report),
            Err(e) => tracing::error!("frame tick failed: {e}"),
        }
    }

    fn spawn_box(&mut self) {
        // Drop new boxes from above the floor at a spot derived from the count.
        let n = self.scene.box_count() as f32;
        let position = Vec3::new((n * 0.37).sin() * 0.8, 1.5, (n * 0.61).cos() * 0.8);
        match self.scene.spawn_box(position, &mut self.bodies) {
            Ok(entity) => tracing::info!("spawned box {entity}"),
            Err(e) => tracing::error!("failed to spawn box: {e}"),
        }
    }

    fn despawn_box(&mut self) {
        if let Some(entity) = self.scene.despawn_last_box(&mut self.bodies) {
            tracing::info!("despawned box {entity}");
        }
    }

    fn toggle_crystal(&mut self) {
        let paused = !self.scene.crystal_paused();
        if let Err(e) = self.scene.set_crystal_paused(paused) {
            tracing::error!("failed to toggle crystal: {e}");
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::KeyB => self.spawn_box(),
            KeyCode::Delete | KeyCode::Backspace => self.despawn_box(),
            KeyCode::KeyP => self.toggle_crystal(),
            KeyCode::F1 => self.show_overlay = !self.show_overlay,
            _ => {}
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        if !self.show_overlay {
            return;
        }

        egui::SidePanel::left("overlay")
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Pixel Scene");
                ui.separator();
                if let Some(report) = &self.last_report {
                    ui.label(format!("Tick: {}  Elapsed: {:.2}s", report.tick, report.elapsed));
                    ui.label(format!(
                        "Entities: {}  Nodes: {}",
                        self.scene.store().len(),
                        report.live_nodes
                    ));
                    ui.label(format!("Boxes: {}", self.scene.box_count()));
                    let store = self.scene.store();
                    if let Some(health) = self.scene.player().and_then(|p| store.health(p)) {
                        ui.label(format!("Player health: {health:.0}"));
                    }
                    ui.label(format!(
                        "Crystal: rot {:.0}°  glow {:.2}",
                        report.sample.rotation_y.to_degrees() % 360.0,
                        report.sample.intensity
                    ));
                }
                ui.separator();

                ui.heading("Pixelation");
                ui.add(
                    egui::Slider::new(&mut self.pending_pixelation.pixel_size, 1..=16)
                        .text("pixel size"),
                );
                ui.add(
                    egui::Slider::new(&mut self.pending_pixelation.normal_edge_strength, 0.0..=2.0)
                        .text("normal edges"),
                );
                ui.add(
                    egui::Slider::new(&mut self.pending_pixelation.depth_edge_strength, 0.0..=1.0)
                        .text("depth edges"),
                );
                ui.separator();

                ui.heading("Scene");
                ui.horizontal(|ui| {
                    if ui.button("Spawn box (B)").clicked() {
                        self.spawn_box();
                    }
                    if ui.button("Despawn box (Del)").clicked() {
                        self.despawn_box();
                    }
                });
                let label = if self.scene.crystal_paused() {
                    "Resume crystal (P)"
                } else {
                    "Pause crystal (P)"
                };
                if ui.button(label).clicked() {
                    self.toggle_crystal();
                }

                ui.separator();
                ui.small("F1: Toggle overlay");
            });
    }
}

/// GPU resources, created once the window exists.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn new(
        event_loop: &ActiveEventLoop,
        state: &mut AppState,
        egui_ctx: &EguiContext,
    ) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("Pixel Scene")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("find adapter")?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("pixelscene_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        state.camera.resize(surface_config.width, surface_config.height);
        let mut renderer = WgpuRenderer::new(
            &device,
            &queue,
            surface_format,
            surface_config.width,
            surface_config.height,
            state.config.pixelation,
            &state.textures,
        )?;
        renderer.set_clear_color(state.config.clear_rgb()?);

        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );
        Ok(Self {
            window,
            surface,
            device,
            queue,
            surface_config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn resize(&mut self, width: u32, height: u32, camera: &mut OrthoCamera) {
        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
        camera.resize(self.surface_config.width, self.surface_config.height);
        self.renderer.resize(
            &self.device,
            &self.queue,
            self.surface_config.width,
            self.surface_config.height,
        );
    }

    /// Push overlay edits through validated reconfiguration.
    fn apply_pixelation(&mut self, state: &mut AppState) {
        if state.pending_pixelation == *self.renderer.config() {
            return;
        }
        if self
            .renderer
            .reconfigure(&self.device, &self.queue, state.pending_pixelation)
            .is_err()
        {
            state.pending_pixelation = *self.renderer.config();
        }
    }

    fn draw_overlay(
        &mut self,
        view: &wgpu::TextureView,
        egui_ctx: &EguiContext,
        state: &mut AppState,
    ) {
        let raw_input = self.egui_winit.take_egui_input(&self.window);
        let full_output = egui_ctx.run(raw_input, |ctx| state.draw_ui(ctx));
        self.egui_winit
            .handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.surface_config.width, self.surface_config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            self.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }

    fn redraw(&mut self, egui_ctx: &EguiContext, state: &mut AppState) {
        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer
            .render(&self.device, &self.queue, &view, &state.camera, &state.graph);
        self.draw_overlay(&view, egui_ctx, state);
        self.apply_pixelation(state);

        output.present();
        self.window.request_redraw();
    }
}

struct GpuApp {
    state: AppState,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match Gpu::new(event_loop, &mut self.state, &self.egui_ctx) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => {
                tracing::error!("failed to initialize GPU: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        if gpu.egui_winit.on_window_event(&gpu.window, &event).consumed {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                if let Err(e) = self.state.scene.shutdown(&mut self.state.graph) {
                    tracing::warn!("scene shutdown failed: {e}");
                }
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                gpu.resize(new_size.width, new_size.height, &mut self.state.camera);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                self.state.handle_key(key);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
                self.state.last_frame = now;
                self.state.update(dt);
                gpu.redraw(&self.egui_ctx, &mut self.state);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("pixelscene-desktop starting");

    let config = match &cli.config {
        Some(path) => SceneConfig::load(path)?,
        None => SceneConfig::default(),
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp {
        state: AppState::new(config)?,
        gpu: None,
        egui_ctx: EguiContext::default(),
    };
    event_loop.run_app(&mut app)?;

    Ok(())
}
