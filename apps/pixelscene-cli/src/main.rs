use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use glam::{Vec3, Vec4};
use pixelscene_anim::{stop_go_eased, FrameAnimator};
use pixelscene_assets::{TextureManifest, TextureStore};
use pixelscene_kernel::{KinematicBodies, Scene, SceneConfig};
use pixelscene_render::{
    ColorBuffer, DebugTextRenderer, GBuffer, PixelationConfig, PixelationPipeline, Renderer,
    SceneGraph,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixelscene-cli", about = "Headless tools for the pixel scene")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Tick the stock scene headlessly and dump the final scene graph
    Run {
        /// Number of frames to run
        #[arg(short, long, default_value = "120")]
        frames: u64,
        /// Frame delta in seconds
        #[arg(long, default_value = "0.0166667")]
        dt: f64,
        /// Scene config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print animator samples over a time range
    Animate {
        #[arg(long, default_value = "0")]
        from: f64,
        #[arg(long, default_value = "8")]
        to: f64,
        #[arg(long, default_value = "0.5")]
        step: f64,
    },
    /// Pixelate a synthetic two-plane frame and print it as ASCII
    Pixelate {
        #[arg(long, default_value = "64")]
        width: u32,
        #[arg(long, default_value = "24")]
        height: u32,
        #[arg(long, default_value = "4")]
        pixel_size: u32,
        #[arg(long, default_value = "0.1")]
        normal_edge_strength: f32,
        #[arg(long, default_value = "0.5")]
        depth_edge_strength: f32,
    },
    /// Check a scene config file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("pixelscene-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("ecs: {}", pixelscene_ecs::crate_info());
            println!("assets: {}", pixelscene_assets::crate_info());
            println!("render: {}", pixelscene_render::crate_info());
            println!("kernel: {}", pixelscene_kernel::crate_info());
        }
        Commands::Run { frames, dt, config } => run(frames, dt, config)?,
        Commands::Animate { from, to, step } => {
            if !(step.is_finite() && step > 0.0) {
                bail!("step must be positive, got {step}");
            }
            let animator = FrameAnimator::default();
            let timing = animator.timing();
            println!(
                "{:>8} {:>8} {:>10} {:>9} {:>9}",
                "t", "turns", "rot(deg)", "offset_y", "intensity"
            );
            let mut t = from;
            while t <= to {
                let sample = animator.animate(t);
                println!(
                    "{t:>8.3} {:>8.4} {:>10.2} {:>9.4} {:>9.4}",
                    stop_go_eased(t, timing.downtime, timing.period),
                    sample.rotation_y.to_degrees(),
                    sample.offset_y,
                    sample.intensity
                );
                t += step;
            }
        }
        Commands::Pixelate {
            width,
            height,
            pixel_size,
            normal_edge_strength,
            depth_edge_strength,
        } => {
            let config = PixelationConfig {
                pixel_size,
                normal_edge_strength,
                depth_edge_strength,
            };
            let ((gw, gh), art) = pixelate(config, width, height)?;
            println!("{width}x{height} at pixel size {pixel_size} -> {gw}x{gh} grid");
            print!("{art}");
        }
        Commands::Validate { config } => {
            let loaded = SceneConfig::load(&config)
                .with_context(|| format!("validating {}", config.display()))?;
            println!("{}: OK", config.display());
            print!("{}", loaded.to_yaml()?);
        }
    }

    Ok(())
}

fn run(frames: u64, dt: f64, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => SceneConfig::load(&path)?,
        None => SceneConfig::default(),
    };
    let textures = TextureStore::from_manifest(&TextureManifest::pixel_scene(
        config.box_texture_repeat,
        config.floor_texture_repeat,
    ))?;
    let mut bodies = KinematicBodies::new(config.gravity);
    let mut scene = Scene::new(&config)?;
    scene.populate(&config, &textures, &mut bodies)?;
    let mut graph = SceneGraph::new();

    let (mut created, mut disposed) = (0, 0);
    for _ in 0..frames {
        bodies.step(dt as f32);
        let report = scene.tick(dt, &bodies, &mut graph)?;
        created += report.created;
        disposed += report.disposed;
        if report.tick % 60 == 0 {
            tracing::info!(
                tick = report.tick,
                elapsed = report.elapsed,
                nodes = report.live_nodes,
                "frame"
            );
        }
    }

    print!("{}", DebugTextRenderer::new().render(&graph, &config.camera));
    println!(
        "frames={frames} elapsed={:.3}s created={created} disposed={disposed} entities={}",
        scene.clock().elapsed(),
        scene.store().len()
    );
    Ok(())
}

/// Pixelate the synthetic frame; returns the grid size and the ASCII art.
fn pixelate(
    config: PixelationConfig,
    width: u32,
    height: u32,
) -> anyhow::Result<((u32, u32), String)> {
    if width == 0 || height == 0 {
        bail!("frame size must be non-zero, got {width}x{height}");
    }
    let mut pipeline = PixelationPipeline::new(config, width, height)?;
    let out = pipeline.process(&two_plane_frame(width, height))?;
    let art = ascii(out);
    Ok((pipeline.grid_size(), art))
}

/// Near plane facing the camera on the left, a farther plane tilted up on
/// the right, shaded with a horizontal gradient.
fn two_plane_frame(width: u32, height: u32) -> GBuffer {
    let mut frame = GBuffer::new(width, height, Vec4::new(0.08, 0.09, 0.16, 1.0));
    let split = width / 2;
    let tilted = Vec3::new(0.0, 0.6, 0.8);
    for y in height / 4..height {
        for x in 0..width {
            let shade = 0.4 + 0.6 * x as f32 / width.max(1) as f32;
            let (normal, depth) = if x < split { (Vec3::Z, 0.3) } else { (tilted, 0.7) };
            frame.set(x, y, Vec4::new(shade, shade, shade, 1.0), normal, depth);
        }
    }
    frame
}

fn ascii(buffer: &ColorBuffer) -> String {
    const RAMP: &[u8] = b" .:-=+*#%@";
    let mut out = String::with_capacity((buffer.width as usize + 1) * buffer.height as usize);
    for row in buffer.pixels.chunks(buffer.width.max(1) as usize) {
        for p in row {
            let luma = (0.2126 * p.x + 0.7152 * p.y + 0.0722 * p.z).clamp(0.0, 1.0);
            let i = (luma * (RAMP.len() - 1) as f32).round() as usize;
            out.push(RAMP[i] as char);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_has_one_line_per_row() {
        let mut pipeline = PixelationPipeline::new(PixelationConfig::default(), 12, 5).unwrap();
        let out = pipeline.process(&two_plane_frame(12, 5)).unwrap();
        let text = ascii(out);
        assert_eq!(text.lines().count(), 5);
        assert!(text.lines().all(|l| l.len() == 12));
    }

    #[test]
    fn pixelate_rejects_empty_frames() {
        for (w, h) in [(0, 24), (64, 0), (0, 0)] {
            let err = pixelate(PixelationConfig::default(), w, h).unwrap_err();
            assert!(err.to_string().contains("non-zero"), "{err}");
        }
        let (grid, art) = pixelate(PixelationConfig::default(), 13, 7).unwrap();
        assert_eq!(grid, (3, 2));
        assert_eq!(art.lines().count(), 7);
    }

    #[test]
    fn cli_parses_run() {
        let cli = Cli::try_parse_from(["pixelscene-cli", "run", "--frames", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { frames: 3, .. }));
    }
}
