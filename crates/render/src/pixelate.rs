//! CPU reference of the pixelation pass.
//!
//! The scene is reduced to a grid of `ceil(w / pixel_size)` by
//! `ceil(h / pixel_size)` cells, each cell taking the centre sample of its
//! block. Cells on a depth or normal discontinuity are darkened, then every
//! cell is expanded back to a flat `pixel_size` block at full resolution.
//! The GPU pass in `pixelscene-render-wgpu` evaluates the same math.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Tunables of the pixelation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelationConfig {
    /// Edge length of one output block in screen pixels.
    pub pixel_size: u32,
    pub normal_edge_strength: f32,
    pub depth_edge_strength: f32,
}

impl Default for PixelationConfig {
    fn default() -> Self {
        Self {
            pixel_size: 6,
            normal_edge_strength: 0.1,
            depth_edge_strength: 0.1,
        }
    }
}

impl PixelationConfig {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.pixel_size == 0 {
            return Err(RenderError::InvalidPipelineConfiguration(
                "pixel_size must be a positive integer".into(),
            ));
        }
        for (name, value) in [
            ("normal_edge_strength", self.normal_edge_strength),
            ("depth_edge_strength", self.depth_edge_strength),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RenderError::InvalidPipelineConfiguration(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Low-resolution grid for a viewport.
    pub fn grid_size(&self, width: u32, height: u32) -> (u32, u32) {
        let ps = self.pixel_size.max(1);
        (width.max(1).div_ceil(ps), height.max(1).div_ceil(ps))
    }
}

/// Full-resolution scene render: colour, view-space normal and linear depth.
#[derive(Debug, Clone)]
pub struct GBuffer {
    width: u32,
    height: u32,
    pub color: Vec<Vec4>,
    pub normal: Vec<Vec3>,
    /// Linear depth normalized to `[0, 1]` between the near and far planes.
    pub depth: Vec<f32>,
}

impl GBuffer {
    /// A cleared buffer: `clear` colour, normals facing the camera, far depth.
    pub fn new(width: u32, height: u32, clear: Vec4) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![clear; len],
            normal: vec![Vec3::Z; len],
            depth: vec![1.0; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Write one sample. Out-of-range coordinates are ignored.
    pub fn set(&mut self, x: u32, y: u32, color: Vec4, normal: Vec3, depth: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.index(x, y);
        self.color[i] = color;
        self.normal[i] = normal;
        self.depth[i] = depth;
    }

    /// Fill an axis-aligned rectangle, clipped to the buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_rect(
        &mut self,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        color: Vec4,
        normal: Vec3,
        depth: f32,
    ) {
        for yy in y..y.saturating_add(h).min(self.height) {
            for xx in x..x.saturating_add(w).min(self.width) {
                self.set(xx, yy, color, normal, depth);
            }
        }
    }
}

/// Final full-resolution image.
#[derive(Debug, Clone, Default)]
pub struct ColorBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Vec4>,
}

impl ColorBuffer {
    pub fn pixel(&self, x: u32, y: u32) -> Option<Vec4> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    color: Vec4,
    normal: Vec3,
    depth: f32,
}

const EMPTY_CELL: Cell = Cell {
    color: Vec4::ZERO,
    normal: Vec3::Z,
    depth: 1.0,
};

/// Post-process stage turning a full-resolution render into a pixel-art frame.
///
/// Scratch and output buffers are owned by the pipeline and only
/// re-parameterized on resize.
#[derive(Debug, Clone)]
pub struct PixelationPipeline {
    config: PixelationConfig,
    width: u32,
    height: u32,
    grid: (u32, u32),
    cells: Vec<Cell>,
    shaded: Vec<Vec4>,
    output: ColorBuffer,
}

impl PixelationPipeline {
    pub fn new(config: PixelationConfig, width: u32, height: u32) -> Result<Self, RenderError> {
        config.validate()?;
        let mut pipeline = Self {
            config,
            width: 0,
            height: 0,
            grid: (0, 0),
            cells: Vec::new(),
            shaded: Vec::new(),
            output: ColorBuffer::default(),
        };
        pipeline.resize(width, height);
        Ok(pipeline)
    }

    pub fn config(&self) -> &PixelationConfig {
        &self.config
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn grid_size(&self) -> (u32, u32) {
        self.grid
    }

    /// Swap in new parameters. On error the previous configuration stays.
    pub fn reconfigure(&mut self, config: PixelationConfig) -> Result<(), RenderError> {
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "pixelation reconfigure rejected");
            return Err(e);
        }
        self.config = config;
        self.regrid();
        tracing::debug!(pixel_size = config.pixel_size, "pixelation reconfigured");
        Ok(())
    }

    /// Follow a viewport resize. Zero extents are clamped to one pixel.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.output.width = self.width;
        self.output.height = self.height;
        self.output
            .pixels
            .resize(self.width as usize * self.height as usize, Vec4::ZERO);
        self.regrid();
    }

    fn regrid(&mut self) {
        self.grid = self.config.grid_size(self.width, self.height);
        let cells = self.grid.0 as usize * self.grid.1 as usize;
        self.cells.resize(cells, EMPTY_CELL);
        self.shaded.resize(cells, Vec4::ZERO);
    }

    /// Run the pass over one frame.
    pub fn process(&mut self, input: &GBuffer) -> Result<&ColorBuffer, RenderError> {
        if (input.width, input.height) != (self.width, self.height) {
            return Err(RenderError::ResolutionMismatch {
                expected: (self.width, self.height),
                actual: (input.width, input.height),
            });
        }
        self.downsample(input);
        self.shade_cells();
        self.upsample();
        Ok(&self.output)
    }

    fn downsample(&mut self, input: &GBuffer) {
        let ps = self.config.pixel_size;
        let (gw, gh) = self.grid;
        for gy in 0..gh {
            for gx in 0..gw {
                let sx = (gx * ps + ps / 2).min(self.width - 1);
                let sy = (gy * ps + ps / 2).min(self.height - 1);
                let i = input.index(sx, sy);
                self.cells[(gy * gw + gx) as usize] = Cell {
                    color: input.color[i],
                    normal: input.normal[i],
                    depth: input.depth[i],
                };
            }
        }
    }

    fn cell(&self, gx: i64, gy: i64) -> Cell {
        let (gw, gh) = (self.grid.0 as i64, self.grid.1 as i64);
        let x = gx.clamp(0, gw - 1);
        let y = gy.clamp(0, gh - 1);
        self.cells[(y * gw + x) as usize]
    }

    fn shade_cells(&mut self) {
        let (gw, gh) = self.grid;
        for gy in 0..gh as i64 {
            for gx in 0..gw as i64 {
                let center = self.cell(gx, gy);
                let neighbours = [
                    self.cell(gx, gy - 1),
                    self.cell(gx, gy + 1),
                    self.cell(gx - 1, gy),
                    self.cell(gx + 1, gy),
                ];
                let strength = edge_strength(&self.config, center, &neighbours);
                let rgb = center.color.truncate() * strength;
                self.shaded[(gy * gw as i64 + gx) as usize] = rgb.extend(center.color.w);
            }
        }
    }

    fn upsample(&mut self) {
        let ps = self.config.pixel_size;
        let gw = self.grid.0;
        for y in 0..self.height {
            let row = (y / ps) * gw;
            for x in 0..self.width {
                self.output.pixels[(y * self.width + x) as usize] =
                    self.shaded[(row + x / ps) as usize];
            }
        }
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn depth_edge_indicator(center: Cell, neighbours: &[Cell; 4]) -> f32 {
    let diff: f32 = neighbours
        .iter()
        .map(|n| (n.depth - center.depth).clamp(0.0, 1.0))
        .sum();
    (smoothstep(0.01, 0.02, diff) * 2.0).floor() / 2.0
}

fn neighbour_normal_edge(center: Cell, n: Cell) -> f32 {
    let depth_diff = n.depth - center.depth;
    let normal_diff = (center.normal - n.normal).dot(Vec3::ONE);
    let normal_indicator = smoothstep(-0.01, 0.01, normal_diff).clamp(0.0, 1.0);
    let depth_indicator = (depth_diff * 0.25 + 0.0025).signum().clamp(0.0, 1.0);
    (1.0 - center.normal.dot(n.normal)) * depth_indicator * normal_indicator
}

fn normal_edge_indicator(center: Cell, neighbours: &[Cell; 4]) -> f32 {
    let sum: f32 = neighbours.iter().map(|n| neighbour_normal_edge(center, *n)).sum();
    if sum >= 0.1 { 1.0 } else { 0.0 }
}

/// Colour multiplier for a cell. Both edge kinds darken.
fn edge_strength(config: &PixelationConfig, center: Cell, neighbours: &[Cell; 4]) -> f32 {
    let dei = if config.depth_edge_strength > 0.0 {
        depth_edge_indicator(center, neighbours)
    } else {
        0.0
    };
    let nei = if config.normal_edge_strength > 0.0 {
        normal_edge_indicator(center, neighbours)
    } else {
        0.0
    };
    let strength = if dei > 0.0 {
        1.0 - config.depth_edge_strength * dei
    } else {
        1.0 - config.normal_edge_strength * nei
    };
    strength.max(0.0)
}
