//! wgpu render backend for the pixel scene.
//!
//! The scene graph is drawn at `ceil(viewport / pixel_size)` into a colour
//! target and a normal + linear depth target. A full-screen pass then blows
//! every low-resolution texel up into a flat block and darkens texels on
//! depth and normal edges.
//!
//! # Invariants
//! - Renderer never mutates the entity store.
//! - Resize and pixelation changes never rebuild pipelines or samplers.
//! - Output resolution always equals the surface resolution.

mod camera;
mod gpu;
mod mesh;
mod pixelate;
mod shaders;

pub use camera::OrthoCamera;
pub use gpu::{LightRig, WgpuRenderer};
pub use mesh::{Mesh, Vertex};
