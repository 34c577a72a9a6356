//! Rendering adapter: renderer-agnostic interface.
//!
//! # Invariants
//! - Renderer cannot mutate the entity store.
//! - Live scene nodes are in one-to-one correspondence with the projected
//!   query after every sync.
//! - Pixelation output resolution equals input resolution.

mod error;
mod pixelate;
mod projection;
mod renderer;
mod scene;

pub use error::RenderError;
pub use pixelate::{ColorBuffer, GBuffer, PixelationConfig, PixelationPipeline};
pub use projection::{
    NodeBackend, ProjectionCommand, ProjectionPlan, ReactiveProjection, SyncReport,
};
pub use renderer::{DebugTextRenderer, RenderView, Renderer};
pub use scene::{SceneGraph, SceneNode};

pub fn crate_info() -> &'static str {
    "pixelscene-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
