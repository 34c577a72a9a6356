//! Frame kernel: owns the entity store and drives one frame at a time.
//!
//! # Invariants
//! - Per frame: clock, body read, animation, projection sync, node
//!   write-back, node refresh. Nothing else reorders these steps.
//! - Store mutations only happen on the kernel thread, between syncs.
//! - Elapsed time never decreases.

pub mod clock;
pub mod config;
pub mod physics;
pub mod scene;

pub use clock::FrameClock;
pub use config::{ConfigError, SceneConfig};
pub use physics::KinematicBodies;
pub use scene::{FrameReport, Scene, SceneError};

pub fn crate_info() -> &'static str {
    "pixelscene-kernel v0.1.0"
}
