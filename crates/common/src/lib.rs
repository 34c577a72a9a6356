//! Shared identifiers and math types used by every pixelscene crate.

mod types;

pub use types::{EntityId, NodeHandle, TextureId, Transform};
