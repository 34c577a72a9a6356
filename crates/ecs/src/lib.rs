//! Entity store with a closed component set and live archetype queries.
//!
//! Each entity carries a fixed-size sparse map keyed by [`ComponentKind`]
//! plus a presence mask. Queries are registered on the store and kept up to
//! date on every mutation, re-testing only the affected entity.
//!
//! # Invariants
//! - A component kind appears at most once per entity.
//! - Stored component values always passed validation.
//! - `matches(query)` equals a full rescan of the store after every mutation.
//! - Destroying an entity twice is a no-op.

mod body;
mod component;
mod error;
mod query;
mod store;

pub use body::{BodyHandle, BodyProvider, BodySnapshot};
pub use component::{
    hex_rgb, Component, ComponentKind, ComponentMask, MaterialSpec, MeshKind, RenderSpec,
};
pub use error::EcsError;
pub use query::{ArchetypeQuery, Predicate, QueryId};
pub use store::{EntityStore, StoreEvent};

pub fn crate_info() -> &'static str {
    "pixelscene-ecs v0.1.0"
}
