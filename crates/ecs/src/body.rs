use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque lookup handle into an external body provider.
///
/// The entity never owns the body. A handle whose body is gone simply stops
/// resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub u64);

/// State of a simulated body as of the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySnapshot {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
}

impl BodySnapshot {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
        }
    }
}

/// Read-only access to the physics collaborator.
pub trait BodyProvider {
    /// Current state of the body, or `None` if the handle no longer resolves.
    fn snapshot(&self, handle: BodyHandle) -> Option<BodySnapshot>;
}

impl BodyProvider for BTreeMap<BodyHandle, BodySnapshot> {
    fn snapshot(&self, handle: BodyHandle) -> Option<BodySnapshot> {
        self.get(&handle).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_provider_resolves_known_handles() {
        let mut bodies = BTreeMap::new();
        bodies.insert(BodyHandle(1), BodySnapshot::at(Vec3::Y));
        assert_eq!(bodies.snapshot(BodyHandle(1)).unwrap().position, Vec3::Y);
        assert!(bodies.snapshot(BodyHandle(2)).is_none());
    }
}
