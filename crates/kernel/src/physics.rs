//! In-process stand-in for a rigid-body engine.
//!
//! Bodies fall under gravity and rest on a ground plane. The kernel only
//! ever reads snapshots through [`BodyProvider`].

use glam::{Quat, Vec3};
use pixelscene_ecs::{BodyHandle, BodyProvider, BodySnapshot};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
struct Body {
    snapshot: BodySnapshot,
    /// Distance from the body centre to its lowest point.
    half_height: f32,
}

#[derive(Debug, Clone)]
pub struct KinematicBodies {
    bodies: BTreeMap<BodyHandle, Body>,
    next_handle: u64,
    gravity: Vec3,
    ground_y: f32,
}

impl Default for KinematicBodies {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.81, 0.0))
    }
}

impl KinematicBodies {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            bodies: BTreeMap::new(),
            next_handle: 0,
            gravity,
            ground_y: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Add a body resting or falling from `position`.
    pub fn insert(&mut self, position: Vec3, rotation: Quat, half_height: f32) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        self.bodies.insert(
            handle,
            Body {
                snapshot: BodySnapshot {
                    position,
                    rotation,
                    linear_velocity: Vec3::ZERO,
                },
                half_height: half_height.max(0.0),
            },
        );
        handle
    }

    pub fn remove(&mut self, handle: BodyHandle) -> bool {
        self.bodies.remove(&handle).is_some()
    }

    /// Integrate every body by `dt` seconds (semi-implicit Euler).
    pub fn step(&mut self, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        for body in self.bodies.values_mut() {
            let s = &mut body.snapshot;
            s.linear_velocity += self.gravity * dt;
            s.position += s.linear_velocity * dt;
            let floor = self.ground_y + body.half_height;
            if s.position.y < floor {
                s.position.y = floor;
                s.linear_velocity.y = 0.0;
            }
        }
    }
}

impl BodyProvider for KinematicBodies {
    fn snapshot(&self, handle: BodyHandle) -> Option<BodySnapshot> {
        self.bodies.get(&handle).map(|b| b.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_fall_and_rest_on_ground() {
        let mut bodies = KinematicBodies::default();
        let h = bodies.insert(Vec3::new(1.0, 2.0, 0.0), Quat::IDENTITY, 0.5);
        bodies.step(0.1);
        let falling = bodies.snapshot(h).unwrap();
        assert!(falling.position.y < 2.0);
        assert!(falling.linear_velocity.y < 0.0);

        for _ in 0..100 {
            bodies.step(0.1);
        }
        let resting = bodies.snapshot(h).unwrap();
        assert_eq!(resting.position.y, 0.5);
        assert_eq!(resting.position.x, 1.0);
    }

    #[test]
    fn removed_handles_stop_resolving() {
        let mut bodies = KinematicBodies::default();
        let h = bodies.insert(Vec3::ZERO, Quat::IDENTITY, 0.0);
        assert!(bodies.remove(h));
        assert!(bodies.snapshot(h).is_none());
        assert!(!bodies.remove(h));

        // Handles are not recycled.
        let next = bodies.insert(Vec3::ZERO, Quat::IDENTITY, 0.0);
        assert_ne!(h, next);
    }

    #[test]
    fn bad_delta_is_ignored() {
        let mut bodies = KinematicBodies::default();
        let h = bodies.insert(Vec3::Y, Quat::IDENTITY, 0.0);
        bodies.step(f32::NAN);
        bodies.step(-1.0);
        assert_eq!(bodies.snapshot(h).unwrap().position, Vec3::Y);
    }
}
