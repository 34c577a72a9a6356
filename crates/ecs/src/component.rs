use glam::{Quat, Vec3};
use pixelscene_common::{NodeHandle, TextureId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::body::BodyHandle;
use crate::error::EcsError;

/// Every component an entity can carry. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    IsBox,
    Position,
    Rotation,
    Velocity,
    Health,
    Render,
    Node,
    RigidBody,
    Emissive,
    Animated,
    Paused,
}

impl ComponentKind {
    pub const COUNT: usize = 11;

    pub const ALL: [ComponentKind; Self::COUNT] = [
        Self::IsBox,
        Self::Position,
        Self::Rotation,
        Self::Velocity,
        Self::Health,
        Self::Render,
        Self::Node,
        Self::RigidBody,
        Self::Emissive,
        Self::Animated,
        Self::Paused,
    ];

    /// Slot of this kind in an entity's sparse component array.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn mask(self) -> ComponentMask {
        ComponentMask::from_bits_retain(1 << self as u16)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::IsBox => "isBox",
            Self::Position => "position",
            Self::Rotation => "rotation",
            Self::Velocity => "velocity",
            Self::Health => "health",
            Self::Render => "render",
            Self::Node => "three",
            Self::RigidBody => "rigidBody",
            Self::Emissive => "emissive",
            Self::Animated => "animated",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags::bitflags! {
    /// Set of component kinds present on an entity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ComponentMask: u16 {
        const IS_BOX = 1 << 0;
        const POSITION = 1 << 1;
        const ROTATION = 1 << 2;
        const VELOCITY = 1 << 3;
        const HEALTH = 1 << 4;
        const RENDER = 1 << 5;
        const NODE = 1 << 6;
        const RIGID_BODY = 1 << 7;
        const EMISSIVE = 1 << 8;
        const ANIMATED = 1 << 9;
        const PAUSED = 1 << 10;
    }
}

impl ComponentMask {
    pub fn has(self, kind: ComponentKind) -> bool {
        self.contains(kind.mask())
    }

    pub fn kinds(self) -> impl Iterator<Item = ComponentKind> {
        ComponentKind::ALL.into_iter().filter(move |k| self.has(*k))
    }
}

/// Geometry a render node is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeshKind {
    /// Unit cube centred on the origin.
    Cube,
    /// Unit square in the XZ plane, facing +Y.
    Plane,
    /// Unit-radius icosahedron.
    Icosahedron,
    /// Cone with unit base radius and unit height, centred on the origin,
    /// apex towards +Y.
    Cone,
}

/// Converts a `0xRRGGBB` colour into linear-ish `[r, g, b]` floats.
pub fn hex_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub color: [f32; 3],
    pub emissive: [f32; 3],
    pub texture: Option<TextureId>,
}

impl MaterialSpec {
    pub fn solid(hex: u32) -> Self {
        Self {
            color: hex_rgb(hex),
            emissive: [0.0; 3],
            texture: None,
        }
    }

    pub fn textured(texture: TextureId) -> Self {
        Self {
            color: [1.0; 3],
            emissive: [0.0; 3],
            texture: Some(texture),
        }
    }

    pub fn with_emissive(mut self, hex: u32) -> Self {
        self.emissive = hex_rgb(hex);
        self
    }
}

/// Description of the node the projection should realize for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSpec {
    pub mesh: MeshKind,
    pub scale: Vec3,
    pub material: MaterialSpec,
}

impl RenderSpec {
    pub fn new(mesh: MeshKind, material: MaterialSpec) -> Self {
        Self {
            mesh,
            scale: Vec3::ONE,
            material,
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    fn check(&self) -> Result<(), &'static str> {
        if !self.scale.is_finite() || self.scale.min_element() <= 0.0 {
            return Err("scale must be finite and strictly positive");
        }
        let mut colors = self.material.color.iter().chain(&self.material.emissive);
        if colors.any(|c| !c.is_finite() || *c < 0.0) {
            return Err("material colours must be finite and non-negative");
        }
        Ok(())
    }
}

/// A component value. The variant determines its [`ComponentKind`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Component {
    IsBox,
    Position(Vec3),
    Rotation(Quat),
    Velocity(Vec3),
    Health(f32),
    Render(RenderSpec),
    /// Handle of the node realized for this entity.
    Node(NodeHandle),
    /// Lookup handle into the external body provider. Not owned.
    RigidBody(BodyHandle),
    /// Emissive intensity multiplier.
    Emissive(f32),
    Animated,
    Paused,
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::IsBox => ComponentKind::IsBox,
            Self::Position(_) => ComponentKind::Position,
            Self::Rotation(_) => ComponentKind::Rotation,
            Self::Velocity(_) => ComponentKind::Velocity,
            Self::Health(_) => ComponentKind::Health,
            Self::Render(_) => ComponentKind::Render,
            Self::Node(_) => ComponentKind::Node,
            Self::RigidBody(_) => ComponentKind::RigidBody,
            Self::Emissive(_) => ComponentKind::Emissive,
            Self::Animated => ComponentKind::Animated,
            Self::Paused => ComponentKind::Paused,
        }
    }

    /// Checks the value against the shape contract of its kind.
    pub fn validate(&self) -> Result<(), EcsError> {
        let reason = match self {
            Self::Position(v) | Self::Velocity(v) if !v.is_finite() => {
                Some("vector has non-finite coordinates")
            }
            Self::Rotation(q) if !q.is_finite() || q.length_squared() == 0.0 => {
                Some("rotation must be a finite, non-zero quaternion")
            }
            Self::Health(h) if !h.is_finite() => Some("health must be finite"),
            Self::Emissive(i) if !i.is_finite() || *i < 0.0 => {
                Some("emissive intensity must be finite and non-negative")
            }
            Self::Render(spec) => spec.check().err(),
            _ => None,
        };
        match reason {
            Some(reason) => Err(EcsError::InvalidComponentValue {
                kind: self.kind(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Position(v) | Self::Velocity(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Self::Health(v) | Self::Emissive(v) => Some(*v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_masks_line_up() {
        for (i, kind) in ComponentKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(kind.mask().bits(), 1 << i);
        }
        assert_eq!(ComponentKind::IsBox.mask(), ComponentMask::IS_BOX);
        assert_eq!(ComponentKind::Paused.mask(), ComponentMask::PAUSED);
        assert_eq!(ComponentMask::all().kinds().count(), ComponentKind::COUNT);
    }

    #[test]
    fn component_reports_its_kind() {
        assert_eq!(Component::IsBox.kind(), ComponentKind::IsBox);
        assert_eq!(Component::Position(Vec3::ZERO).kind(), ComponentKind::Position);
        assert_eq!(Component::Node(NodeHandle(4)).kind(), ComponentKind::Node);
        assert_eq!(ComponentKind::Node.to_string(), "three");
    }

    #[test]
    fn non_finite_position_is_rejected() {
        let err = Component::Position(Vec3::new(f32::NAN, 0.0, 0.0))
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            EcsError::InvalidComponentValue {
                kind: ComponentKind::Position,
                ..
            }
        ));
    }

    #[test]
    fn zero_quaternion_is_rejected() {
        assert!(Component::Rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0))
            .validate()
            .is_err());
        assert!(Component::Rotation(Quat::IDENTITY).validate().is_ok());
    }

    #[test]
    fn render_scale_must_be_positive() {
        let spec = RenderSpec::new(MeshKind::Cube, MaterialSpec::solid(0x87ceeb))
            .with_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(Component::Render(spec).validate().is_err());
        let spec = spec.with_scale(Vec3::splat(0.4));
        assert!(Component::Render(spec).validate().is_ok());
    }

    #[test]
    fn negative_emissive_is_rejected() {
        assert!(Component::Emissive(-0.1).validate().is_err());
        assert!(Component::Emissive(0.0).validate().is_ok());
    }

    #[test]
    fn hex_colour_conversion() {
        assert_eq!(hex_rgb(0xff0000), [1.0, 0.0, 0.0]);
        assert_eq!(hex_rgb(0x000000), [0.0; 3]);
        let c = hex_rgb(0x151729);
        assert!((c[2] - 41.0 / 255.0).abs() < 1e-6);
    }
}
