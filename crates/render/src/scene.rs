use glam::{Quat, Vec3};
use pixelscene_common::{EntityId, NodeHandle, Transform};
use pixelscene_ecs::{EntityStore, MaterialSpec, MeshKind, RenderSpec};
use std::collections::BTreeMap;

use crate::projection::NodeBackend;

/// A realized drawable, owned by the [`SceneGraph`].
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub entity: EntityId,
    pub spec: RenderSpec,
    pub transform: Transform,
    /// Multiplier on the material's emissive colour.
    pub emissive_intensity: f32,
}

/// Renderer-side node storage.
///
/// Handles are issued monotonically and never reused, so a stale handle held
/// on an entity can only miss, never alias a newer node.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<NodeHandle, SceneNode>,
    next_handle: u64,
    total_created: u64,
    total_disposed: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&SceneNode> {
        self.nodes.get(&handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &SceneNode)> {
        self.nodes.iter().map(|(h, n)| (*h, n))
    }

    pub fn total_created(&self) -> u64 {
        self.total_created
    }

    pub fn total_disposed(&self) -> u64 {
        self.total_disposed
    }

    /// Pull transforms, render specs and emissive intensity from the store.
    ///
    /// Reads only. Nodes whose entity has vanished keep their last state
    /// until the projection disposes them.
    pub fn refresh(&mut self, store: &EntityStore) {
        for node in self.nodes.values_mut() {
            if !store.contains(node.entity) {
                continue;
            }
            if let Some(spec) = store.render_spec(node.entity) {
                node.spec = spec;
            }
            node.transform = entity_transform(store, node.entity, &node.spec);
            node.emissive_intensity = store.emissive(node.entity).unwrap_or(0.0);
        }
    }
}

fn entity_transform(store: &EntityStore, entity: EntityId, spec: &RenderSpec) -> Transform {
    Transform {
        position: store.position(entity).unwrap_or(Vec3::ZERO),
        rotation: store.rotation(entity).unwrap_or(Quat::IDENTITY),
        scale: spec.scale,
    }
}

impl NodeBackend for SceneGraph {
    type Node = NodeHandle;

    fn create_node(&mut self, entity: EntityId, store: &EntityStore) -> NodeHandle {
        let spec = store.render_spec(entity).unwrap_or_else(|| {
            tracing::warn!(
                entity = %entity,
                "projected entity has no render spec, using a white cube"
            );
            RenderSpec::new(MeshKind::Cube, MaterialSpec::solid(0xffffff))
        });
        let handle = NodeHandle(self.next_handle);
        self.next_handle += 1;
        self.total_created += 1;
        self.nodes.insert(
            handle,
            SceneNode {
                entity,
                spec,
                transform: entity_transform(store, entity, &spec),
                emissive_intensity: store.emissive(entity).unwrap_or(0.0),
            },
        );
        handle
    }

    fn dispose_node(&mut self, entity: EntityId, node: NodeHandle) {
        match self.nodes.remove(&node) {
            Some(_) => self.total_disposed += 1,
            None => tracing::warn!(entity = %entity, node = %node, "dispose of unknown node"),
        }
    }
}
