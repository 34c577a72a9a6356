use glam::{Quat, Vec3};
use pixelscene_anim::{AnimationSample, FrameAnimator};
use pixelscene_assets::{AssetError, TextureStore};
use pixelscene_common::{EntityId, NodeHandle};
use pixelscene_ecs::{
    BodyProvider, Component, ComponentKind, EcsError, EntityStore, MaterialSpec, MeshKind,
    Predicate, QueryId, RenderSpec,
};
use pixelscene_render::{ReactiveProjection, SceneGraph};
use std::f32::consts::FRAC_PI_4;

use crate::clock::FrameClock;
use crate::config::{ConfigError, SceneConfig};
use crate::physics::KinematicBodies;

const BOX_COLOR: u32 = 0x87ceeb;
const BOX_SIZE: f32 = 0.25;
const CRYSTAL_COLOR: u32 = 0x2379cf;
const CRYSTAL_EMISSIVE: u32 = 0x143542;
const CRYSTAL_RADIUS: f32 = 0.2;
const PLAYER_COLOR: u32 = 0xff69b4;
const PLAYER_HEALTH: f32 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Ecs(#[from] EcsError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Queries the kernel keeps registered on its store.
#[derive(Debug, Clone, Copy)]
pub struct SceneQueries {
    /// Everything with a render spec; the projection follows this one.
    pub renderable: QueryId,
    pub boxes: QueryId,
    /// Boxes that already have a realized node.
    pub box_nodes: QueryId,
    pub animated: QueryId,
    pub bodies: QueryId,
    pub with_node: QueryId,
}

impl SceneQueries {
    fn register(store: &mut EntityStore) -> Self {
        Self {
            renderable: store.query(Predicate::new().with(ComponentKind::Render)),
            boxes: store.query(Predicate::new().with(ComponentKind::IsBox)),
            box_nodes: store.query(
                Predicate::new()
                    .with(ComponentKind::IsBox)
                    .with(ComponentKind::Node),
            ),
            animated: store.query(
                Predicate::new()
                    .with(ComponentKind::Animated)
                    .without(ComponentKind::Paused),
            ),
            bodies: store.query(Predicate::new().with(ComponentKind::RigidBody)),
            with_node: store.query(Predicate::new().with(ComponentKind::Node)),
        }
    }
}

/// Summary of one [`Scene::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub tick: u64,
    pub elapsed: f64,
    pub created: usize,
    pub disposed: usize,
    pub live_nodes: usize,
    /// Store events drained this frame.
    pub events: usize,
    pub sample: AnimationSample,
}

/// The pixel scene: entity store, animator and node projection.
#[derive(Debug)]
pub struct Scene {
    store: EntityStore,
    animator: FrameAnimator,
    clock: FrameClock,
    projection: ReactiveProjection<NodeHandle>,
    queries: SceneQueries,
    box_order: Vec<EntityId>,
    crystal: Option<EntityId>,
    player: Option<EntityId>,
    last_sample: AnimationSample,
}

impl Scene {
    /// An empty scene. Call [`Scene::populate`] for the stock content.
    pub fn new(config: &SceneConfig) -> Result<Self, SceneError> {
        config.validate()?;
        let animator = FrameAnimator::new(config.animation)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let mut store = EntityStore::new();
        let queries = SceneQueries::register(&mut store);
        Ok(Self {
            store,
            animator,
            clock: FrameClock::new(),
            projection: ReactiveProjection::new(queries.renderable),
            queries,
            box_order: Vec::new(),
            crystal: None,
            player: None,
            last_sample: animator.animate(0.0),
        })
    }

    /// Spawn floor, static boxes, crystal and the configured dynamic boxes.
    pub fn populate(
        &mut self,
        config: &SceneConfig,
        textures: &TextureStore,
        bodies: &mut KinematicBodies,
    ) -> Result<(), SceneError> {
        let box_texture = textures.require("box")?;
        let floor_texture = textures.require("floor")?;

        self.store.create_entity([
            Component::Position(Vec3::ZERO),
            Component::Render(
                RenderSpec::new(MeshKind::Plane, MaterialSpec::textured(floor_texture))
                    .with_scale(Vec3::new(2.0, 1.0, 2.0)),
            ),
        ])?;

        for (side, position) in [
            (0.4, Vec3::new(0.0, 0.2001, 0.0)),
            (0.5, Vec3::new(-0.5, 0.25, -0.5)),
        ] {
            self.store.create_entity([
                Component::Position(position),
                Component::Rotation(Quat::from_rotation_y(FRAC_PI_4)),
                Component::Render(
                    RenderSpec::new(MeshKind::Cube, MaterialSpec::textured(box_texture))
                        .with_scale(Vec3::splat(side)),
                ),
            ])?;
        }

        let crystal = self.store.create_entity([
            Component::Position(Vec3::new(0.0, 1.0, 0.0)),
            Component::Rotation(Quat::IDENTITY),
            Component::Emissive(0.0),
            Component::Animated,
            Component::Render(
                RenderSpec::new(
                    MeshKind::Icosahedron,
                    MaterialSpec::solid(CRYSTAL_COLOR).with_emissive(CRYSTAL_EMISSIVE),
                )
                .with_scale(Vec3::splat(CRYSTAL_RADIUS)),
            ),
        ])?;
        self.crystal = Some(crystal);

        for i in 0..config.box_count {
            let i = i as f32;
            self.spawn_box(Vec3::new(i, i, 2.0), bodies)?;
        }
        if let Some(position) = config.player {
            self.spawn_player(position)?;
        }
        tracing::info!(entities = self.store.len(), "scene populated");
        Ok(())
    }

    /// Spawn the hot-pink player cone (radius 0.5, height 1) with full health.
    /// A second call replaces the previous player.
    pub fn spawn_player(&mut self, position: Vec3) -> Result<EntityId, SceneError> {
        let player = self.store.create_entity([
            Component::Position(position),
            Component::Health(PLAYER_HEALTH),
            Component::Render(
                RenderSpec::new(MeshKind::Cone, MaterialSpec::solid(PLAYER_COLOR))
                    .with_scale(Vec3::new(0.5, 1.0, 0.5)),
            ),
        ])?;
        if let Some(previous) = self.player.replace(player) {
            self.store.destroy_entity(previous);
        }
        tracing::debug!(entity = %player, "player spawned");
        Ok(player)
    }

    /// Spawn a sky-blue physics box at `position`.
    pub fn spawn_box(
        &mut self,
        position: Vec3,
        bodies: &mut KinematicBodies,
    ) -> Result<EntityId, SceneError> {
        let body = bodies.insert(position, Quat::IDENTITY, BOX_SIZE / 2.0);
        let spawned = self.store.create_entity([
            Component::IsBox,
            Component::Position(position),
            Component::Rotation(Quat::IDENTITY),
            Component::RigidBody(body),
            Component::Render(
                RenderSpec::new(MeshKind::Cube, MaterialSpec::solid(BOX_COLOR))
                    .with_scale(Vec3::splat(BOX_SIZE)),
            ),
        ]);
        match spawned {
            Ok(entity) => {
                self.box_order.push(entity);
                tracing::debug!(entity = %entity, "box spawned");
                Ok(entity)
            }
            Err(e) => {
                bodies.remove(body);
                Err(e.into())
            }
        }
    }

    /// Destroy an entity and release its body. Returns false if it was
    /// already gone.
    pub fn despawn(&mut self, entity: EntityId, bodies: &mut KinematicBodies) -> bool {
        let Some(components) = self.store.destroy_entity(entity) else {
            return false;
        };
        for component in components {
            if let Component::RigidBody(handle) = component {
                bodies.remove(handle);
            }
        }
        if self.crystal == Some(entity) {
            self.crystal = None;
        }
        if self.player == Some(entity) {
            self.player = None;
        }
        tracing::debug!(entity = %entity, "entity despawned");
        true
    }

    /// Despawn the most recently spawned box that is still alive.
    pub fn despawn_last_box(&mut self, bodies: &mut KinematicBodies) -> Option<EntityId> {
        while let Some(entity) = self.box_order.pop() {
            if self.despawn(entity, bodies) {
                return Some(entity);
            }
        }
        None
    }

    pub fn crystal(&self) -> Option<EntityId> {
        self.crystal
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    pub fn crystal_paused(&self) -> bool {
        self.crystal
            .is_some_and(|c| self.store.has(c, ComponentKind::Paused))
    }

    /// Freeze or resume the crystal animation.
    pub fn set_crystal_paused(&mut self, paused: bool) -> Result<(), EcsError> {
        let Some(crystal) = self.crystal else {
            return Ok(());
        };
        if paused {
            self.store.add_component(crystal, Component::Paused)?;
        } else {
            self.store.remove_component(crystal, ComponentKind::Paused)?;
        }
        Ok(())
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Mutable store access for hosts. Changes show up at the next tick.
    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn queries(&self) -> &SceneQueries {
        &self.queries
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn projection(&self) -> &ReactiveProjection<NodeHandle> {
        &self.projection
    }

    pub fn last_sample(&self) -> AnimationSample {
        self.last_sample
    }

    /// Number of live boxes.
    pub fn box_count(&self) -> usize {
        self.store.matches(self.queries.boxes).map_or(0, |m| m.len())
    }

    /// Run one frame.
    pub fn tick(
        &mut self,
        dt: f64,
        bodies: &dyn BodyProvider,
        graph: &mut SceneGraph,
    ) -> Result<FrameReport, SceneError> {
        let elapsed = self.clock.advance(dt);
        let tick = self.clock.tick();
        let span = tracing::debug_span!("frame_tick", tick);
        let _enter = span.enter();

        self.read_bodies(bodies)?;
        self.last_sample = self.animator.animate(elapsed);
        self.apply_animation()?;

        let sync = self.projection.sync(&self.store, graph)?;
        self.write_back_nodes()?;
        graph.refresh(&self.store);

        let events = self.store.drain_events().len();
        tracing::trace!(created = sync.created, disposed = sync.disposed, events, "frame done");
        Ok(FrameReport {
            tick,
            elapsed,
            created: sync.created,
            disposed: sync.disposed,
            live_nodes: self.projection.len(),
            events,
            sample: self.last_sample,
        })
    }

    /// Copy simulated transforms onto their entities.
    fn read_bodies(&mut self, bodies: &dyn BodyProvider) -> Result<(), EcsError> {
        let bodied: Vec<EntityId> =
            self.store.matches(self.queries.bodies)?.iter().copied().collect();
        for entity in bodied {
            let Some(handle) = self.store.rigid_body(entity) else {
                continue;
            };
            match bodies.snapshot(handle) {
                Some(snapshot) => {
                    self.store
                        .add_component(entity, Component::Position(snapshot.position))?;
                    self.store
                        .add_component(entity, Component::Rotation(snapshot.rotation))?;
                }
                None => tracing::debug!(
                    entity = %entity,
                    body = handle.0,
                    "body handle no longer resolves"
                ),
            }
        }
        Ok(())
    }

    fn apply_animation(&mut self) -> Result<(), EcsError> {
        let sample = self.last_sample;
        let animated: Vec<EntityId> =
            self.store.matches(self.queries.animated)?.iter().copied().collect();
        for entity in animated {
            let p = self.store.position(entity).unwrap_or(Vec3::ZERO);
            self.store
                .add_component(entity, Component::Position(Vec3::new(p.x, sample.offset_y, p.z)))?;
            let spin = Quat::from_rotation_y(sample.rotation_y);
            self.store.add_component(entity, Component::Rotation(spin))?;
            self.store
                .add_component(entity, Component::Emissive(sample.intensity))?;
        }
        Ok(())
    }

    /// Make every entity's `Node` name the node realized for it, and nothing
    /// else. Host edits to `Node` are undone here, every frame.
    fn write_back_nodes(&mut self) -> Result<(), EcsError> {
        let realized: Vec<(EntityId, NodeHandle)> =
            self.projection.nodes().map(|(e, n)| (e, *n)).collect();
        for (entity, handle) in realized {
            let recorded = self.store.node(entity);
            if recorded != Some(handle) {
                if recorded.is_some() {
                    tracing::debug!(
                        entity = %entity,
                        node = %handle,
                        "restoring overwritten node handle"
                    );
                }
                self.store.add_component(entity, Component::Node(handle))?;
            }
        }
        let stale: Vec<EntityId> = self
            .store
            .matches(self.queries.with_node)?
            .iter()
            .filter(|e| self.projection.node(**e).is_none())
            .copied()
            .collect();
        for entity in stale {
            self.store.remove_component(entity, ComponentKind::Node)?;
        }
        Ok(())
    }

    /// Dispose every node, e.g. before the renderer goes away.
    pub fn shutdown(&mut self, graph: &mut SceneGraph) -> Result<usize, EcsError> {
        let disposed = self.projection.clear(graph);
        self.write_back_nodes()?;
        tracing::info!(disposed, "scene shut down");
        Ok(disposed)
    }
}
