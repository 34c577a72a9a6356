use glam::{Quat, Vec3};
use pixelscene_common::{EntityId, NodeHandle};
use std::collections::BTreeSet;

use crate::body::BodyHandle;
use crate::component::{Component, ComponentKind, ComponentMask, RenderSpec};
use crate::error::EcsError;
use crate::query::{ArchetypeQuery, Predicate, QueryId};

/// Events produced by store mutations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Spawned { entity: EntityId },
    Despawned { entity: EntityId },
    ComponentAdded { entity: EntityId, kind: ComponentKind },
    ComponentReplaced { entity: EntityId, kind: ComponentKind },
    ComponentRemoved { entity: EntityId, kind: ComponentKind },
}

#[derive(Debug, Clone)]
struct EntityRecord {
    mask: ComponentMask,
    components: [Option<Component>; ComponentKind::COUNT],
}

impl EntityRecord {
    fn build(components: impl IntoIterator<Item = Component>) -> Result<Self, EcsError> {
        let mut record = Self {
            mask: ComponentMask::empty(),
            components: [None; ComponentKind::COUNT],
        };
        for component in components {
            component.validate()?;
            let kind = component.kind();
            if record.mask.has(kind) {
                return Err(EcsError::DuplicateComponent(kind));
            }
            record.mask |= kind.mask();
            record.components[kind.index()] = Some(component);
        }
        Ok(record)
    }

    fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().flatten()
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    record: Option<EntityRecord>,
}

/// Owner of every entity and its components.
///
/// Slots are recycled through a free list; each reuse bumps the slot
/// generation so stale ids keep failing with [`EcsError::UnknownEntity`].
/// Registered queries are updated synchronously inside every mutation.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    queries: Vec<ArchetypeQuery>,
    events: Vec<StoreEvent>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.record(id).is_some()
    }

    /// Live entity ids in slot order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.record
                .as_ref()
                .map(|_| EntityId::new(index as u32, slot.generation))
        })
    }

    /// Allocate an entity carrying `components`.
    ///
    /// Every value is validated before anything is allocated, so a rejected
    /// call leaves the store untouched.
    pub fn create_entity(
        &mut self,
        components: impl IntoIterator<Item = Component>,
    ) -> Result<EntityId, EcsError> {
        let record = EntityRecord::build(components)?;
        let mask = record.mask;

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.record = Some(record);
                EntityId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    record: Some(record),
                });
                EntityId::new(index, 0)
            }
        };
        self.live += 1;
        self.events.push(StoreEvent::Spawned { entity: id });

        for query in &mut self.queries {
            query.reevaluate(id, mask);
        }
        tracing::debug!(entity = %id, components = mask.bits(), "entity created");
        Ok(id)
    }

    /// Remove an entity and all of its components.
    ///
    /// Returns the removed components, or `None` if the id was not live.
    /// Destroying twice is a no-op.
    pub fn destroy_entity(&mut self, id: EntityId) -> Option<Vec<Component>> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        self.events.push(StoreEvent::Despawned { entity: id });

        for query in &mut self.queries {
            query.forget(id);
        }
        tracing::debug!(entity = %id, "entity destroyed");
        Some(record.iter().copied().collect())
    }

    /// Attach or replace one component.
    ///
    /// Returns the previous value of the same kind, if any.
    pub fn add_component(
        &mut self,
        id: EntityId,
        component: Component,
    ) -> Result<Option<Component>, EcsError> {
        component.validate()?;
        let kind = component.kind();
        let record = self.record_mut(id).ok_or(EcsError::UnknownEntity(id))?;

        let previous = record.components[kind.index()].replace(component);
        if previous.is_some() {
            self.events.push(StoreEvent::ComponentReplaced { entity: id, kind });
            return Ok(previous);
        }

        record.mask |= kind.mask();
        let mask = record.mask;
        self.events.push(StoreEvent::ComponentAdded { entity: id, kind });
        self.reevaluate(id, kind, mask);
        Ok(None)
    }

    /// Detach one component. Removing an absent kind is not an error.
    pub fn remove_component(
        &mut self,
        id: EntityId,
        kind: ComponentKind,
    ) -> Result<Option<Component>, EcsError> {
        let record = self.record_mut(id).ok_or(EcsError::UnknownEntity(id))?;
        let Some(previous) = record.components[kind.index()].take() else {
            return Ok(None);
        };

        record.mask.remove(kind.mask());
        let mask = record.mask;
        self.events.push(StoreEvent::ComponentRemoved { entity: id, kind });
        self.reevaluate(id, kind, mask);
        Ok(Some(previous))
    }

    pub fn get_component(&self, id: EntityId, kind: ComponentKind) -> Option<&Component> {
        self.record(id)?.components[kind.index()].as_ref()
    }

    pub fn has(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.mask(id).is_some_and(|mask| mask.has(kind))
    }

    pub fn mask(&self, id: EntityId) -> Option<ComponentMask> {
        self.record(id).map(|r| r.mask)
    }

    /// All components of a live entity, in kind order.
    pub fn components(&self, id: EntityId) -> Option<impl Iterator<Item = &Component>> {
        self.record(id).map(EntityRecord::iter)
    }

    // --- typed lookups ---

    pub fn position(&self, id: EntityId) -> Option<Vec3> {
        match self.get_component(id, ComponentKind::Position)? {
            Component::Position(v) => Some(*v),
            _ => None,
        }
    }

    pub fn rotation(&self, id: EntityId) -> Option<Quat> {
        match self.get_component(id, ComponentKind::Rotation)? {
            Component::Rotation(q) => Some(*q),
            _ => None,
        }
    }

    pub fn render_spec(&self, id: EntityId) -> Option<RenderSpec> {
        match self.get_component(id, ComponentKind::Render)? {
            Component::Render(spec) => Some(*spec),
            _ => None,
        }
    }

    pub fn node(&self, id: EntityId) -> Option<NodeHandle> {
        match self.get_component(id, ComponentKind::Node)? {
            Component::Node(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn rigid_body(&self, id: EntityId) -> Option<BodyHandle> {
        match self.get_component(id, ComponentKind::RigidBody)? {
            Component::RigidBody(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn emissive(&self, id: EntityId) -> Option<f32> {
        match self.get_component(id, ComponentKind::Emissive)? {
            Component::Emissive(intensity) => Some(*intensity),
            _ => None,
        }
    }

    pub fn health(&self, id: EntityId) -> Option<f32> {
        match self.get_component(id, ComponentKind::Health)? {
            Component::Health(health) => Some(*health),
            _ => None,
        }
    }

    // --- queries ---

    /// Register a live query. Membership is seeded with a full scan once;
    /// afterwards it is maintained incrementally.
    pub fn query(&mut self, predicate: Predicate) -> QueryId {
        let id = QueryId(self.queries.len() as u32);
        let members = self.scan(&predicate);
        tracing::debug!(query = id.0, seeded = members.len(), "query registered");
        self.queries
            .push(ArchetypeQuery::seeded(id, predicate, members));
        id
    }

    pub fn get_query(&self, id: QueryId) -> Result<&ArchetypeQuery, EcsError> {
        self.queries
            .get(id.0 as usize)
            .ok_or(EcsError::UnknownQuery(id))
    }

    /// Current match set of a registered query.
    pub fn matches(&self, id: QueryId) -> Result<&BTreeSet<EntityId>, EcsError> {
        self.get_query(id).map(ArchetypeQuery::current)
    }

    /// Brute-force evaluation of `predicate` over every live entity.
    pub fn scan(&self, predicate: &Predicate) -> BTreeSet<EntityId> {
        self.ids()
            .filter(|id| self.mask(*id).is_some_and(|m| predicate.matches(m)))
            .collect()
    }

    // --- events ---

    /// Drain and return all pending store events.
    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only access to pending events.
    pub fn events(&self) -> &[StoreEvent] {
        &self.events
    }

    fn reevaluate(&mut self, id: EntityId, kind: ComponentKind, mask: ComponentMask) {
        for query in &mut self.queries {
            if query.predicate().references(kind) {
                query.reevaluate(id, mask);
            }
        }
    }

    fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?
            .record
            .as_ref()
    }

    fn record_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?
            .record
            .as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{MaterialSpec, MeshKind};

    fn box_components(i: usize) -> Vec<Component> {
        vec![
            Component::IsBox,
            Component::Position(Vec3::new(i as f32, i as f32, 2.0)),
            Component::Render(RenderSpec::new(MeshKind::Cube, MaterialSpec::solid(0x87ceeb))),
        ]
    }

    fn sample(kind: ComponentKind, seed: u64) -> Component {
        let f = (seed % 100) as f32;
        match kind {
            ComponentKind::IsBox => Component::IsBox,
            ComponentKind::Position => Component::Position(Vec3::splat(f)),
            ComponentKind::Rotation => Component::Rotation(Quat::from_rotation_y(f)),
            ComponentKind::Velocity => Component::Velocity(Vec3::new(0.0, -f, 0.0)),
            ComponentKind::Health => Component::Health(f),
            ComponentKind::Render => Component::Render(RenderSpec::new(
                MeshKind::Cube,
                MaterialSpec::solid(0xffffff),
            )),
            ComponentKind::Node => Component::Node(NodeHandle(seed)),
            ComponentKind::RigidBody => Component::RigidBody(BodyHandle(seed)),
            ComponentKind::Emissive => Component::Emissive(f / 100.0),
            ComponentKind::Animated => Component::Animated,
            ComponentKind::Paused => Component::Paused,
        }
    }

    fn splitmix64(state: &mut u64) -> u64 {
        *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = *state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    #[test]
    fn create_and_read_back() {
        let mut store = EntityStore::new();
        let id = store.create_entity(box_components(1)).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.has(id, ComponentKind::IsBox));
        assert_eq!(store.position(id), Some(Vec3::new(1.0, 1.0, 2.0)));
        assert!(store.get_component(id, ComponentKind::Health).is_none());
        assert_eq!(store.components(id).unwrap().count(), 3);
    }

    #[test]
    fn ids_are_unique_while_live() {
        let mut store = EntityStore::new();
        let ids: BTreeSet<EntityId> = (0..10)
            .map(|i| store.create_entity(box_components(i)).unwrap())
            .collect();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn recycled_slot_gets_new_generation() {
        let mut store = EntityStore::new();
        let old = store.create_entity([Component::IsBox]).unwrap();
        store.destroy_entity(old);
        let new = store.create_entity([Component::IsBox]).unwrap();

        assert_eq!(old.index, new.index);
        assert_ne!(old, new);
        assert!(!store.contains(old));
        assert_eq!(
            store.add_component(old, Component::Paused),
            Err(EcsError::UnknownEntity(old))
        );
        assert!(!store.has(new, ComponentKind::Paused));
    }

    #[test]
    fn double_destroy_is_noop() {
        let mut store = EntityStore::new();
        let q = store.query(Predicate::new().with(ComponentKind::IsBox));
        let id = store.create_entity(box_components(0)).unwrap();
        let other = store.create_entity(box_components(1)).unwrap();

        assert!(store.destroy_entity(id).is_some());
        let version = store.get_query(q).unwrap().version();
        assert!(store.destroy_entity(id).is_none());

        assert_eq!(store.len(), 1);
        assert!(store.contains(other));
        assert_eq!(store.get_query(q).unwrap().version(), version);
        // Only one despawn event is recorded.
        let despawns = store
            .events()
            .iter()
            .filter(|e| matches!(e, StoreEvent::Despawned { .. }))
            .count();
        assert_eq!(despawns, 1);
    }

    #[test]
    fn unknown_entity_mutations_fail() {
        let mut store = EntityStore::new();
        let ghost = EntityId::new(7, 0);
        assert_eq!(
            store.add_component(ghost, Component::IsBox),
            Err(EcsError::UnknownEntity(ghost))
        );
        assert_eq!(
            store.remove_component(ghost, ComponentKind::IsBox),
            Err(EcsError::UnknownEntity(ghost))
        );
        assert!(store.events().is_empty());
    }

    #[test]
    fn invalid_value_leaves_prior_state() {
        let mut store = EntityStore::new();
        let id = store.create_entity(box_components(2)).unwrap();
        store.drain_events();

        let err = store
            .add_component(id, Component::Position(Vec3::new(0.0, f32::INFINITY, 0.0)))
            .unwrap_err();
        assert!(matches!(err, EcsError::InvalidComponentValue { .. }));
        assert_eq!(store.position(id), Some(Vec3::new(2.0, 2.0, 2.0)));
        assert!(store.events().is_empty());
    }

    #[test]
    fn invalid_initial_components_allocate_nothing() {
        let mut store = EntityStore::new();
        let err = store
            .create_entity([Component::IsBox, Component::Health(f32::NAN)])
            .unwrap_err();
        assert!(matches!(err, EcsError::InvalidComponentValue { .. }));
        assert!(store.is_empty());

        let err = store
            .create_entity([Component::IsBox, Component::IsBox])
            .unwrap_err();
        assert_eq!(err, EcsError::DuplicateComponent(ComponentKind::IsBox));
        assert!(store.is_empty());
        assert!(store.events().is_empty());
    }

    #[test]
    fn add_replaces_without_duplicating() {
        let mut store = EntityStore::new();
        let id = store.create_entity([Component::Health(100.0)]).unwrap();
        let old = store.add_component(id, Component::Health(50.0)).unwrap();
        assert_eq!(old, Some(Component::Health(100.0)));
        assert_eq!(store.components(id).unwrap().count(), 1);
        assert!(matches!(
            store.events().last(),
            Some(StoreEvent::ComponentReplaced { .. })
        ));
    }

    #[test]
    fn remove_absent_component_is_not_an_error() {
        let mut store = EntityStore::new();
        let id = store.create_entity([Component::IsBox]).unwrap();
        assert_eq!(store.remove_component(id, ComponentKind::Paused), Ok(None));
        assert_eq!(
            store.remove_component(id, ComponentKind::IsBox),
            Ok(Some(Component::IsBox))
        );
        assert_eq!(store.mask(id), Some(ComponentMask::empty()));
    }

    #[test]
    fn query_seeds_from_existing_entities() {
        let mut store = EntityStore::new();
        for i in 0..3 {
            store.create_entity(box_components(i)).unwrap();
        }
        store.create_entity([Component::Health(10.0)]).unwrap();

        let q = store.query(Predicate::new().with(ComponentKind::IsBox));
        assert_eq!(store.matches(q).unwrap().len(), 3);
        assert_eq!(store.get_query(q).unwrap().version(), 0);
    }

    #[test]
    fn query_tracks_component_changes() {
        let mut store = EntityStore::new();
        let boxes = store.query(
            Predicate::new()
                .with(ComponentKind::IsBox)
                .with(ComponentKind::Node),
        );
        let active = store.query(
            Predicate::new()
                .with(ComponentKind::Animated)
                .without(ComponentKind::Paused),
        );

        let id = store.create_entity([Component::IsBox, Component::Animated]).unwrap();
        assert!(store.matches(boxes).unwrap().is_empty());
        assert!(store.matches(active).unwrap().contains(&id));

        store.add_component(id, Component::Node(NodeHandle(1))).unwrap();
        assert!(store.matches(boxes).unwrap().contains(&id));

        store.add_component(id, Component::Paused).unwrap();
        assert!(store.matches(active).unwrap().is_empty());

        store.remove_component(id, ComponentKind::Paused).unwrap();
        assert!(store.matches(active).unwrap().contains(&id));

        store.destroy_entity(id);
        assert!(store.matches(boxes).unwrap().is_empty());
        assert!(store.matches(active).unwrap().is_empty());
    }

    #[test]
    fn unrelated_mutation_does_not_touch_query() {
        let mut store = EntityStore::new();
        let q = store.query(Predicate::new().with(ComponentKind::IsBox));
        let id = store.create_entity([Component::IsBox]).unwrap();
        let version = store.get_query(q).unwrap().version();
        store.add_component(id, Component::Health(3.0)).unwrap();
        store.remove_component(id, ComponentKind::Health).unwrap();
        assert_eq!(store.get_query(q).unwrap().version(), version);
    }

    #[test]
    fn unknown_query_is_reported() {
        let store = EntityStore::new();
        assert_eq!(
            store.matches(QueryId(9)).unwrap_err(),
            EcsError::UnknownQuery(QueryId(9))
        );
    }

    #[test]
    fn five_boxes_then_destroy_one() {
        let mut store = EntityStore::new();
        let q = store.query(Predicate::new().with(ComponentKind::IsBox));
        let ids: Vec<EntityId> = (0..5)
            .map(|i| store.create_entity(box_components(i)).unwrap())
            .collect();
        assert_eq!(store.matches(q).unwrap().len(), 5);

        store.destroy_entity(ids[3]);
        let current = store.matches(q).unwrap();
        assert_eq!(current.len(), 4);
        assert!(!current.contains(&ids[3]));
    }

    #[test]
    fn incremental_matches_full_rescan() {
        let predicates = [
            Predicate::new(),
            Predicate::new().with(ComponentKind::IsBox),
            Predicate::new()
                .with(ComponentKind::IsBox)
                .with(ComponentKind::Node),
            Predicate::new()
                .with(ComponentKind::Render)
                .without(ComponentKind::Paused),
            Predicate::new().without(ComponentKind::Paused),
            Predicate::new()
                .with(ComponentKind::RigidBody)
                .with(ComponentKind::Position)
                .without(ComponentKind::Animated),
        ];

        let mut store = EntityStore::new();
        let queries: Vec<QueryId> = predicates.iter().map(|p| store.query(*p)).collect();
        let mut live: Vec<EntityId> = Vec::new();
        let mut dead: Vec<EntityId> = Vec::new();
        let mut rng = 0x5eed_u64;

        for _ in 0..3000 {
            let r = splitmix64(&mut rng);
            let kind = ComponentKind::ALL[(r >> 16) as usize % ComponentKind::COUNT];
            match r % 8 {
                0 | 1 => {
                    let initial: Vec<Component> = ComponentKind::ALL
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| (r >> (20 + i)) & 1 == 1)
                        .map(|(_, k)| sample(*k, r))
                        .collect();
                    live.push(store.create_entity(initial).unwrap());
                }
                2 if !live.is_empty() => {
                    let id = live.swap_remove((r >> 8) as usize % live.len());
                    assert!(store.destroy_entity(id).is_some());
                    dead.push(id);
                }
                3 if !dead.is_empty() => {
                    let id = dead[(r >> 8) as usize % dead.len()];
                    assert!(store.destroy_entity(id).is_none());
                    assert!(store.add_component(id, Component::IsBox).is_err());
                }
                4..=5 if !live.is_empty() => {
                    let id = live[(r >> 8) as usize % live.len()];
                    store.add_component(id, sample(kind, r)).unwrap();
                }
                _ if !live.is_empty() => {
                    let id = live[(r >> 8) as usize % live.len()];
                    store.remove_component(id, kind).unwrap();
                }
                _ => {}
            }

            for (q, p) in queries.iter().zip(&predicates) {
                assert_eq!(store.matches(*q).unwrap(), &store.scan(p));
            }
            assert_eq!(store.len(), live.len());
        }
    }
}
