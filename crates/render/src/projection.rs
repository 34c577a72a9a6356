//! Reactive projection of a query onto externally owned nodes.
//!
//! Each sync diffs the query's current match set against the nodes realized
//! so far and emits an explicit command list: every disposal first, then
//! every creation. The backend only ever sees those commands.

use pixelscene_common::EntityId;
use pixelscene_ecs::{EcsError, EntityStore, QueryId};
use std::collections::BTreeMap;

/// Creates and disposes the nodes a projection realizes.
pub trait NodeBackend {
    type Node;

    /// Build the node for an entity that just entered the match set.
    fn create_node(&mut self, entity: EntityId, store: &EntityStore) -> Self::Node;

    /// Release the node of an entity that left the match set.
    fn dispose_node(&mut self, entity: EntityId, node: Self::Node);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionCommand {
    Dispose(EntityId),
    Create(EntityId),
}

/// Commands for one update, disposals ahead of creations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionPlan {
    pub commands: Vec<ProjectionCommand>,
    version: u64,
}

impl ProjectionPlan {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn disposals(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.commands.iter().filter_map(|c| match c {
            ProjectionCommand::Dispose(e) => Some(*e),
            ProjectionCommand::Create(_) => None,
        })
    }

    pub fn creations(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.commands.iter().filter_map(|c| match c {
            ProjectionCommand::Create(e) => Some(*e),
            ProjectionCommand::Dispose(_) => None,
        })
    }
}

/// Outcome of applying a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub disposed: usize,
}

/// Keeps exactly one node per entity currently matched by a query.
#[derive(Debug)]
pub struct ReactiveProjection<N> {
    query: QueryId,
    nodes: BTreeMap<EntityId, N>,
    synced_version: Option<u64>,
}

impl<N> ReactiveProjection<N> {
    pub fn new(query: QueryId) -> Self {
        Self {
            query,
            nodes: BTreeMap::new(),
            synced_version: None,
        }
    }

    pub fn query(&self) -> QueryId {
        self.query
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, entity: EntityId) -> Option<&N> {
        self.nodes.get(&entity)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (EntityId, &N)> {
        self.nodes.iter().map(|(e, n)| (*e, n))
    }

    /// Diff the query against the realized nodes.
    ///
    /// Returns an empty plan without walking either set when the query has
    /// not changed since the last applied plan.
    pub fn plan(&self, store: &EntityStore) -> Result<ProjectionPlan, EcsError> {
        let query = store.get_query(self.query)?;
        let version = query.version();
        if self.synced_version == Some(version) {
            return Ok(ProjectionPlan {
                commands: Vec::new(),
                version,
            });
        }

        let current = query.current();
        let mut commands: Vec<ProjectionCommand> = self
            .nodes
            .keys()
            .filter(|e| !current.contains(e))
            .map(|e| ProjectionCommand::Dispose(*e))
            .collect();
        commands.extend(
            current
                .iter()
                .filter(|e| !self.nodes.contains_key(e))
                .map(|e| ProjectionCommand::Create(*e)),
        );
        Ok(ProjectionPlan { commands, version })
    }

    /// Execute a plan against the backend.
    ///
    /// Creations for entities that no longer match (the store moved on after
    /// planning) are skipped; the next plan picks up the difference.
    pub fn apply<B>(
        &mut self,
        plan: ProjectionPlan,
        store: &EntityStore,
        backend: &mut B,
    ) -> Result<SyncReport, EcsError>
    where
        B: NodeBackend<Node = N>,
    {
        let current = store.matches(self.query)?;
        let mut report = SyncReport::default();

        for command in plan.commands {
            match command {
                ProjectionCommand::Dispose(entity) => {
                    if let Some(node) = self.nodes.remove(&entity) {
                        backend.dispose_node(entity, node);
                        report.disposed += 1;
                        tracing::debug!(entity = %entity, "projection disposed node");
                    }
                }
                ProjectionCommand::Create(entity) => {
                    if self.nodes.contains_key(&entity) || !current.contains(&entity) {
                        continue;
                    }
                    let node = backend.create_node(entity, store);
                    self.nodes.insert(entity, node);
                    report.created += 1;
                    tracing::debug!(entity = %entity, "projection created node");
                }
            }
        }
        self.synced_version = Some(plan.version);
        Ok(report)
    }

    /// Plan and apply in one step. Called once per frame, before drawing.
    pub fn sync<B>(&mut self, store: &EntityStore, backend: &mut B) -> Result<SyncReport, EcsError>
    where
        B: NodeBackend<Node = N>,
    {
        let plan = self.plan(store)?;
        if plan.is_empty() {
            self.synced_version = Some(plan.version);
            return Ok(SyncReport::default());
        }
        self.apply(plan, store, backend)
    }

    /// Dispose every node, e.g. at teardown.
    pub fn clear<B>(&mut self, backend: &mut B) -> usize
    where
        B: NodeBackend<Node = N>,
    {
        let disposed = self.nodes.len();
        for (entity, node) in std::mem::take(&mut self.nodes) {
            backend.dispose_node(entity, node);
        }
        self.synced_version = None;
        disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelscene_ecs::{Component, ComponentKind, Predicate};

    /// Backend that records every call.
    #[derive(Default)]
    struct Recorder {
        next: u32,
        created: Vec<EntityId>,
        disposed: Vec<(EntityId, u32)>,
        log: Vec<ProjectionCommand>,
    }

    impl NodeBackend for Recorder {
        type Node = u32;

        fn create_node(&mut self, entity: EntityId, _store: &EntityStore) -> u32 {
            self.next += 1;
            self.created.push(entity);
            self.log.push(ProjectionCommand::Create(entity));
            self.next
        }

        fn dispose_node(&mut self, entity: EntityId, node: u32) {
            self.disposed.push((entity, node));
            self.log.push(ProjectionCommand::Dispose(entity));
        }
    }

    fn boxes_store() -> (EntityStore, QueryId) {
        let mut store = EntityStore::new();
        let q = store.query(Predicate::new().with(ComponentKind::IsBox));
        (store, q)
    }

    #[test]
    fn entering_entities_are_created_once() {
        let (mut store, q) = boxes_store();
        let mut projection = ReactiveProjection::new(q);
        let mut backend = Recorder::default();

        let a = store.create_entity([Component::IsBox]).unwrap();
        let b = store.create_entity([Component::IsBox]).unwrap();
        let report = projection.sync(&store, &mut backend).unwrap();
        assert_eq!(report, SyncReport { created: 2, disposed: 0 });

        // Stays matched across updates: never recreated.
        store.add_component(a, Component::Health(5.0)).unwrap();
        for _ in 0..3 {
            assert_eq!(projection.sync(&store, &mut backend).unwrap(), SyncReport::default());
        }
        assert_eq!(backend.created, vec![a, b]);
        assert!(backend.disposed.is_empty());
    }

    #[test]
    fn leaving_entities_are_disposed_once() {
        let (mut store, q) = boxes_store();
        let mut projection = ReactiveProjection::new(q);
        let mut backend = Recorder::default();

        let a = store.create_entity([Component::IsBox]).unwrap();
        let b = store.create_entity([Component::IsBox]).unwrap();
        projection.sync(&store, &mut backend).unwrap();

        store.remove_component(a, ComponentKind::IsBox).unwrap();
        store.destroy_entity(b);
        store.destroy_entity(b);
        let report = projection.sync(&store, &mut backend).unwrap();
        assert_eq!(report.disposed, 2);
        assert!(projection.is_empty());

        assert_eq!(projection.sync(&store, &mut backend).unwrap(), SyncReport::default());
        assert_eq!(backend.disposed.len(), 2);
    }

    #[test]
    fn disposals_run_before_creations() {
        let (mut store, q) = boxes_store();
        let mut projection = ReactiveProjection::new(q);
        let mut backend = Recorder::default();

        let old = store.create_entity([Component::IsBox]).unwrap();
        projection.sync(&store, &mut backend).unwrap();
        backend.log.clear();

        // Slot is recycled under a new generation within the same tick.
        store.destroy_entity(old);
        let new = store.create_entity([Component::IsBox]).unwrap();
        assert_eq!(old.index, new.index);

        let plan = projection.plan(&store).unwrap();
        assert_eq!(
            plan.commands,
            vec![ProjectionCommand::Dispose(old), ProjectionCommand::Create(new)]
        );
        projection.apply(plan, &store, &mut backend).unwrap();
        assert_eq!(
            backend.log,
            vec![ProjectionCommand::Dispose(old), ProjectionCommand::Create(new)]
        );
        assert_eq!(projection.len(), 1);
    }

    #[test]
    fn transient_membership_between_syncs_is_invisible() {
        let (mut store, q) = boxes_store();
        let mut projection = ReactiveProjection::new(q);
        let mut backend = Recorder::default();

        let e = store.create_entity([Component::Health(1.0)]).unwrap();
        store.add_component(e, Component::IsBox).unwrap();
        store.remove_component(e, ComponentKind::IsBox).unwrap();
        assert_eq!(projection.sync(&store, &mut backend).unwrap(), SyncReport::default());
        assert!(backend.log.is_empty());
    }

    #[test]
    fn stale_plan_skips_entities_that_left() {
        let (mut store, q) = boxes_store();
        let mut projection = ReactiveProjection::new(q);
        let mut backend = Recorder::default();

        let e = store.create_entity([Component::IsBox]).unwrap();
        let plan = projection.plan(&store).unwrap();
        store.destroy_entity(e);
        let report = projection.apply(plan, &store, &mut backend).unwrap();
        assert_eq!(report.created, 0);
        assert!(projection.is_empty());
    }

    #[test]
    fn clear_disposes_everything() {
        let (mut store, q) = boxes_store();
        let mut projection = ReactiveProjection::new(q);
        let mut backend = Recorder::default();
        for _ in 0..4 {
            store.create_entity([Component::IsBox]).unwrap();
        }
        projection.sync(&store, &mut backend).unwrap();
        assert_eq!(projection.clear(&mut backend), 4);
        assert_eq!(backend.disposed.len(), 4);

        // After clearing, the next sync realizes everything again.
        assert_eq!(projection.sync(&store, &mut backend).unwrap().created, 4);
    }

    #[test]
    fn live_nodes_match_query_after_random_mutations() {
        let (mut store, q) = boxes_store();
        let mut projection = ReactiveProjection::new(q);
        let mut backend = Recorder::default();
        let mut ids = Vec::new();
        let mut state = 7u64;

        for step in 0..500u32 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let r = (state >> 33) as usize;
            match r % 4 {
                0 => ids.push(store.create_entity([Component::IsBox]).unwrap()),
                1 if !ids.is_empty() => {
                    let id = ids[r / 4 % ids.len()];
                    store.destroy_entity(id);
                }
                2 if !ids.is_empty() => {
                    let id = ids[r / 4 % ids.len()];
                    let _ = store.remove_component(id, ComponentKind::IsBox);
                }
                _ if !ids.is_empty() => {
                    let id = ids[r / 4 % ids.len()];
                    let _ = store.add_component(id, Component::IsBox);
                }
                _ => {}
            }
            if step % 3 == 0 {
                projection.sync(&store, &mut backend).unwrap();
                let current = store.matches(q).unwrap();
                assert_eq!(projection.len(), current.len());
                assert!(projection.nodes().all(|(e, _)| current.contains(&e)));
            }
        }
        let live = backend.created.len() - backend.disposed.len();
        assert_eq!(live, projection.len());
    }
}
