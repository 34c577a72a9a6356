//! Live archetype queries.
//!
//! A [`Predicate`] is plain data (required and excluded component kinds), so
//! it evaluates the same way for the same mask every time. The store keeps
//! each registered [`ArchetypeQuery`] current by re-testing only the entity a
//! mutation touched, and only for queries whose predicate mentions the
//! mutated kind.

use pixelscene_common::EntityId;
use std::collections::BTreeSet;

use crate::component::{ComponentKind, ComponentMask};

/// Presence/absence test over an entity's component mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Predicate {
    with: ComponentMask,
    without: ComponentMask,
}

impl Predicate {
    /// A predicate that matches every entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `kind` to be present.
    #[must_use]
    pub fn with(mut self, kind: ComponentKind) -> Self {
        self.with |= kind.mask();
        self
    }

    /// Require `kind` to be absent.
    #[must_use]
    pub fn without(mut self, kind: ComponentKind) -> Self {
        self.without |= kind.mask();
        self
    }

    pub fn matches(&self, mask: ComponentMask) -> bool {
        mask.contains(self.with) && !mask.intersects(self.without)
    }

    /// Whether adding or removing `kind` can flip this predicate.
    pub fn references(&self, kind: ComponentKind) -> bool {
        (self.with | self.without).has(kind)
    }

    pub fn required(&self) -> ComponentMask {
        self.with
    }

    pub fn excluded(&self) -> ComponentMask {
        self.without
    }
}

/// Handle of a query registered on an [`EntityStore`](crate::EntityStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub u32);

/// The set of entities currently satisfying a predicate.
#[derive(Debug, Clone)]
pub struct ArchetypeQuery {
    id: QueryId,
    predicate: Predicate,
    members: BTreeSet<EntityId>,
    version: u64,
}

impl ArchetypeQuery {
    pub(crate) fn seeded(id: QueryId, predicate: Predicate, members: BTreeSet<EntityId>) -> Self {
        Self {
            id,
            predicate,
            members,
            version: 0,
        }
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Entity ids matching as of the latest store mutation.
    pub fn current(&self) -> &BTreeSet<EntityId> {
        &self.members
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Bumped every time membership changes.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Re-test one entity after its mask changed.
    pub(crate) fn reevaluate(&mut self, id: EntityId, mask: ComponentMask) {
        let changed = if self.predicate.matches(mask) {
            self.members.insert(id)
        } else {
            self.members.remove(&id)
        };
        if changed {
            self.version += 1;
            tracing::trace!(
                query = self.id.0,
                entity = %id,
                matched = self.members.contains(&id),
                "query membership changed"
            );
        }
    }

    /// Drop an entity that no longer exists.
    pub(crate) fn forget(&mut self, id: EntityId) {
        if self.members.remove(&id) {
            self.version += 1;
            tracing::trace!(query = self.id.0, entity = %id, "query member destroyed");
        }
    }
}
