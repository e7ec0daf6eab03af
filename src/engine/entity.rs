//! Entity identity and the entity table.
//!
//! Entities are opaque integer handles referencing a row in some archetype.
//! The [`EntityTable`] owns the id allocator and the `entity -> (archetype,
//! row)` record map.
//!
//! ## Invariants
//! - Valid entity ids start at 1; `next_id` is the smallest id never handed
//!   out by this table.
//! - A freed id is never reallocated implicitly; only an explicit
//!   `spawn_at` may reintroduce it.
//! - For every live entity with record `(archetype, row)`, the archetype's
//!   entity vector holds that entity at `row`. Records are rewritten only
//!   by archetype transitions and despawns.

use std::collections::HashMap;
use std::fmt;

use crate::engine::types::{ArchetypeId, EntityId, RowIndex};

/// Opaque identifier for a live or previously live entity.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Entity(pub EntityId);

impl Entity {
    /// Returns the raw numeric id.
    #[inline]
    pub fn id(self) -> EntityId {
        self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity {}", self.0)
    }
}

/// Physical storage location of an entity within archetype storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    /// Archetype containing the entity.
    pub archetype: ArchetypeId,

    /// Row index within the archetype's columns.
    pub row: RowIndex,
}

/// Entity id allocator and record map.
///
/// ## Purpose
/// Maps every live entity to its archetype location and hands out fresh ids.
/// The table is the single source of truth for liveness: an entity is alive
/// iff it has a record here.
pub struct EntityTable {
    records: HashMap<Entity, EntityRecord>,
    next_id: EntityId,
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTable {
    /// Creates an empty table. The first allocated id is 1.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocates the smallest never-assigned id.
    pub fn allocate(&mut self) -> Entity {
        let entity = Entity(self.next_id);
        self.next_id += 1;
        entity
    }

    /// Bumps the allocator past an explicitly chosen id.
    ///
    /// After `reserve_at(id)`, `allocate` will never hand out an id `<= id`.
    pub fn reserve_at(&mut self, id: EntityId) {
        self.next_id = self.next_id.max(id.saturating_add(1));
    }

    /// Returns the smallest id the allocator has never assigned.
    pub fn next_id(&self) -> EntityId {
        self.next_id
    }

    /// Returns `true` if the entity is live.
    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.records.contains_key(&entity)
    }

    /// Returns the record of a live entity.
    #[inline]
    pub fn record(&self, entity: Entity) -> Option<EntityRecord> {
        self.records.get(&entity).copied()
    }

    /// Registers a record for an entity.
    pub fn insert(&mut self, entity: Entity, record: EntityRecord) {
        self.records.insert(entity, record);
    }

    /// Rewrites the record of a live entity.
    ///
    /// Used during archetype row moves to keep records consistent with
    /// component storage. A dead entity is ignored.
    pub fn set_record(&mut self, entity: Entity, record: EntityRecord) {
        if let Some(slot) = self.records.get_mut(&entity) {
            *slot = record;
        }
    }

    /// Removes an entity, returning its final record.
    pub fn remove(&mut self, entity: Entity) -> Option<EntityRecord> {
        self.records.remove(&entity)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no entity is live.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over all live entities and their records.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, EntityRecord)> + '_ {
        self.records.iter().map(|(&entity, &record)| (entity, record))
    }

    /// Drops every record and resets the id allocator to 1.
    pub fn clear(&mut self) {
        self.records.clear();
        self.next_id = 1;
    }
}
