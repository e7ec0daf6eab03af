//! Archetype storage and the canonical archetype index.
//!
//! An [`Archetype`] owns columnar storage for the set of entities whose
//! component set is exactly some signature. [`Archetypes`] canonicalizes
//! archetypes by signature and maintains the per-component reverse index
//! used by query planning.
//!
//! ## Design
//! - Component data is stored column-major: one [`Column`] per component
//!   type, all densely packed and row-aligned with the entity vector.
//! - Entities are removed with swap-remove semantics, so removal is O(number
//!   of columns) regardless of row position.
//! - Archetypes are canonical: at most one archetype exists per component
//!   set, keyed by its signature word array. Canonical identity makes the
//!   transition target an O(1) lookup.
//!
//! ## Invariants
//! - All columns of an archetype have identical length, equal to the length
//!   of its entity vector.
//! - For every entity with record `(A, r)`, `A.entities[r]` is that entity.
//! - The per-component archetype index is append-only: archetypes are never
//!   destroyed while a world lives.

use std::collections::HashMap;

use crate::engine::component::Instance;
use crate::engine::entity::{Entity, EntityRecord, EntityTable};
use crate::engine::error::{WorldError, WorldResult};
use crate::engine::storage::Column;
use crate::engine::types::{ArchetypeId, ComponentId, RowIndex, Signature, SIGNATURE_SIZE};

/// Stores entities that share an identical component signature.
pub struct Archetype {
    archetype_id: ArchetypeId,
    signature: Signature,
    /// Component ids in ascending order; position is the column index.
    component_ids: Vec<ComponentId>,
    id_to_col: HashMap<ComponentId, usize>,
    entities: Vec<Entity>,
    columns: Vec<Column>,
}

impl Archetype {
    /// Creates an empty archetype for `signature`, one column per set
    /// component id.
    fn new(archetype_id: ArchetypeId, signature: Signature) -> Self {
        let component_ids: Vec<ComponentId> = signature.iterate_over_components().collect();
        let id_to_col = component_ids
            .iter()
            .enumerate()
            .map(|(col, &cid)| (cid, col))
            .collect();
        let columns = component_ids.iter().map(|_| Column::new()).collect();

        Self {
            archetype_id,
            signature,
            component_ids,
            id_to_col,
            entities: Vec::new(),
            columns,
        }
    }

    /// Returns the `ArchetypeId` associated with this archetype.
    #[inline]
    pub fn archetype_id(&self) -> ArchetypeId {
        self.archetype_id
    }

    /// Returns a reference to the archetype's signature.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Component ids stored by this archetype, ascending.
    #[inline]
    pub fn component_ids(&self) -> &[ComponentId] {
        &self.component_ids
    }

    /// Returns the number of entities stored in the archetype.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the archetype stores no entities.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns `true` if the archetype stores the given component.
    #[inline]
    pub fn has(&self, component_id: ComponentId) -> bool {
        self.signature.has(component_id)
    }

    /// Returns the column index of a component, if stored here.
    #[inline]
    pub fn column_of(&self, component_id: ComponentId) -> Option<usize> {
        self.id_to_col.get(&component_id).copied()
    }

    /// Entities in storage order.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Borrows a column's values as a dense row-indexed slice.
    #[inline]
    pub fn column_values(&self, column: usize) -> &[Instance] {
        self.columns[column].as_slice()
    }

    /// Returns the instance of `component_id` stored for the entity at
    /// `row`.
    pub fn get(&self, component_id: ComponentId, row: RowIndex) -> Option<&Instance> {
        let column = self.column_of(component_id)?;
        self.columns[column].get(row as usize)
    }

    /// Overwrites the instance of `component_id` at `row` in place.
    pub fn set(&mut self, component_id: ComponentId, row: RowIndex, instance: Instance) -> WorldResult<()> {
        let Some(column) = self.column_of(component_id) else {
            return Err(WorldError::Internal(
                "overwrite targeted a component the archetype does not store".into(),
            ));
        };
        if !self.columns[column].set(row as usize, instance) {
            return Err(WorldError::Internal(
                "overwrite targeted a row past the end of the column".into(),
            ));
        }
        Ok(())
    }

    /// Appends a full row for `entity`, with `values` matching the column
    /// order exactly.
    ///
    /// Used to register freshly spawned entities with the root archetype,
    /// where `values` is empty.
    pub fn push_row(&mut self, entity: Entity, values: Vec<Instance>) -> WorldResult<RowIndex> {
        if values.len() != self.columns.len() {
            return Err(WorldError::Internal(
                "row value count does not match archetype column count".into(),
            ));
        }
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.push(value);
        }
        let row = self.entities.len();
        self.entities.push(entity);
        Ok(row as RowIndex)
    }

    /// Removes the row at `row` from every column and the entity vector,
    /// fixing up the record of whichever entity was swapped into its place.
    ///
    /// The departing entity's own record is left to the caller.
    pub fn swap_remove_row(&mut self, table: &mut EntityTable, row: RowIndex) {
        let row = row as usize;
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        self.entities.swap_remove(row);

        if row < self.entities.len() {
            let swapped = self.entities[row];
            table.set_record(
                swapped,
                EntityRecord {
                    archetype: self.archetype_id,
                    row: row as RowIndex,
                },
            );
        }
    }

    /// Moves an entity's component row from this archetype to another.
    ///
    /// ## Purpose
    /// This is the core operation used when components are added to or
    /// removed from an entity: the destination row is built to exactly
    /// match the destination signature.
    ///
    /// ## Behavior
    /// The move is performed in three ordered phases:
    ///
    /// 1. **Shared transfer** — each component present in both archetypes is
    ///    copied from `(self, row)` to the end of its destination column.
    /// 2. **Destination-only insertion** — values supplied in `added` are
    ///    appended to their destination columns. Together with phase 1 they
    ///    must cover every destination column, or the move fails without a
    ///    row having been published.
    /// 3. **Source removal** — the source row is swap-removed from every
    ///    source column and the entity vector; the entity relocated by the
    ///    swap has its record corrected.
    ///
    /// Components present only in the source are dropped with the source
    /// row. On success the moved entity's record points at the destination
    /// row.
    ///
    /// ## Errors
    /// `Internal` if an `added` value has no destination column or if the
    /// destination columns end up misaligned; both indicate a dispatcher
    /// bug, and the destination is not modified observably in the first
    /// case.
    pub fn move_row_to(
        &mut self,
        destination: &mut Archetype,
        table: &mut EntityTable,
        entity: Entity,
        row: RowIndex,
        added: Vec<Instance>,
    ) -> WorldResult<RowIndex> {
        let source_row = row as usize;
        let new_row = destination.entities.len();

        if let Some(cid) = added
            .iter()
            .map(Instance::component_id)
            .find(|&cid| destination.column_of(cid).is_none())
        {
            let name = crate::engine::component::component_description(cid)
                .map(|d| d.name)
                .unwrap_or("?");
            return Err(WorldError::Internal(format!(
                "added value for component {cid} ({name}) has no destination column"
            )));
        }

        for (column, &cid) in self.columns.iter().zip(self.component_ids.iter()) {
            if let Some(destination_column) = destination.column_of(cid) {
                let value = column.get(source_row).cloned().ok_or_else(|| {
                    WorldError::Internal("source row missing during transition".into())
                })?;
                destination.columns[destination_column].push(value);
            }
        }

        for instance in added {
            // Presence was checked above; a stale index here is a bug.
            let destination_column = destination
                .column_of(instance.component_id())
                .ok_or_else(|| WorldError::Internal("destination column vanished".into()))?;
            destination.columns[destination_column].push(instance);
        }

        for column in &destination.columns {
            if column.len() != new_row + 1 {
                return Err(WorldError::Internal(
                    "destination columns misaligned after transition".into(),
                ));
            }
        }
        destination.entities.push(entity);

        for column in &mut self.columns {
            column.swap_remove(source_row);
        }
        self.entities.swap_remove(source_row);
        if source_row < self.entities.len() {
            let swapped = self.entities[source_row];
            table.set_record(
                swapped,
                EntityRecord {
                    archetype: self.archetype_id,
                    row: source_row as RowIndex,
                },
            );
        }

        table.set_record(
            entity,
            EntityRecord {
                archetype: destination.archetype_id,
                row: new_row as RowIndex,
            },
        );

        Ok(new_row as RowIndex)
    }
}

/// Canonical set of all archetypes in a world.
///
/// ## Purpose
/// Owns archetype storage, guarantees at most one archetype per component
/// signature, and maintains the `component -> archetypes` reverse index
/// that query planning runs on.
pub struct Archetypes {
    archetypes: Vec<Archetype>,
    signature_map: HashMap<[u64; SIGNATURE_SIZE], ArchetypeId>,
    component_index: HashMap<ComponentId, Vec<ArchetypeId>>,
}

impl Archetypes {
    /// Identifier of the root archetype (the empty component set).
    pub const ROOT: ArchetypeId = 0;

    /// Creates the archetype set with only the root archetype.
    pub fn new() -> Self {
        let mut archetypes = Self {
            archetypes: Vec::new(),
            signature_map: HashMap::new(),
            component_index: HashMap::new(),
        };
        // The root is always archetype 0; ensure() on the empty signature
        // cannot fail with an empty archetype vector.
        let _ = archetypes.ensure(&Signature::default());
        archetypes
    }

    /// Returns the canonical archetype for `signature`, creating and
    /// indexing it on first use.
    pub fn ensure(&mut self, signature: &Signature) -> WorldResult<ArchetypeId> {
        if let Some(&id) = self.signature_map.get(&signature.components) {
            return Ok(id);
        }

        let next = self.archetypes.len();
        if next > ArchetypeId::MAX as usize {
            return Err(WorldError::Internal("archetype id space exhausted".into()));
        }
        let id = next as ArchetypeId;

        self.signature_map.insert(signature.components, id);
        for component_id in signature.iterate_over_components() {
            self.component_index.entry(component_id).or_default().push(id);
        }
        self.archetypes.push(Archetype::new(id, *signature));
        log::trace!(
            "created archetype {} for {} components",
            id,
            signature.count()
        );
        Ok(id)
    }

    /// Borrows an archetype by id.
    #[inline]
    pub fn get(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id as usize]
    }

    /// Mutably borrows an archetype by id.
    #[inline]
    pub fn get_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id as usize]
    }

    /// Mutably borrows two distinct archetypes at once.
    ///
    /// ## Panics
    /// Panics if `archetype_a == archetype_b`.
    #[inline]
    pub fn pair_mut(
        &mut self,
        archetype_a: ArchetypeId,
        archetype_b: ArchetypeId,
    ) -> (&mut Archetype, &mut Archetype) {
        assert!(
            archetype_a != archetype_b,
            "source and destination archetype must differ"
        );
        let (left, right) = if archetype_a < archetype_b {
            (archetype_a, archetype_b)
        } else {
            (archetype_b, archetype_a)
        };

        let (head, tail) = self.archetypes.split_at_mut(right as usize);
        let left_reference = &mut head[left as usize];
        let right_reference = &mut tail[0];
        if archetype_a < archetype_b {
            (left_reference, right_reference)
        } else {
            (right_reference, left_reference)
        }
    }

    /// Archetypes containing `component_id`, in creation order.
    ///
    /// Returns `None` when no archetype has ever stored the component.
    #[inline]
    pub fn with_component(&self, component_id: ComponentId) -> Option<&[ArchetypeId]> {
        self.component_index.get(&component_id).map(Vec::as_slice)
    }

    /// Number of archetypes, including the root.
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Returns `true` if only the root archetype exists and it is empty.
    pub fn is_empty(&self) -> bool {
        self.archetypes.len() == 1 && self.archetypes[0].is_empty()
    }

    /// Iterates over all archetypes.
    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    /// Checks storage invariants against an entity table.
    ///
    /// Intended for tests and debugging: verifies row alignment between
    /// columns and entity vectors, record agreement in both directions, and
    /// archetype canonicality.
    pub fn validate(&self, table: &EntityTable) -> WorldResult<()> {
        if self.signature_map.len() != self.archetypes.len() {
            return Err(WorldError::Internal(
                "signature map and archetype list disagree".into(),
            ));
        }

        for archetype in &self.archetypes {
            for (&cid, column) in archetype.component_ids.iter().zip(archetype.columns.iter()) {
                if column.len() != archetype.entities.len() {
                    return Err(WorldError::Internal(format!(
                        "column for component {cid} misaligned in archetype {}",
                        archetype.archetype_id
                    )));
                }
            }
            for (row, &entity) in archetype.entities.iter().enumerate() {
                let record = table.record(entity).ok_or_else(|| {
                    WorldError::Internal(format!("{entity} stored but not in entity table"))
                })?;
                if record.archetype != archetype.archetype_id || record.row as usize != row {
                    return Err(WorldError::Internal(format!(
                        "record for {entity} disagrees with storage"
                    )));
                }
            }
        }

        for (entity, record) in table.iter() {
            let archetype = self
                .archetypes
                .get(record.archetype as usize)
                .ok_or_else(|| WorldError::Internal(format!("{entity} records a dead archetype")))?;
            if archetype.entities.get(record.row as usize) != Some(&entity) {
                return Err(WorldError::Internal(format!(
                    "{entity} not stored at its recorded row"
                )));
            }
        }

        Ok(())
    }
}

impl Default for Archetypes {
    fn default() -> Self {
        Self::new()
    }
}
