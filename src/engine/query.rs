//! Query construction and cursored, columnar iteration.
//!
//! A query names a set of component types; its result is every live entity
//! whose component set contains all of them. Planning starts from the
//! per-component archetype index: the candidate list is the shortest index
//! entry among the queried components, narrowed to archetypes whose
//! signature covers the whole query. Work is therefore proportional to the
//! rarest component's archetype list, not the global archetype count.
//!
//! ## Execution model
//! [`Cursor`] walks the compatible archetypes one row at a time, caching
//! the current archetype's column slices between rows. Iteration order
//! across archetypes is unspecified; within an archetype rows are visited
//! in storage order.
//!
//! A cursor borrows the world immutably, so structural mutation while
//! iterating is rejected by the borrow checker; drain into a [`Snapshot`]
//! or [`View`] first when the loop body needs to mutate, or defer the
//! mutations through the command buffer.
//!
//! Queries never fail: an unregistered or never-attached component simply
//! yields an empty cursor.

use std::collections::HashMap;

use crate::engine::archetype::Archetypes;
use crate::engine::component::{registered_component_id, Instance};
use crate::engine::entity::Entity;
use crate::engine::types::{build_signature, ArchetypeId, ComponentId};
use crate::engine::world::World;

/// Incrementally constructed component query.
///
/// ## Example
/// ```ignore
/// let mut cursor = world.query().with::<Position>().with::<Velocity>().cursor(&world);
/// while let Some((entity, values)) = cursor.next() {
///     let position: &Position = values[0].downcast_ref().unwrap();
///     // ...
/// }
/// ```
#[derive(Default)]
pub struct QueryBuilder {
    ids: Vec<ComponentId>,
    excluded: Vec<ComponentId>,
    dead: bool,
}

impl QueryBuilder {
    /// Creates an empty query. A query with no components yields nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires component `T` on every yielded entity.
    ///
    /// An unregistered `T` makes the whole query yield nothing.
    pub fn with<T: 'static>(mut self) -> Self {
        match registered_component_id::<T>() {
            Some(id) => self.ids.push(id),
            None => self.dead = true,
        }
        self
    }

    /// Excludes entities holding component `T`.
    ///
    /// An unregistered `T` excludes nothing.
    pub fn without<T: 'static>(mut self) -> Self {
        if let Some(id) = registered_component_id::<T>() {
            self.excluded.push(id);
        }
        self
    }

    /// Resolves the query against a world and returns a cursor over the
    /// matching archetypes.
    pub fn cursor<'w>(&self, world: &'w World) -> Cursor<'w> {
        let mut compatible = if self.dead {
            Vec::new()
        } else {
            plan(world.archetypes(), &self.ids)
        };
        for &excluded in &self.excluded {
            discard_with_component(world.archetypes(), &mut compatible, excluded);
        }
        Cursor {
            world,
            ids: self.ids.clone(),
            compatible,
            position: 0,
            row: 0,
            cached: None,
        }
    }
}

/// Selects the archetypes compatible with the queried component set.
fn plan(archetypes: &Archetypes, ids: &[ComponentId]) -> Vec<ArchetypeId> {
    if ids.is_empty() {
        return Vec::new();
    }

    let mut candidates: Option<&[ArchetypeId]> = None;
    for &component_id in ids {
        match archetypes.with_component(component_id) {
            None => return Vec::new(),
            Some(list) => {
                if candidates.map_or(true, |best| list.len() < best.len()) {
                    candidates = Some(list);
                }
            }
        }
    }
    let Some(candidates) = candidates else {
        return Vec::new();
    };

    let need = build_signature(ids);
    candidates
        .iter()
        .copied()
        .filter(|&id| archetypes.get(id).signature().contains_all(&need))
        .collect()
}

/// Swap-removes every archetype containing `excluded` from `compatible`.
fn discard_with_component(
    archetypes: &Archetypes,
    compatible: &mut Vec<ArchetypeId>,
    excluded: ComponentId,
) {
    let mut index = 0;
    while index < compatible.len() {
        if archetypes.get(compatible[index]).has(excluded) {
            compatible.swap_remove(index);
        } else {
            index += 1;
        }
    }
}

struct CachedArchetype<'w> {
    entities: &'w [Entity],
    columns: Vec<&'w [Instance]>,
}

/// Stateful iterator over the entities matching a query.
///
/// Yields `(entity, values)` pairs with `values` in query declaration
/// order. Values are cheap shared handles into the archetype columns.
pub struct Cursor<'w> {
    world: &'w World,
    ids: Vec<ComponentId>,
    compatible: Vec<ArchetypeId>,
    position: usize,
    row: usize,
    cached: Option<CachedArchetype<'w>>,
}

impl<'w> Cursor<'w> {
    /// Removes every compatible archetype containing component `D`.
    ///
    /// The relative order of the remaining archetypes is not preserved.
    /// Intended to be called before iteration starts; calling it later
    /// restarts the cursor.
    pub fn without<D: 'static>(mut self) -> Self {
        if let Some(excluded) = registered_component_id::<D>() {
            discard_with_component(self.world.archetypes(), &mut self.compatible, excluded);
            self.position = 0;
            self.row = 0;
            self.cached = None;
        }
        self
    }

    /// Number of component types this cursor reads per entity.
    pub fn width(&self) -> usize {
        self.ids.len()
    }

    /// Drains the cursor into an owned, iterable snapshot.
    ///
    /// Later world mutations do not affect the snapshot.
    pub fn snapshot(self) -> Snapshot {
        Snapshot {
            rows: self.collect(),
        }
    }

    /// Drains the cursor into an entity-keyed view for random access.
    pub fn view(self) -> View {
        let mut rows = HashMap::new();
        for (entity, values) in self {
            rows.insert(entity, values);
        }
        View { rows }
    }

    fn cache_archetype(&mut self) -> Option<()> {
        loop {
            let archetype_id = *self.compatible.get(self.position)?;
            let archetype = self.world.archetypes().get(archetype_id);
            if archetype.is_empty() {
                self.position += 1;
                continue;
            }
            let columns: Option<Vec<&'w [Instance]>> = self
                .ids
                .iter()
                .map(|&cid| archetype.column_of(cid).map(|col| archetype.column_values(col)))
                .collect();
            // A compatible archetype stores every queried component; a miss
            // here means the plan is stale, so the archetype is skipped.
            let Some(columns) = columns else {
                self.position += 1;
                continue;
            };
            self.cached = Some(CachedArchetype {
                entities: archetype.entities(),
                columns,
            });
            self.row = 0;
            return Some(());
        }
    }
}

impl<'w> Iterator for Cursor<'w> {
    type Item = (Entity, Vec<Instance>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cached.is_none() {
                self.cache_archetype()?;
            }
            let cached = self.cached.as_ref()?;
            if self.row >= cached.entities.len() {
                self.position += 1;
                self.cached = None;
                continue;
            }

            let entity = cached.entities[self.row];
            let values = cached
                .columns
                .iter()
                .map(|column| column[self.row].clone())
                .collect();
            self.row += 1;
            return Some((entity, values));
        }
    }
}

/// Owned result of draining a cursor.
///
/// Iterates in the same `(entity, values)` shape as the cursor, isolated
/// from any world mutation that happens after the drain.
pub struct Snapshot {
    rows: Vec<(Entity, Vec<Instance>)>,
}

impl Snapshot {
    /// Number of captured rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if nothing matched the query.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates over the captured rows.
    pub fn iter(&self) -> impl Iterator<Item = &(Entity, Vec<Instance>)> {
        self.rows.iter()
    }
}

impl IntoIterator for Snapshot {
    type Item = (Entity, Vec<Instance>);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Materialized, entity-keyed result of draining a cursor.
///
/// The right structure for repeated random access by entity id.
pub struct View {
    rows: HashMap<Entity, Vec<Instance>>,
}

impl View {
    /// Returns the captured values for an entity, in query order.
    pub fn get(&self, entity: Entity) -> Option<&[Instance]> {
        self.rows.get(&entity).map(Vec::as_slice)
    }

    /// Returns `true` if the entity matched the query.
    pub fn contains(&self, entity: Entity) -> bool {
        self.rows.contains_key(&entity)
    }

    /// Number of captured entities.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if nothing matched the query.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates over `(entity, values)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &[Instance])> {
        self.rows
            .iter()
            .map(|(&entity, values)| (entity, values.as_slice()))
    }
}
