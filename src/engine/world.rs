//! The world façade: public operations and the command dispatcher.
//!
//! A [`World`] is an in-memory database of entities and their typed
//! component instances, stored column-major in archetypes for fast
//! iteration. Public mutations are expressed as commands and either applied
//! at the call site (immediate mode) or queued for the next commit
//! (deferring mode), so queries between commits always observe a
//! consistent world.
//!
//! ## Scheduling model
//! The world is single-threaded and cooperative. No operation is re-entrant
//! from within a query callback; mutations made while a cursor is alive are
//! rejected by the borrow checker. The intended loop is: start deferring,
//! run systems (queries + queued mutations), commit, repeat.
//!
//! ## Change tracking
//! Every committed mutation that touches a component emits a change record
//! to the observers registered for that component type; see
//! [`query_changed`](World::query_changed).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::engine::archetype::Archetypes;
use crate::engine::changes::{ChangeIter, ChangeRecord, ChangeTracker, SharedObserver};
use crate::engine::commands::{Command, CommandBuffer};
use crate::engine::component::{component_id_of, Bundle, Instance};
use crate::engine::entity::{Entity, EntityRecord, EntityTable};
use crate::engine::error::{WorldError, WorldResult};
use crate::engine::hooks::HookRuntime;
use crate::engine::query::QueryBuilder;
use crate::engine::types::{ComponentId, EntityId, RowIndex, Signature};

/// An archetype-based entity-component world.
pub struct World {
    archetypes: Archetypes,
    entities: EntityTable,
    commands: CommandBuffer,
    tracker: ChangeTracker,
    /// Incremented by `clear` so observer slots from before the reset are
    /// re-initialized instead of draining stale records.
    epoch: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty world containing only the root archetype.
    pub fn new() -> Self {
        Self {
            archetypes: Archetypes::new(),
            entities: EntityTable::new(),
            commands: CommandBuffer::new(),
            tracker: ChangeTracker::new(),
            epoch: 0,
        }
    }

    #[inline]
    pub(crate) fn archetypes(&self) -> &Archetypes {
        &self.archetypes
    }

    // ── Entity lifecycle ─────────────────────────────────────────────────

    /// Spawns a new entity with the given components and returns its id.
    ///
    /// The id is allocated and the entity registered with the root
    /// archetype synchronously, even in deferring mode, so the caller can
    /// use the id immediately; only the component attachment itself is
    /// routed through the command buffer.
    pub fn spawn(&mut self, bundle: Bundle) -> WorldResult<Entity> {
        let entity = self.entities.allocate();
        self.register_at_root(entity)?;
        self.route(Command::Insert {
            entity,
            instances: bundle.into_instances(),
        })?;
        Ok(entity)
    }

    /// Spawns an entity with an explicit id.
    ///
    /// Bumps the id allocator past `id` so later `spawn` calls never
    /// collide. A stale pending-deletion mark on the id is cleared. If the
    /// id is live *and* pending deletion, the pending despawn is applied
    /// eagerly (its change records are emitted) and commands queued against
    /// the old incarnation are dropped before the new entity is registered.
    ///
    /// `id` must be at least 1.
    ///
    /// ## Errors
    /// `EntityAlreadyExists` if the id is live and not pending deletion.
    pub fn spawn_at(&mut self, id: EntityId, bundle: Bundle) -> WorldResult<Entity> {
        debug_assert!(id >= 1, "entity ids start at 1");
        let entity = Entity(id);

        if self.entities.contains(entity) {
            if self.commands.is_marked(entity) {
                self.commands.unmark(entity);
                self.commands.purge_entity(entity);
                self.apply_despawn(entity)?;
            } else {
                return Err(WorldError::EntityAlreadyExists { entity });
            }
        } else {
            self.commands.unmark(entity);
        }

        self.entities.reserve_at(id);
        self.register_at_root(entity)?;
        self.route(Command::Insert {
            entity,
            instances: bundle.into_instances(),
        })?;
        Ok(entity)
    }

    /// Despawns an entity, detaching all of its components.
    ///
    /// In deferring mode this marks the id for deletion: every further
    /// queued command addressing it is dropped until the mark is cleared.
    ///
    /// ## Errors
    /// `NoEntity` if the id is not live.
    pub fn despawn(&mut self, entity: Entity) -> WorldResult<()> {
        if !self.entities.contains(entity) {
            return Err(WorldError::NoEntity { entity });
        }
        self.route(Command::Despawn { entity })
    }

    fn register_at_root(&mut self, entity: Entity) -> WorldResult<()> {
        let row = self
            .archetypes
            .get_mut(Archetypes::ROOT)
            .push_row(entity, Vec::new())?;
        self.entities.insert(
            entity,
            EntityRecord {
                archetype: Archetypes::ROOT,
                row,
            },
        );
        Ok(())
    }

    // ── Component mutation ───────────────────────────────────────────────

    /// Attaches the bundle's instances to an entity, overwriting components
    /// it already has.
    ///
    /// ## Errors
    /// `NoEntity` if the id is not live.
    pub fn insert(&mut self, entity: Entity, bundle: Bundle) -> WorldResult<()> {
        if !self.entities.contains(entity) {
            return Err(WorldError::NoEntity { entity });
        }
        self.route(Command::Insert {
            entity,
            instances: bundle.into_instances(),
        })
    }

    /// Detaches components from an entity, returning their current values.
    ///
    /// The returned vector parallels `components`; absent components yield
    /// `None`. The values reflect the world at the call site even though
    /// the detachment itself may be deferred.
    ///
    /// ## Errors
    /// `NoEntity` if the id is not live.
    pub fn remove(
        &mut self,
        entity: Entity,
        components: &[ComponentId],
    ) -> WorldResult<Vec<Option<Instance>>> {
        let record = self
            .entities
            .record(entity)
            .ok_or(WorldError::NoEntity { entity })?;
        let archetype = self.archetypes.get(record.archetype);
        let current: Vec<Option<Instance>> = components
            .iter()
            .map(|&component_id| archetype.get(component_id, record.row).cloned())
            .collect();

        self.route(Command::Remove {
            entity,
            components: components.to_vec(),
        })?;
        Ok(current)
    }

    /// Replaces an entity's entire component set with the bundle.
    ///
    /// Components not in the bundle are detached. Existence is checked when
    /// the command executes, so a deferred replace on a vanished entity
    /// surfaces `NoEntity` from [`commit_commands`](World::commit_commands).
    pub fn replace(&mut self, entity: Entity, bundle: Bundle) -> WorldResult<()> {
        self.route(Command::Replace {
            entity,
            instances: bundle.into_instances(),
        })
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// Returns the entity's instance of a component, or `None` if absent.
    ///
    /// ## Errors
    /// `NoEntity` if the id is not live.
    pub fn get(&self, entity: Entity, component: ComponentId) -> WorldResult<Option<Instance>> {
        let record = self
            .entities
            .record(entity)
            .ok_or(WorldError::NoEntity { entity })?;
        Ok(self
            .archetypes
            .get(record.archetype)
            .get(component, record.row)
            .cloned())
    }

    /// Returns the entity's instances of several components, `None` for
    /// absent ones, in the order requested.
    ///
    /// ## Errors
    /// `NoEntity` if the id is not live.
    pub fn get_many(
        &self,
        entity: Entity,
        components: &[ComponentId],
    ) -> WorldResult<Vec<Option<Instance>>> {
        let record = self
            .entities
            .record(entity)
            .ok_or(WorldError::NoEntity { entity })?;
        let archetype = self.archetypes.get(record.archetype);
        Ok(components
            .iter()
            .map(|&component_id| archetype.get(component_id, record.row).cloned())
            .collect())
    }

    /// Returns the entity's current value of component type `T`, cloned out
    /// of its instance.
    ///
    /// ## Errors
    /// `NoEntity` if the id is not live; `InvalidComponent` if `T` is not
    /// registered.
    pub fn get_value<T: 'static + Clone>(&self, entity: Entity) -> WorldResult<Option<T>> {
        let component = component_id_of::<T>()?;
        Ok(self.get(entity, component)?.and_then(|i| i.extract::<T>()))
    }

    /// Returns every component currently attached to the entity.
    ///
    /// ## Errors
    /// `NoEntity` if the id is not live.
    pub fn get_all(&self, entity: Entity) -> WorldResult<HashMap<ComponentId, Instance>> {
        let record = self
            .entities
            .record(entity)
            .ok_or(WorldError::NoEntity { entity })?;
        let archetype = self.archetypes.get(record.archetype);
        Ok(archetype
            .component_ids()
            .iter()
            .filter_map(|&component_id| {
                archetype
                    .get(component_id, record.row)
                    .cloned()
                    .map(|instance| (component_id, instance))
            })
            .collect())
    }

    /// Returns `true` if the id is live.
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    /// Number of live entities.
    pub fn size(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is live.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The smallest entity id never assigned by this world.
    pub fn next_id(&self) -> EntityId {
        self.entities.next_id()
    }

    /// Iterates over every live entity and its attached components.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, HashMap<ComponentId, Instance>)> + '_ {
        self.entities.iter().map(move |(entity, record)| {
            let archetype = self.archetypes.get(record.archetype);
            let components = archetype
                .component_ids()
                .iter()
                .filter_map(|&component_id| {
                    archetype
                        .get(component_id, record.row)
                        .cloned()
                        .map(|instance| (component_id, instance))
                })
                .collect();
            (entity, components)
        })
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// Starts building a component query.
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Returns a draining iterator over changes to component `T` observed
    /// since this caller's previous drain.
    ///
    /// ## Behavior
    /// The caller's observer state lives in the hook-state runtime. On the
    /// first call (and the first call after [`clear`](World::clear)) the
    /// observer is registered and seeded with `{old: None, new: current}`
    /// for every live entity holding `T`, so existing entities appear as
    /// new. Subsequent calls drain whatever accumulated: for each changed
    /// entity a single record whose `old` side is the value at the previous
    /// drain and whose `new` side is the current value. Intermediate values
    /// collapse, but no change is lost while `old` and `new` differ.
    ///
    /// ## Errors
    /// `InvalidComponent` if `T` is not registered.
    pub fn query_changed<T: 'static>(
        &mut self,
        hooks: &mut impl HookRuntime,
    ) -> WorldResult<ChangeIter> {
        let component_id = component_id_of::<T>()?;
        let slot = hooks.use_hook_state(component_id);

        if slot.storage.is_none() || slot.epoch != self.epoch {
            let storage: SharedObserver = Arc::new(Mutex::new(HashMap::new()));
            self.tracker.register(component_id, &storage);
            {
                let mut seeded = storage
                    .lock()
                    .map_err(|_| WorldError::Internal("observer storage lock poisoned".into()))?;
                if let Some(list) = self.archetypes.with_component(component_id) {
                    for &archetype_id in list {
                        let archetype = self.archetypes.get(archetype_id);
                        for (row, &entity) in archetype.entities().iter().enumerate() {
                            if let Some(value) = archetype.get(component_id, row as RowIndex) {
                                seeded.insert(
                                    entity,
                                    ChangeRecord {
                                        old: None,
                                        new: Some(value.clone()),
                                    },
                                );
                            }
                        }
                    }
                }
            }
            slot.storage = Some(storage);
            slot.epoch = self.epoch;
        }

        let storage = slot
            .storage
            .clone()
            .ok_or_else(|| WorldError::Internal("observer slot not initialized".into()))?;
        Ok(ChangeIter::new(storage))
    }

    // ── Command buffer control ───────────────────────────────────────────

    /// Switches to deferring mode: subsequent mutations queue until the
    /// next commit.
    pub fn start_deferring(&mut self) {
        self.commands.start_deferring();
    }

    /// Returns `true` while mutations are being queued.
    pub fn is_deferring(&self) -> bool {
        self.commands.is_deferring()
    }

    /// Applies every queued command in enqueue order.
    ///
    /// Stays in deferring mode. On error the failing command's effects up
    /// to the failure are kept and the remaining commands stay queued.
    pub fn commit_commands(&mut self) -> WorldResult<()> {
        let queued = self.commands.len();
        if queued > 0 {
            log::trace!("applying {queued} deferred commands");
        }
        while let Some(command) = self.commands.pop() {
            self.apply(command)?;
        }
        Ok(())
    }

    /// Commits queued commands and returns to immediate mode.
    pub fn stop_deferring(&mut self) -> WorldResult<()> {
        self.commit_commands()?;
        self.commands.stop_deferring();
        Ok(())
    }

    // ── Whole-world operations ───────────────────────────────────────────

    /// Resets the world to empty: all entities, queued commands, deletion
    /// marks, and observer registrations are dropped, the archetype set is
    /// rebuilt with a fresh root, and the id allocator restarts at 1.
    ///
    /// Entities removed by `clear` are *not* reported through
    /// `query_changed`; observers created before the reset are re-seeded on
    /// their next call.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.archetypes = Archetypes::new();
        self.commands.clear();
        self.tracker.clear();
        self.epoch += 1;
        log::debug!("world cleared");
    }

    /// Checks internal storage invariants.
    ///
    /// Intended for tests and debugging; a healthy world always passes.
    pub fn validate(&self) -> WorldResult<()> {
        self.archetypes.validate(&self.entities)
    }

    // ── Dispatcher ───────────────────────────────────────────────────────

    fn route(&mut self, command: Command) -> WorldResult<()> {
        if self.commands.is_deferring() {
            self.commands.push(command);
            Ok(())
        } else {
            self.apply(command)
        }
    }

    fn apply(&mut self, command: Command) -> WorldResult<()> {
        match command {
            Command::Insert { entity, instances } => self.apply_insert(entity, instances),
            Command::Remove { entity, components } => self.apply_remove(entity, components),
            Command::Replace { entity, instances } => self.apply_replace(entity, instances),
            Command::Despawn { entity } => self.apply_despawn(entity),
        }
    }

    /// Attaches instances one component at a time, materializing
    /// intermediate archetypes as needed.
    fn apply_insert(&mut self, entity: Entity, instances: Vec<Instance>) -> WorldResult<()> {
        for instance in instances {
            let record = self
                .entities
                .record(entity)
                .ok_or(WorldError::NoEntity { entity })?;
            let component_id = instance.component_id();
            let archetype = self.archetypes.get(record.archetype);

            if archetype.has(component_id) {
                let old = archetype.get(component_id, record.row).cloned();
                self.archetypes.get_mut(record.archetype).set(
                    component_id,
                    record.row,
                    instance.clone(),
                )?;
                self.tracker.track(component_id, entity, old, Some(instance));
            } else {
                let mut signature = *archetype.signature();
                signature.set(component_id);
                let destination = self.archetypes.ensure(&signature)?;
                let (source, target) = self.archetypes.pair_mut(record.archetype, destination);
                source.move_row_to(
                    target,
                    &mut self.entities,
                    entity,
                    record.row,
                    vec![instance.clone()],
                )?;
                self.tracker
                    .track(component_id, entity, None, Some(instance));
            }
        }
        Ok(())
    }

    fn apply_remove(&mut self, entity: Entity, components: Vec<ComponentId>) -> WorldResult<()> {
        let record = self
            .entities
            .record(entity)
            .ok_or(WorldError::NoEntity { entity })?;

        let mut removed: Vec<(ComponentId, Instance)> = Vec::new();
        {
            let archetype = self.archetypes.get(record.archetype);
            let mut seen = HashSet::new();
            for component_id in components {
                if !seen.insert(component_id) {
                    continue;
                }
                if let Some(old) = archetype.get(component_id, record.row) {
                    removed.push((component_id, old.clone()));
                }
            }
        }
        if removed.is_empty() {
            return Ok(());
        }

        for (component_id, old) in &removed {
            self.tracker
                .track(*component_id, entity, Some(old.clone()), None);
        }

        let mut signature = *self.archetypes.get(record.archetype).signature();
        for (component_id, _) in &removed {
            signature.clear(*component_id);
        }
        let destination = self.archetypes.ensure(&signature)?;
        let (source, target) = self.archetypes.pair_mut(record.archetype, destination);
        source.move_row_to(target, &mut self.entities, entity, record.row, Vec::new())?;
        Ok(())
    }

    /// Rebuilds the entity's component set from scratch.
    ///
    /// Every component of the new set is reported as changed; every
    /// component of the old set absent from the new one is reported as
    /// removed. The entity transitions directly to the target archetype.
    fn apply_replace(&mut self, entity: Entity, instances: Vec<Instance>) -> WorldResult<()> {
        let record = self
            .entities
            .record(entity)
            .ok_or(WorldError::NoEntity { entity })?;

        // Two instances of the same component: the later one wins.
        let mut replacement: Vec<Instance> = Vec::with_capacity(instances.len());
        for instance in instances {
            match replacement
                .iter()
                .position(|existing| existing.component_id() == instance.component_id())
            {
                Some(index) => replacement[index] = instance,
                None => replacement.push(instance),
            }
        }

        let mut signature = Signature::default();
        for instance in &replacement {
            signature.set(instance.component_id());
        }

        {
            let archetype = self.archetypes.get(record.archetype);
            for instance in &replacement {
                let component_id = instance.component_id();
                let old = archetype.get(component_id, record.row).cloned();
                self.tracker
                    .track(component_id, entity, old, Some(instance.clone()));
            }
            for &component_id in archetype.component_ids() {
                if !signature.has(component_id) {
                    let old = archetype.get(component_id, record.row).cloned();
                    self.tracker.track(component_id, entity, old, None);
                }
            }
        }

        let source_signature = *self.archetypes.get(record.archetype).signature();
        let destination = self.archetypes.ensure(&signature)?;

        if destination == record.archetype {
            for instance in replacement {
                let component_id = instance.component_id();
                self.archetypes
                    .get_mut(destination)
                    .set(component_id, record.row, instance)?;
            }
            return Ok(());
        }

        let shared: Vec<Instance> = replacement
            .iter()
            .filter(|instance| source_signature.has(instance.component_id()))
            .cloned()
            .collect();
        let added: Vec<Instance> = replacement
            .into_iter()
            .filter(|instance| !source_signature.has(instance.component_id()))
            .collect();

        let (source, target) = self.archetypes.pair_mut(record.archetype, destination);
        let new_row = source.move_row_to(target, &mut self.entities, entity, record.row, added)?;
        for instance in shared {
            let component_id = instance.component_id();
            target.set(component_id, new_row, instance)?;
        }
        Ok(())
    }

    fn apply_despawn(&mut self, entity: Entity) -> WorldResult<()> {
        let record = self
            .entities
            .record(entity)
            .ok_or(WorldError::NoEntity { entity })?;

        {
            let archetype = self.archetypes.get(record.archetype);
            for &component_id in archetype.component_ids() {
                let old = archetype.get(component_id, record.row).cloned();
                self.tracker.track(component_id, entity, old, None);
            }
        }

        self.entities.remove(entity);
        self.archetypes
            .get_mut(record.archetype)
            .swap_remove_row(&mut self.entities, record.row);
        Ok(())
    }
}
