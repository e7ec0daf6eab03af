//! Per-component change tracking for stateful observers.
//!
//! Every committed mutation that touches a component emits a
//! [`ChangeRecord`] into the observer storages registered for that
//! component type. Each observer accumulates at most one record per entity
//! between drains: repeated changes merge so the observer always sees a
//! transitive before/after pair relative to its last drain.
//!
//! ## Storage model
//! The tracker holds weak handles to observer storages; the strong handle
//! lives in the caller's hook-state cell. When a caller's context ends and
//! its cell is dropped, the tracker prunes the dead handle on the next
//! emission for that component and drops the component entry once its
//! observer list empties.
//!
//! Records are immutable and share their instances, so a single record can
//! be handed to any number of observers.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::engine::component::Instance;
use crate::engine::entity::Entity;
use crate::engine::types::ComponentId;

/// An observed transition of one component on one entity.
///
/// `old` is the value the observer last saw (`None` when the component was
/// absent), `new` the current value (`None` when the component was
/// removed). A record whose two sides are the same value is never emitted.
#[derive(Clone, Debug)]
pub struct ChangeRecord {
    /// Value before the change, as of the observer's previous drain.
    pub old: Option<Instance>,

    /// Value after the change.
    pub new: Option<Instance>,
}

impl ChangeRecord {
    /// Returns `true` if the component appeared on the entity.
    pub fn is_addition(&self) -> bool {
        self.old.is_none() && self.new.is_some()
    }

    /// Returns `true` if the component left the entity.
    pub fn is_removal(&self) -> bool {
        self.old.is_some() && self.new.is_none()
    }
}

/// Accumulated records of one observer, keyed by entity.
pub type ObserverStorage = HashMap<Entity, ChangeRecord>;

/// Shared handle to one observer's storage.
pub(crate) type SharedObserver = Arc<Mutex<ObserverStorage>>;

fn same_value(a: &Option<Instance>, b: &Option<Instance>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Instance::same(a, b),
        _ => false,
    }
}

/// Fan-out of change records to per-component observer storages.
pub struct ChangeTracker {
    observers: HashMap<ComponentId, Vec<Weak<Mutex<ObserverStorage>>>>,
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeTracker {
    /// Creates a tracker with no observers.
    pub fn new() -> Self {
        Self {
            observers: HashMap::new(),
        }
    }

    /// Returns `true` if at least one observer is registered for the
    /// component.
    ///
    /// Dead observers count until the next emission prunes them.
    pub fn has_observers(&self, component: ComponentId) -> bool {
        self.observers.contains_key(&component)
    }

    /// Registers an observer storage for a component type.
    pub(crate) fn register(&mut self, component: ComponentId, storage: &SharedObserver) {
        self.observers
            .entry(component)
            .or_default()
            .push(Arc::downgrade(storage));
    }

    /// Records a component transition on an entity.
    ///
    /// ## Behavior
    /// - No observers for the component: no-op.
    /// - `old` and `new` are the same value: no-op.
    /// - Otherwise each live observer merges the record: an existing entry
    ///   keeps its `old` side and takes the incoming `new`; if the merged
    ///   pair collapses to the same value, the entry is dropped (the value
    ///   came back to what the observer last saw).
    ///
    /// Dead observer handles are pruned along the way; a component with no
    /// remaining observers loses its entry entirely.
    pub fn track(
        &mut self,
        component: ComponentId,
        entity: Entity,
        old: Option<Instance>,
        new: Option<Instance>,
    ) {
        let Some(storages) = self.observers.get_mut(&component) else {
            return;
        };
        if same_value(&old, &new) {
            return;
        }

        storages.retain(|weak| {
            let Some(storage) = weak.upgrade() else {
                return false;
            };
            let Ok(mut storage) = storage.lock() else {
                return true;
            };
            match storage.entry(entity) {
                Entry::Occupied(mut occupied) => {
                    let kept_old = occupied.get().old.clone();
                    if same_value(&kept_old, &new) {
                        occupied.remove();
                    } else {
                        occupied.insert(ChangeRecord {
                            old: kept_old,
                            new: new.clone(),
                        });
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(ChangeRecord {
                        old: old.clone(),
                        new: new.clone(),
                    });
                }
            }
            true
        });

        if storages.is_empty() {
            self.observers.remove(&component);
        }
    }

    /// Drops every registered observer storage.
    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

/// Draining iterator over one observer's accumulated records.
///
/// Each step removes one `(entity, record)` entry from the storage; the
/// iteration order is unspecified. Mutations committed while draining feed
/// the same storage and are picked up by later steps.
#[derive(Debug)]
pub struct ChangeIter {
    storage: SharedObserver,
}

impl ChangeIter {
    pub(crate) fn new(storage: SharedObserver) -> Self {
        Self { storage }
    }
}

impl Iterator for ChangeIter {
    type Item = (Entity, ChangeRecord);

    fn next(&mut self) -> Option<Self::Item> {
        let mut storage = self.storage.lock().ok()?;
        let entity = *storage.keys().next()?;
        let record = storage.remove(&entity)?;
        Some((entity, record))
    }
}
