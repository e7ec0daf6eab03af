//! Hook-state contract for change observers.
//!
//! `query_changed` needs one piece of state that outlives any single call:
//! the caller's observer storage. That state is owned by an external
//! hook-state runtime; the world only speaks the [`HookRuntime`] contract,
//! fetching the caller's [`ObserverSlot`] once per invocation.
//!
//! Cleanup is expressed through ownership: when the runtime discards a
//! slot, the storage's strong handle dies and the change tracker prunes the
//! observer on its next emission for that component.
//!
//! [`SystemHooks`] is the reference runtime: one instance per system (or
//! other caller), keying slots by the queried component. Schedulers with
//! richer caller identity (for example topological call-site keys) can
//! implement [`HookRuntime`] themselves.

use std::collections::HashMap;

use crate::engine::changes::SharedObserver;
use crate::engine::types::ComponentId;

/// Per-caller state cell for one `query_changed` observer.
///
/// An empty slot means the caller has not observed this component yet; the
/// world fills it on first use. The slot owns the only strong handle to the
/// observer storage besides in-flight drain iterators.
///
/// The epoch records which world generation initialized the slot: after a
/// `World::clear` the epochs disagree and the world re-initializes the
/// observer instead of draining records from before the reset.
#[derive(Default)]
pub struct ObserverSlot {
    pub(crate) storage: Option<SharedObserver>,
    pub(crate) epoch: u64,
}

impl ObserverSlot {
    /// Returns `true` once the world has attached an observer storage.
    pub fn is_initialized(&self) -> bool {
        self.storage.is_some()
    }
}

/// The hook-state collaborator consumed by `query_changed`.
///
/// `use_hook_state` is called exactly once per `query_changed` invocation.
/// The returned slot must be the same one on every call from the same
/// caller with the same discriminator, and must live until the caller's
/// context ends.
pub trait HookRuntime {
    /// Fetches or creates the caller's slot for `discriminator`.
    fn use_hook_state(&mut self, discriminator: ComponentId) -> &mut ObserverSlot;
}

/// Reference hook-state runtime for a single caller.
///
/// Keys slots by discriminator, which is sufficient when each system owns
/// its own `SystemHooks` and queries any component's changes at most once.
#[derive(Default)]
pub struct SystemHooks {
    slots: HashMap<ComponentId, ObserverSlot>,
}

impl SystemHooks {
    /// Creates a runtime with no slots.
    pub fn new() -> Self {
        Self::default()
    }
}

impl HookRuntime for SystemHooks {
    fn use_hook_state(&mut self, discriminator: ComponentId) -> &mut ObserverSlot {
        self.slots.entry(discriminator).or_default()
    }
}
