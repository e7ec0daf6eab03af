//! Deferred structural mutations.
//!
//! Every destructive world operation is expressed as a [`Command`]. In
//! immediate mode commands apply at the call site; while deferring they are
//! queued FIFO in the [`CommandBuffer`] and applied together at commit,
//! so queries can run against a consistent world between commits.
//!
//! ## Elision
//! Enqueuing a despawn marks its entity for deletion. Every further command
//! addressing a marked entity is dropped at enqueue time, which prevents a
//! pending corpse from being re-animated by a later insert. The marks
//! survive the commit itself; they are cleared per-id when `spawn_at`
//! legitimately reuses the id, and wholesale by `World::clear`.

use std::collections::{HashSet, VecDeque};

use crate::engine::component::Instance;
use crate::engine::entity::Entity;
use crate::engine::types::ComponentId;

/// A single deferred mutation.
#[derive(Debug)]
pub enum Command {
    /// Remove the entity and all of its components.
    Despawn {
        /// Target entity.
        entity: Entity,
    },

    /// Attach or overwrite component instances on the entity.
    Insert {
        /// Target entity.
        entity: Entity,
        /// Instances to attach, applied in order.
        instances: Vec<Instance>,
    },

    /// Detach components from the entity.
    Remove {
        /// Target entity.
        entity: Entity,
        /// Component types to detach; absent ones are ignored.
        components: Vec<ComponentId>,
    },

    /// Replace the entity's entire component set.
    Replace {
        /// Target entity.
        entity: Entity,
        /// The new component set.
        instances: Vec<Instance>,
    },
}

impl Command {
    /// The entity this command addresses.
    pub fn entity(&self) -> Entity {
        match self {
            Command::Despawn { entity }
            | Command::Insert { entity, .. }
            | Command::Remove { entity, .. }
            | Command::Replace { entity, .. } => *entity,
        }
    }
}

/// FIFO queue of deferred commands with despawn elision.
pub struct CommandBuffer {
    deferring: bool,
    commands: VecDeque<Command>,
    marked_for_deletion: HashSet<Entity>,
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    /// Creates an empty buffer in immediate mode.
    pub fn new() -> Self {
        Self {
            deferring: false,
            commands: VecDeque::new(),
            marked_for_deletion: HashSet::new(),
        }
    }

    /// Returns `true` while mutations are being queued instead of applied.
    #[inline]
    pub fn is_deferring(&self) -> bool {
        self.deferring
    }

    /// Switches to deferring mode. Idempotent.
    pub fn start_deferring(&mut self) {
        self.deferring = true;
    }

    /// Switches back to immediate mode. The caller is expected to have
    /// committed queued commands first.
    pub fn stop_deferring(&mut self) {
        self.deferring = false;
    }

    /// Enqueues a command, subject to elision.
    ///
    /// Returns `true` if the command was queued, `false` if it was dropped
    /// because its entity is marked for deletion.
    pub fn push(&mut self, command: Command) -> bool {
        let entity = command.entity();
        if self.marked_for_deletion.contains(&entity) {
            return false;
        }
        if matches!(command, Command::Despawn { .. }) {
            self.marked_for_deletion.insert(entity);
        }
        self.commands.push_back(command);
        true
    }

    /// Dequeues the oldest command.
    pub fn pop(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    /// Returns `true` if a despawn is pending for the entity.
    #[inline]
    pub fn is_marked(&self, entity: Entity) -> bool {
        self.marked_for_deletion.contains(&entity)
    }

    /// Clears the pending-deletion mark for one entity.
    pub fn unmark(&mut self, entity: Entity) {
        self.marked_for_deletion.remove(&entity);
    }

    /// Drops every queued command addressing the entity.
    ///
    /// Used when an id marked for deletion is reused: commands queued
    /// against the old incarnation must not touch the new one.
    pub fn purge_entity(&mut self, entity: Entity) {
        self.commands.retain(|command| command.entity() != entity);
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no command is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drops all queued commands and deletion marks and returns to
    /// immediate mode.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.marked_for_deletion.clear();
        self.deferring = false;
    }
}
