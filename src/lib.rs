//! # Weft
//!
//! Archetype-based Entity-Component-System (ECS) world for cooperative,
//! single-threaded simulations.
//!
//! ## Design Goals
//! - Archetype-based columnar storage for cache-efficient iteration
//! - Deferred, elidable structural mutations via a command buffer
//! - Query planning proportional to the rarest queried component
//! - Per-component change tracking for stateful observers
//!
//! ## Model
//! Entities are integer ids associated with heterogeneous typed component
//! instances. Entities sharing an identical component set live together in
//! an archetype; adding or removing a component transitions the entity
//! between archetypes with swap-remove semantics. Queries select
//! archetypes, not entities, and iterate their columns directly.
//!
//! ```ignore
//! use weft::prelude::*;
//!
//! #[derive(Clone)]
//! struct Position { x: f32, y: f32 }
//!
//! register_component::<Position>()?;
//! let mut world = World::new();
//! let entity = world.spawn(Bundle::new().with(Position { x: 0.0, y: 0.0 })?)?;
//!
//! let mut cursor = world.query().with::<Position>().cursor(&world);
//! for (entity, values) in &mut cursor {
//!     let position: &Position = values[0].downcast_ref().unwrap();
//!     // ...
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::world::World;

pub use engine::entity::{Entity, EntityRecord, EntityTable};

pub use engine::component::{
    component_description, component_id_of, freeze_components, register_component, Bundle,
    ComponentDesc, Instance,
};

pub use engine::query::{Cursor, QueryBuilder, Snapshot, View};

pub use engine::changes::{ChangeIter, ChangeRecord};

pub use engine::commands::Command;

pub use engine::hooks::{HookRuntime, ObserverSlot, SystemHooks};

pub use engine::error::{RegistryError, WorldError, WorldResult};

pub use engine::types::{ArchetypeId, ComponentId, EntityId, RowIndex, Signature};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used world types.
///
/// Import with:
/// ```rust
/// use weft::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        component_id_of, freeze_components, register_component, Bundle, Entity, Instance,
        SystemHooks, World, WorldError, WorldResult,
    };
}
