//! Error types for world mutation, queries, and the component registry.
//!
//! This module declares focused, composable error types used across the
//! entity-component storage pipeline. Each error carries enough context to
//! make failures actionable while remaining small and cheap to pass around
//! or convert into the aggregate [`WorldError`].
//!
//! ## Typical flow
//! Low-level registry operations return [`RegistryError`]. Higher-level
//! world operations use `?` to bubble failures into [`WorldError`], which
//! callers can match on for control flow or log with user-readable
//! messages.
//!
//! ## Display vs. Debug
//! * [`std::fmt::Display`] is optimized for operator logs (short,
//!   imperative phrasing).
//! * `Debug` (derived) retains full structure for diagnostics.

use std::fmt;

use crate::engine::entity::Entity;

/// Errors raised by the global component registry.
///
/// ## Context
/// The registry assigns stable integer identifiers to component types. It
/// can fail when capacity is exhausted or when registration happens after
/// the registry was frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The fixed component id space is exhausted.
    CapacityExceeded {
        /// Maximum number of registrable component types.
        cap: usize,
    },

    /// Registration was attempted after the registry was frozen.
    Frozen,

    /// The registry lock was poisoned by a panic in another thread.
    PoisonedLock,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::CapacityExceeded { cap } => {
                write!(f, "component registry full (capacity {cap})")
            }
            RegistryError::Frozen => f.write_str("component registry is frozen"),
            RegistryError::PoisonedLock => f.write_str("component registry lock poisoned"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Aggregate error for public world operations.
///
/// ### Variants (typical)
/// * `NoEntity` — an operation targeted an id with no live record.
/// * `EntityAlreadyExists` — `spawn_at` collided with a live id.
/// * `InvalidComponent` / `InvalidComponentInstance` — an argument did not
///   resolve to a registered component type.
/// * `Registry(RegistryError)` — component registry failure.
/// * `Internal` — a storage invariant was violated; programmer error.
///
/// ### Usage
/// `From` conversions allow `?` from lower-level operations:
/// ```ignore
/// fn attach(world: &mut World, entity: Entity) -> WorldResult<()> {
///     let bundle = Bundle::new().with(Health { current: 10 })?; // -> InvalidComponentInstance
///     world.insert(entity, bundle)?;                            // -> NoEntity
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// An operation targeted an id not present in the entity table.
    NoEntity {
        /// The missing entity.
        entity: Entity,
    },

    /// `spawn_at` targeted a live id that is not pending deletion.
    EntityAlreadyExists {
        /// The colliding entity.
        entity: Entity,
    },

    /// An argument was not a registered component type.
    InvalidComponent {
        /// Human-readable type name of the offending argument.
        name: &'static str,
    },

    /// A value could not be turned into a component instance because its
    /// type is not a registered component.
    InvalidComponentInstance {
        /// Human-readable type name of the offending value.
        name: &'static str,
    },

    /// A component registry operation failed.
    Registry(RegistryError),

    /// An internal storage invariant was violated.
    ///
    /// This indicates a serious bug in the world itself rather than a
    /// recoverable caller error.
    Internal(String),
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::NoEntity { entity } => {
                write!(f, "{entity} does not exist or has been despawned")
            }
            WorldError::EntityAlreadyExists { entity } => {
                write!(f, "{entity} already exists")
            }
            WorldError::InvalidComponent { name } => {
                write!(f, "not a valid component: {name}")
            }
            WorldError::InvalidComponentInstance { name } => {
                write!(f, "not a valid component instance: {name}")
            }
            WorldError::Registry(e) => write!(f, "{e}"),
            WorldError::Internal(message) => write!(f, "internal invariant violated: {message}"),
        }
    }
}

impl std::error::Error for WorldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorldError::Registry(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for WorldError {
    fn from(e: RegistryError) -> Self {
        WorldError::Registry(e)
    }
}

/// Convenience alias for results of world operations.
pub type WorldResult<T> = Result<T, WorldError>;
