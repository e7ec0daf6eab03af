//! Component registry, descriptors, and type-erased instances.
//!
//! This module provides the global registry that assigns stable
//! [`ComponentId`] values to Rust component types, plus the two value types
//! the rest of the world is built from:
//!
//! - [`Instance`] — an immutable, cheaply cloneable component value carrying
//!   a back-reference to its component type,
//! - [`Bundle`] — an ordered collection of instances used by spawn, insert,
//!   and replace operations.
//!
//! ## Design
//! - Components are registered once and assigned a compact `ComponentId` in
//!   `[0, COMPONENT_CAP)` from a monotone counter.
//! - Registration is idempotent; registering the same type twice returns
//!   the existing id.
//! - The registry can be `freeze()`d to lock component identity after world
//!   setup.
//!
//! ## Invariants
//! - `ComponentId` values are unique and stable for the lifetime of the
//!   process.
//! - An `Instance` always refers to a registered component type; its
//!   embedded id is how the core recovers the type of an erased value.
//!
//! ## Concurrency
//! The registry is protected by `RwLock` for concurrent reads and
//! serialized writes. Worlds themselves are single-threaded; the registry
//! is process-global so component identity is shared between worlds.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::mem::{align_of, size_of};
use std::sync::{Arc, OnceLock, RwLock};

use crate::engine::error::{RegistryError, WorldError, WorldResult};
use crate::engine::types::{ComponentId, COMPONENT_CAP};

/// Global mapping between Rust component types and compact `ComponentId`
/// values.
///
/// ## Design
/// - `by_type` maps `TypeId -> ComponentId`.
/// - `by_id` stores `ComponentDesc` indexed by `ComponentId`.
/// - `next_id` assigns new ids sequentially until `COMPONENT_CAP`.
/// - `frozen` prevents further registration once world setup is complete.
pub struct ComponentRegistry {
    next_id: ComponentId,
    by_type: HashMap<TypeId, ComponentId>,
    by_id: Vec<Option<ComponentDesc>>,
    frozen: bool,
}

static REGISTRY: OnceLock<RwLock<ComponentRegistry>> = OnceLock::new();

fn component_registry() -> &'static RwLock<ComponentRegistry> {
    REGISTRY.get_or_init(|| {
        RwLock::new(ComponentRegistry {
            next_id: 0,
            by_type: HashMap::new(),
            by_id: vec![None; COMPONENT_CAP],
            frozen: false,
        })
    })
}

impl ComponentRegistry {
    fn alloc_id(&mut self) -> Result<ComponentId, RegistryError> {
        let component_id = self.next_id;
        if (component_id as usize) >= COMPONENT_CAP {
            return Err(RegistryError::CapacityExceeded { cap: COMPONENT_CAP });
        }
        self.next_id = component_id.wrapping_add(1);
        Ok(component_id)
    }

    /// Freezes the registry, preventing further component registrations.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Returns `true` if the registry has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Registers component type `T` and returns its assigned `ComponentId`.
    ///
    /// ## Behavior
    /// - If `T` is already registered, returns the existing id.
    /// - Otherwise allocates a new id and stores a `ComponentDesc`.
    ///
    /// ## Errors
    /// - `Frozen` if the registry no longer accepts registrations.
    /// - `CapacityExceeded` if the id space is exhausted.
    pub fn register<T: 'static + Send + Sync>(&mut self) -> Result<ComponentId, RegistryError> {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return Ok(existing);
        }

        if self.frozen {
            return Err(RegistryError::Frozen);
        }

        let id = self.alloc_id()?;
        self.by_type.insert(type_id, id);
        self.by_id[id as usize] = Some(ComponentDesc::of::<T>().with_id(id));
        log::debug!("registered component {} as id {}", type_name::<T>(), id);
        Ok(id)
    }

    /// Returns the `ComponentId` associated with a `TypeId`, if registered.
    pub fn component_id_of_type_id(&self, type_id: TypeId) -> Option<ComponentId> {
        self.by_type.get(&type_id).copied()
    }

    /// Returns the component descriptor for a `ComponentId`, if registered.
    pub fn description_by_component_id(&self, component_id: ComponentId) -> Option<&ComponentDesc> {
        self.by_id.get(component_id as usize).and_then(|o| o.as_ref())
    }
}

/// Registers component type `T` in the global registry and returns its
/// `ComponentId`.
///
/// Registration is idempotent. Component ids are assigned in registration
/// order from a monotone counter and remain stable for the process
/// lifetime, across `World::clear` and across multiple worlds.
pub fn register_component<T: 'static + Send + Sync>() -> WorldResult<ComponentId> {
    let mut registry = component_registry()
        .write()
        .map_err(|_| RegistryError::PoisonedLock)?;
    Ok(registry.register::<T>()?)
}

/// Freezes the global component registry.
///
/// After freezing, component identity is locked: further registrations
/// fail with [`RegistryError::Frozen`].
pub fn freeze_components() -> WorldResult<()> {
    let mut registry = component_registry()
        .write()
        .map_err(|_| RegistryError::PoisonedLock)?;
    registry.freeze();
    Ok(())
}

/// Returns the registered `ComponentId` for type `T`.
///
/// ## Errors
/// `InvalidComponent` if `T` was never registered.
pub fn component_id_of<T: 'static>() -> WorldResult<ComponentId> {
    match registered_component_id::<T>() {
        Some(id) => Ok(id),
        None => Err(WorldError::InvalidComponent {
            name: type_name::<T>(),
        }),
    }
}

/// Returns the `ComponentId` for `T` if it is registered, swallowing
/// registry failures.
///
/// Queries treat unknown components as "matches nothing" rather than an
/// error, which is what this lookup exists for.
pub fn registered_component_id<T: 'static>() -> Option<ComponentId> {
    let registry = component_registry().read().ok()?;
    registry.component_id_of_type_id(TypeId::of::<T>())
}

/// Returns a copy of the descriptor for `component_id`, if registered.
pub fn component_description(component_id: ComponentId) -> Option<ComponentDesc> {
    let registry = component_registry().read().ok()?;
    registry.description_by_component_id(component_id).copied()
}

/// Describes a registered component type.
///
/// ## Notes
/// `ComponentDesc` is `Copy` and safe to clone freely for reporting and
/// diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentDesc {
    /// Runtime identifier assigned to this component type.
    pub component_id: ComponentId,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the component.
    pub type_id: TypeId,

    /// Size of the component type in bytes.
    pub size: usize,

    /// Alignment of the component type in bytes.
    pub align: usize,
}

impl ComponentDesc {
    /// Constructs a descriptor for type `T`.
    ///
    /// The returned descriptor uses `component_id = 0` and should be
    /// finalized via `with_id`.
    #[inline]
    pub fn of<T: 'static>() -> Self {
        Self {
            component_id: 0,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
        }
    }

    /// Returns `true` if this descriptor refers to type `T`.
    #[inline]
    pub fn matches_type<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Returns a copy of this descriptor with `component_id` set.
    #[inline]
    pub fn with_id(mut self, component_id: ComponentId) -> Self {
        self.component_id = component_id;
        self
    }
}

impl fmt::Display for ComponentDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ComponentDesc {{ id: {}, name: {}, size: {}, align: {} }}",
            self.component_id, self.name, self.size, self.align
        )
    }
}

/// An immutable, shareable component value.
///
/// ## Purpose
/// `Instance` is the unit stored in archetype columns, carried by commands,
/// and handed to change observers. It pairs a type-erased payload with the
/// `ComponentId` of its component type, so the core can always recover the
/// type of an erased value.
///
/// ## Identity
/// Instances are compared by reference, not by payload: [`Instance::same`]
/// is true only for clones of the same construction. Overwriting a
/// component with a freshly constructed but payload-equal value is
/// therefore an observable change.
///
/// Cloning is cheap (an `Arc` bump); the payload itself is never mutated
/// after construction.
#[derive(Clone)]
pub struct Instance {
    component_id: ComponentId,
    value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    /// Wraps `value` as an instance of its registered component type.
    ///
    /// ## Errors
    /// `InvalidComponentInstance` if `T` was never registered.
    pub fn of<T: 'static + Send + Sync>(value: T) -> WorldResult<Instance> {
        match registered_component_id::<T>() {
            Some(component_id) => Ok(Self {
                component_id,
                value: Arc::new(value),
            }),
            None => Err(WorldError::InvalidComponentInstance {
                name: type_name::<T>(),
            }),
        }
    }

    /// Returns the id of this instance's component type.
    #[inline]
    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    /// Borrows the payload as `T`, if this is an instance of `T`.
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Clones the payload out as `T`, if this is an instance of `T`.
    #[inline]
    pub fn extract<T: 'static + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    /// Returns `true` if both handles refer to the same constructed value.
    #[inline]
    pub fn same(a: &Instance, b: &Instance) -> bool {
        a.component_id == b.component_id && Arc::ptr_eq(&a.value, &b.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match component_description(self.component_id) {
            Some(desc) => write!(f, "Instance<{}>(id {})", desc.name, self.component_id),
            None => write!(f, "Instance(id {})", self.component_id),
        }
    }
}

/// Ordered collection of component instances.
///
/// ## Purpose
/// Groups heterogeneous component values for spawn, insert, and replace
/// operations. Instances are applied in insertion order; two instances of
/// the same component type leave only the later one attached.
#[derive(Default, Debug)]
pub struct Bundle {
    instances: Vec<Instance>,
}

impl Bundle {
    /// Creates an empty bundle.
    #[inline]
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
        }
    }

    /// Appends a value of registered component type `T`.
    ///
    /// ## Errors
    /// `InvalidComponentInstance` if `T` was never registered.
    pub fn with<T: 'static + Send + Sync>(mut self, value: T) -> WorldResult<Self> {
        self.instances.push(Instance::of(value)?);
        Ok(self)
    }

    /// Appends an already-constructed instance.
    #[inline]
    pub fn push(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    /// Returns the contained instances in insertion order.
    #[inline]
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Consumes the bundle, returning its instances.
    #[inline]
    pub fn into_instances(self) -> Vec<Instance> {
        self.instances
    }

    /// Number of instances in the bundle.
    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if the bundle holds no instances.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
