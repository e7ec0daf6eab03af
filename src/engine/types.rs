//! Core identifier types, capacity constants, and component signatures.
//!
//! This module defines the numeric identifiers and bit-level layouts shared
//! across all subsystems: entity ids, component ids, archetype ids, and the
//! fixed-size component bitset ([`Signature`]) used for archetype identity
//! and query matching.
//!
//! ## Design
//!
//! - Entities are plain 64-bit integers starting at 1, allocated
//!   monotonically and never reused implicitly.
//! - Components are identified by compact [`ComponentId`] values assigned at
//!   registration.
//! - Archetypes are described by [`Signature`] bitsets indicating which
//!   components they contain. The signature word array doubles as the
//!   canonical archetype key: two archetypes with equal signatures are the
//!   same archetype.
//!
//! Signatures are fixed-size arrays of `u64`, support fast bitwise subset
//! and intersection tests, and allow efficient iteration over set bits.

/// Globally unique entity identifier. Valid ids start at 1.
pub type EntityId = u64;

/// Unique identifier for a component type.
pub type ComponentId = u16;

/// Unique identifier for an archetype.
pub type ArchetypeId = u16;

/// Row index of an entity within an archetype's columns.
pub type RowIndex = u32;

/// Maximum number of registered component types.
pub const COMPONENT_CAP: usize = 4096;

/// Number of `u64` words required to represent a full component signature.
pub const SIGNATURE_SIZE: usize = (COMPONENT_CAP + 63) / 64;

const _: [(); 1] = [(); (COMPONENT_CAP % 64 == 0) as usize];
const _: [(); 1] = [(); (COMPONENT_CAP <= ComponentId::MAX as usize + 1) as usize];

/// Bitset representing a set of components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Packed component bitset.
    pub components: [u64; SIGNATURE_SIZE],
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            components: [0u64; SIGNATURE_SIZE],
        }
    }
}

impl Signature {
    /// Sets the bit corresponding to `component_id`.
    #[inline]
    pub fn set(&mut self, component_id: ComponentId) {
        let index = (component_id as usize) / 64;
        let bits = (component_id as usize) % 64;
        self.components[index] |= 1u64 << bits;
    }

    /// Clears the bit corresponding to `component_id`.
    #[inline]
    pub fn clear(&mut self, component_id: ComponentId) {
        let index = (component_id as usize) / 64;
        let bits = (component_id as usize) % 64;
        self.components[index] &= !(1u64 << bits);
    }

    /// Returns `true` if `component_id` is present in this signature.
    #[inline]
    pub fn has(&self, component_id: ComponentId) -> bool {
        let index = (component_id as usize) / 64;
        let bits = (component_id as usize) % 64;
        (self.components[index] >> bits) & 1 == 1
    }

    /// Returns `true` if all components in `signature` are present.
    #[inline]
    pub fn contains_all(&self, signature: &Signature) -> bool {
        for (component_a, component_b) in self.components.iter().zip(signature.components.iter()) {
            if (component_a & component_b) != *component_b {
                return false;
            }
        }
        true
    }

    /// Returns `true` if this signature shares any component with `signature`.
    #[inline]
    pub fn intersects(&self, signature: &Signature) -> bool {
        self.components
            .iter()
            .zip(signature.components.iter())
            .any(|(a, b)| (a & b) != 0)
    }

    /// Returns `true` if no component bit is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.iter().all(|&word| word == 0)
    }

    /// Returns the number of set component bits.
    #[inline]
    pub fn count(&self) -> usize {
        self.components
            .iter()
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    /// Iterates over all component IDs set in this signature, ascending.
    pub fn iterate_over_components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                let base = word_index * 64;
                let mut bits = word;
                std::iter::from_fn(move || {
                    if bits == 0 {
                        return None;
                    }
                    let tz = bits.trailing_zeros() as usize;
                    bits &= bits - 1;
                    Some((base + tz) as ComponentId)
                })
            })
    }
}

/// Builds a component signature from a list of component IDs.
pub fn build_signature(component_ids: &[ComponentId]) -> Signature {
    let mut signature = Signature::default();
    for &component_id in component_ids {
        signature.set(component_id);
    }
    signature
}
