//! Entity identifiers.
//!
//! An [`Entity`] is a lightweight `u64` identifier with no inherent data: the
//! low 32 bits are a slot index, bits 32..48 a generation counter. Indices are
//! recycled when entities are destroyed; the generation is bumped on each
//! reuse so stale handles can be told apart from the slot's current occupant.

use serde::{Deserialize, Serialize};

/// A unique, generational entity identifier.
///
/// Entities are pure identifiers — they carry no data of their own.
/// Components are attached to entities to give them meaning, and an entity id
/// is only meaningful while its generation matches the live one: a stale id
/// (reused index, old generation) is dead and must never alias the slot's new
/// occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u64);

/// Bit width of the generation field.
const GENERATION_BITS: u32 = 16;

/// Mask for the index portion of the packed bits.
const INDEX_MASK: u64 = u32::MAX as u64;

/// Mask for the generation portion of the packed bits.
const GENERATION_MASK: u64 = ((1u64 << GENERATION_BITS) - 1) << 32;

impl Entity {
    /// The null / invalid entity sentinel. Index 0 is never allocated.
    pub const NULL: Entity = Entity(0);

    /// Reserved index that matches any entity in id patterns.
    ///
    /// This is the largest index a pair encoding can hold (28 bits, see
    /// [`crate::Id`]); the entity index never allocates it.
    pub const WILDCARD: Entity = Entity(0x0FFF_FFFF);

    /// Pack an index and generation into an entity id.
    ///
    /// Generations wrap at 16 bits; the bits above the generation field stay
    /// clear so entity ids embed into [`crate::Id`] without touching its flag
    /// region.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self((((generation as u64) << 32) & GENERATION_MASK) | index as u64)
    }

    /// Reconstruct an entity from its packed bits.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the packed `u64` representation.
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Returns the slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// Returns the generation counter.
    #[must_use]
    pub const fn generation(self) -> u32 {
        ((self.0 & GENERATION_MASK) >> 32) as u32
    }

    /// Returns `true` if this is a valid (non-null) entity id.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Returns `true` if this is the reserved wildcard entity.
    #[must_use]
    pub const fn is_wildcard(self) -> bool {
        self.index() == Self::WILDCARD.index()
    }

    /// The generation that follows `generation`, wrapping at the field width.
    #[must_use]
    pub const fn next_generation(generation: u32) -> u32 {
        (generation + 1) & ((1 << GENERATION_BITS) - 1)
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}v{})", self.index(), self.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_packing_roundtrip() {
        let e = Entity::new(42, 7);
        assert_eq!(e.index(), 42);
        assert_eq!(e.generation(), 7);
        assert_eq!(Entity::from_bits(e.to_bits()), e);
    }

    #[test]
    fn test_entity_null() {
        assert!(!Entity::NULL.is_valid());
        assert_eq!(Entity::NULL.index(), 0);
        assert_eq!(Entity::NULL.generation(), 0);
    }

    #[test]
    fn test_generation_changes_identity() {
        let a = Entity::new(5, 0);
        let b = Entity::new(5, 1);
        assert_ne!(a, b);
        assert_eq!(a.index(), b.index());
        // A recycled index with a non-zero generation no longer fits in 32 bits.
        assert!(b.to_bits() > u64::from(u32::MAX));
    }

    #[test]
    fn test_generation_wraps_at_field_width() {
        assert_eq!(Entity::next_generation(0), 1);
        assert_eq!(Entity::next_generation(0xFFFF), 0);
        // Packing masks out anything beyond the field width.
        assert_eq!(Entity::new(1, 0x1_0002).generation(), 2);
    }

    #[test]
    fn test_wildcard_is_reserved() {
        assert!(Entity::WILDCARD.is_wildcard());
        assert!(!Entity::new(3, 0).is_wildcard());
    }

    #[test]
    fn test_display() {
        assert_eq!(Entity::new(9, 2).to_string(), "Entity(9v2)");
    }

    #[test]
    fn test_entity_serialization_roundtrip() {
        let entity = Entity::new(999, 3);
        let bytes = rmp_serde::to_vec(&entity).unwrap();
        let restored: Entity = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(entity, restored);
    }
}
