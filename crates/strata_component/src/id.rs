//! Component identifiers.
//!
//! An [`Id`] is the 64-bit value an entity's component set is made of. It is
//! either a plain component/tag id (the bits of the entity that represents
//! that component type) or an encoded relationship pair. The top byte is a
//! flag region: bit 63 marks a pair, and for pairs the remaining bits hold
//! the relation's entity index (bits 32..60) and the target's entity index
//! (bits 0..32).
//!
//! Sorting ids by their raw bits groups all pairs after all plain ids, and
//! pairs with the same relation next to each other — table id lists rely on
//! this to make relationship scans a contiguous run.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// A component identifier: a plain component/tag id or a relationship pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(u64);

impl Id {
    /// Flag bit marking an id as a relationship pair.
    pub const PAIR_FLAG: u64 = 1 << 63;

    /// The flag region: the top byte of an id.
    pub const FLAGS_MASK: u64 = 0xFF << 60;

    /// Mask selecting everything below the flag region.
    pub const COMPONENT_MASK: u64 = !Self::FLAGS_MASK;

    /// Id that matches any plain id or pair side in [`Id::matches`].
    pub const WILDCARD: Id = Id(Entity::WILDCARD.to_bits());

    /// Largest entity index a pair can encode in its relation position: the
    /// relation sits in bits 32..60, below the flag region.
    pub const MAX_RELATION_INDEX: u32 = 0x0FFF_FFFF;

    /// The plain id for a component or tag entity.
    #[must_use]
    pub const fn entity(entity: Entity) -> Self {
        Self(entity.to_bits())
    }

    /// Encode a relationship pair from a relation and a target entity.
    ///
    /// Only the entity indices survive the encoding; generations are
    /// recovered through the entity index when a pair side is resolved back
    /// to an entity.
    #[must_use]
    pub const fn pair(relation: Entity, target: Entity) -> Self {
        debug_assert!(
            relation.index() <= Self::MAX_RELATION_INDEX,
            "relation index exceeds pair encoding range"
        );
        Self(Self::PAIR_FLAG | ((relation.index() as u64) << 32) | target.index() as u64)
    }

    /// Reconstruct an id from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bit representation.
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Returns `true` if this id encodes a relationship pair.
    #[must_use]
    pub const fn is_pair(self) -> bool {
        self.0 & Self::PAIR_FLAG != 0
    }

    /// Returns `true` if this id contains the wildcard in any position.
    #[must_use]
    pub const fn is_wildcard(self) -> bool {
        if self.is_pair() {
            self.relation_index() == Entity::WILDCARD.index()
                || self.target_index() == Entity::WILDCARD.index()
        } else {
            self.0 == Self::WILDCARD.0
        }
    }

    /// The relation's entity index of a pair id.
    ///
    /// Meaningful only when [`Id::is_pair`] is `true`.
    #[must_use]
    pub const fn relation_index(self) -> u32 {
        ((self.0 & Self::COMPONENT_MASK) >> 32) as u32
    }

    /// The target's entity index of a pair id.
    ///
    /// Meaningful only when [`Id::is_pair`] is `true`.
    #[must_use]
    pub const fn target_index(self) -> u32 {
        (self.0 & u32::MAX as u64) as u32
    }

    /// The id with its flag region cleared.
    #[must_use]
    pub const fn without_flags(self) -> u64 {
        self.0 & Self::COMPONENT_MASK
    }

    /// This pair with its target replaced by the wildcard, i.e. `(R, *)`.
    ///
    /// Meaningful only when [`Id::is_pair`] is `true`.
    #[must_use]
    pub const fn with_wildcard_target(self) -> Id {
        debug_assert!(self.is_pair(), "only pairs have a target position");
        Id(self.0 & !(u32::MAX as u64) | Entity::WILDCARD.index() as u64)
    }

    /// The component/tag entity behind a plain id, or `None` for pairs.
    #[must_use]
    pub const fn as_entity(self) -> Option<Entity> {
        if self.is_pair() {
            None
        } else {
            Some(Entity::from_bits(self.0))
        }
    }

    /// Wildcard-aware comparison of this id against a pattern.
    ///
    /// A plain wildcard pattern matches any id; a pair pattern matches a pair
    /// whose relation and target indices each equal the pattern's or are
    /// wildcarded in the pattern.
    #[must_use]
    pub const fn matches(self, pattern: Id) -> bool {
        if pattern.0 == Self::WILDCARD.0 {
            return true;
        }
        if self.is_pair() != pattern.is_pair() {
            return false;
        }
        if !self.is_pair() {
            return self.0 == pattern.0;
        }
        let relation_ok = pattern.relation_index() == Entity::WILDCARD.index()
            || pattern.relation_index() == self.relation_index();
        let target_ok = pattern.target_index() == Entity::WILDCARD.index()
            || pattern.target_index() == self.target_index();
        relation_ok && target_ok
    }
}

impl From<Entity> for Id {
    fn from(entity: Entity) -> Self {
        Self::entity(entity)
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_pair() {
            write!(f, "Pair({}, {})", self.relation_index(), self.target_index())
        } else {
            write!(f, "Id({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_id_carries_entity_bits() {
        let e = Entity::new(42, 3);
        let id = Id::entity(e);
        assert!(!id.is_pair());
        assert_eq!(id.as_entity(), Some(e));
        assert_eq!(id.to_bits(), e.to_bits());
    }

    #[test]
    fn test_pair_encoding_roundtrip() {
        let likes = Entity::new(10, 0);
        let bob = Entity::new(20, 5);
        let id = Id::pair(likes, bob);
        assert!(id.is_pair());
        assert_eq!(id.relation_index(), 10);
        assert_eq!(id.target_index(), 20);
        assert_eq!(id.as_entity(), None);
    }

    #[test]
    fn test_pair_is_deterministic() {
        let r = Entity::new(7, 1);
        let t = Entity::new(9, 2);
        assert_eq!(Id::pair(r, t), Id::pair(r, t));
        assert_ne!(Id::pair(r, t), Id::pair(t, r));
    }

    #[test]
    fn test_flag_region_layout() {
        let id = Id::pair(Entity::new(1, 0), Entity::new(2, 0));
        assert_eq!(id.to_bits() & Id::FLAGS_MASK, Id::PAIR_FLAG);
        assert_eq!(id.without_flags(), (1 << 32) | 2);
    }

    #[test]
    fn test_plain_ids_sort_before_pairs() {
        let plain = Id::entity(Entity::new(u32::MAX - 1, 0xFFFF));
        let pair = Id::pair(Entity::new(1, 0), Entity::new(1, 0));
        assert!(plain < pair);
    }

    #[test]
    fn test_same_relation_pairs_sort_contiguously() {
        let likes = Entity::new(5, 0);
        let eats = Entity::new(6, 0);
        let mut ids = vec![
            Id::pair(eats, Entity::new(100, 0)),
            Id::pair(likes, Entity::new(200, 0)),
            Id::pair(eats, Entity::new(50, 0)),
            Id::pair(likes, Entity::new(1, 0)),
        ];
        ids.sort();
        let relations: Vec<u32> = ids.iter().map(|id| id.relation_index()).collect();
        assert_eq!(relations, vec![5, 5, 6, 6]);
    }

    #[test]
    fn test_wildcard_target_substitution() {
        let likes = Entity::new(5, 0);
        let bob = Entity::new(8, 2);
        let id = Id::pair(likes, bob).with_wildcard_target();

        assert!(id.is_pair());
        assert!(id.is_wildcard());
        assert_eq!(id.relation_index(), likes.index());
        assert_eq!(id.target_index(), Entity::WILDCARD.index());
        assert_eq!(id, Id::pair(likes, Entity::WILDCARD));
    }

    #[test]
    fn test_wildcard_matches() {
        let likes = Entity::new(5, 0);
        let bob = Entity::new(8, 0);
        let id = Id::pair(likes, bob);

        assert!(id.matches(Id::WILDCARD));
        assert!(id.matches(Id::pair(likes, Entity::WILDCARD)));
        assert!(id.matches(Id::pair(Entity::WILDCARD, bob)));
        assert!(id.matches(Id::pair(Entity::WILDCARD, Entity::WILDCARD)));
        assert!(!id.matches(Id::pair(bob, Entity::WILDCARD)));
        assert!(!id.matches(Id::entity(likes)));

        let plain = Id::entity(bob);
        assert!(plain.matches(Id::WILDCARD));
        assert!(plain.matches(Id::entity(bob)));
        assert!(!plain.matches(Id::pair(Entity::WILDCARD, Entity::WILDCARD)));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let id = Id::pair(Entity::new(3, 0), Entity::new(4, 0));
        let bytes = rmp_serde::to_vec(&id).unwrap();
        let restored: Id = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(id, restored);
    }
}
