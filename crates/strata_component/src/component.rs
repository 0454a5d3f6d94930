//! The [`Component`] trait and stable type identity.
//!
//! Rust types that want to live in the storage core implement [`Component`].
//! Each implementing type gets a [`TypeKey`] — an FNV-1a 64-bit hash of its
//! string name. Unlike `std::any::TypeId`, the key is stable across builds
//! and processes, so it can be used to pair a Rust type with the component
//! entity that represents it in a world.

use serde::{Deserialize, Serialize};

use crate::type_info::TypeInfo;

/// A stable identifier for a component type, derived from its string name
/// with the FNV-1a 64-bit hash.
///
/// Two types with the same name collide; component names are expected to be
/// unique within a world, the way Rust type paths are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey(pub u64);

impl TypeKey {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the key for a type name.
    ///
    /// Deterministic: the same UTF-8 bytes always hash to the same key, in
    /// any process.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the key for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

/// The contract for Rust types stored as components.
///
/// `Default` supplies the value written when storage default-constructs a
/// new slot; `Send + Sync` because worlds move across job workers under the
/// surrounding scheduler.
///
/// # Examples
///
/// ```rust
/// use strata_component::Component;
///
/// #[derive(Debug, Default, Clone, Copy)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Default + Send + Sync + 'static {
    /// A human-readable, world-unique name for this component type.
    fn type_name() -> &'static str;

    /// Returns the stable [`TypeKey`] for this component type.
    fn type_key() -> TypeKey {
        TypeKey::from_name(Self::type_name())
    }

    /// Returns the [`TypeInfo`] registered for this component type.
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Health {
        current: f32,
        max: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[test]
    fn test_type_key_is_stable() {
        assert_eq!(Health::type_key(), Health::type_key());
        assert_eq!(Health::type_key(), TypeKey::from_name("Health"));
    }

    #[test]
    fn test_type_key_differs_between_names() {
        assert_ne!(TypeKey::from_name("Health"), TypeKey::from_name("Velocity"));
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // FNV-1a 64-bit of the empty string is the offset basis itself.
        assert_eq!(TypeKey::from_name(""), TypeKey(0xcbf2_9ce4_8422_2325));
    }

    #[test]
    fn test_type_info_reflects_type() {
        let info = Health::type_info();
        assert_eq!(info.name(), "Health");
        assert_eq!(info.layout(), std::alloc::Layout::new::<Health>());
        assert!(!info.needs_drop());
    }

    #[test]
    fn test_type_key_serialization_roundtrip() {
        let key = Health::type_key();
        let bytes = rmp_serde::to_vec(&key).unwrap();
        let restored: TypeKey = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(key, restored);
    }
}
