//! The type registry: id-keyed [`TypeInfo`] lookup.
//!
//! One registry per world, keyed by the component id. Registration is
//! idempotent for an identical layout and rejects a conflicting one; the
//! failed call leaves the registry untouched.

use std::collections::HashMap;

use crate::id::Id;
use crate::type_info::TypeInfo;

/// Errors raised by [`TypeRegistry`] operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A component id was re-registered with a different layout.
    #[error(
        "type conflict for {name}: registered with size {existing_size} / align {existing_align}, \
         re-registered with size {new_size} / align {new_align}"
    )]
    TypeConflict {
        /// Name under which the id was first registered.
        name: &'static str,
        /// Previously registered size in bytes.
        existing_size: usize,
        /// Previously registered alignment.
        existing_align: usize,
        /// Conflicting size in bytes.
        new_size: usize,
        /// Conflicting alignment.
        new_align: usize,
    },
}

/// Per-world map from component id to its registered [`TypeInfo`].
#[derive(Debug, Default)]
pub struct TypeRegistry {
    infos: HashMap<Id, TypeInfo>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            infos: HashMap::new(),
        }
    }

    /// Register `info` under `id`.
    ///
    /// Re-registering the same id with an identical layout is a no-op;
    /// a different layout is a [`RegistryError::TypeConflict`] and the
    /// existing registration stays in effect.
    pub fn register(&mut self, id: Id, info: TypeInfo) -> Result<(), RegistryError> {
        if let Some(existing) = self.infos.get(&id) {
            if existing.layout() != info.layout() {
                return Err(RegistryError::TypeConflict {
                    name: existing.name(),
                    existing_size: existing.size(),
                    existing_align: existing.align(),
                    new_size: info.size(),
                    new_align: info.align(),
                });
            }
            return Ok(());
        }
        self.infos.insert(id, info);
        Ok(())
    }

    /// Look up the [`TypeInfo`] registered for `id`.
    ///
    /// `None` means the id carries no data — a tag, not an error.
    #[must_use]
    pub fn lookup(&self, id: Id) -> Option<&TypeInfo> {
        self.infos.get(&id)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::alloc::Layout;

    use super::*;
    use crate::entity::Entity;

    fn id(index: u32) -> Id {
        Id::entity(Entity::new(index, 0))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = TypeRegistry::new();
        let info = TypeInfo::opaque("Position", Layout::new::<[f32; 3]>());
        registry.register(id(1), info).unwrap();

        let found = registry.lookup(id(1)).unwrap();
        assert_eq!(found.name(), "Position");
        assert_eq!(found.size(), 12);
    }

    #[test]
    fn test_lookup_missing_is_none() {
        let registry = TypeRegistry::new();
        assert!(registry.lookup(id(1)).is_none());
    }

    #[test]
    fn test_reregistration_same_layout_is_noop() {
        let mut registry = TypeRegistry::new();
        let info = TypeInfo::opaque("Position", Layout::new::<[f32; 3]>());
        registry.register(id(1), info).unwrap();
        registry.register(id(1), info).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_conflicting_layout_is_rejected() {
        let mut registry = TypeRegistry::new();
        registry
            .register(id(1), TypeInfo::opaque("Position", Layout::new::<[f32; 3]>()))
            .unwrap();

        let err = registry
            .register(id(1), TypeInfo::opaque("Position", Layout::new::<[f64; 3]>()))
            .unwrap_err();
        match err {
            RegistryError::TypeConflict {
                name,
                existing_size,
                new_size,
                ..
            } => {
                assert_eq!(name, "Position");
                assert_eq!(existing_size, 12);
                assert_eq!(new_size, 24);
            }
        }

        // The original registration is still in effect.
        assert_eq!(registry.lookup(id(1)).unwrap().size(), 12);
    }
}
