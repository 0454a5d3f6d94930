//! The entity index: allocation, liveness, and placement.
//!
//! One slot per entity index, holding the live generation and where the
//! entity's data currently is — a (table, row) pair, or nothing for an
//! entity that has no ids yet. Destroyed indices go on a free list and come
//! back with a bumped generation, so a stale handle can never alias the
//! slot's next occupant.
//!
//! Placement is written only by the table-store internals; everything else
//! reads it through [`EntityIndex::locate`].

use strata_component::Entity;

use crate::error::StorageError;
use crate::tables::TableHandle;

/// Where a live entity's data currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// The entity has no ids and belongs to no table.
    None,
    /// The entity occupies `row` of `table`.
    Table { table: TableHandle, row: u32 },
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    alive: bool,
    placement: Placement,
}

/// Allocator and locator for entities.
#[derive(Debug)]
pub(crate) struct EntityIndex {
    slots: Vec<Slot>,
    free: Vec<u32>,
    alive: usize,
}

impl EntityIndex {
    /// Create an index with room for `capacity` entities before regrowth.
    ///
    /// Index 0 is burned so that [`Entity::NULL`] never refers to a slot.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity.saturating_add(1));
        slots.push(Slot {
            generation: 0,
            alive: false,
            placement: Placement::None,
        });
        Self {
            slots,
            free: Vec::new(),
            alive: 0,
        }
    }

    /// Allocate a fresh entity with no placement.
    pub(crate) fn spawn(&mut self) -> Entity {
        self.alive += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            slot.placement = Placement::None;
            return Entity::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        assert!(
            index < Entity::WILDCARD.index(),
            "entity index space exhausted"
        );
        self.slots.push(Slot {
            generation: 0,
            alive: true,
            placement: Placement::None,
        });
        Entity::new(index, 0)
    }

    /// Free `entity`'s slot and bump its generation.
    ///
    /// The caller is responsible for having removed the entity's data first;
    /// this only retires the identifier.
    pub(crate) fn despawn(&mut self, entity: Entity) -> Result<(), StorageError> {
        let slot = self
            .live_slot_mut(entity)
            .ok_or(StorageError::DeadEntity(entity))?;
        slot.alive = false;
        slot.generation = Entity::next_generation(slot.generation);
        slot.placement = Placement::None;
        self.free.push(entity.index());
        self.alive -= 1;
        Ok(())
    }

    /// Returns `true` if `entity`'s generation is the slot's live one.
    pub(crate) fn is_alive(&self, entity: Entity) -> bool {
        self.live_slot(entity).is_some()
    }

    /// The (table, row) placement of a live entity, `None` for dead entities
    /// and for live entities that have no ids yet.
    pub(crate) fn locate(&self, entity: Entity) -> Option<(TableHandle, u32)> {
        match self.live_slot(entity)?.placement {
            Placement::Table { table, row } => Some((table, row)),
            Placement::None => None,
        }
    }

    /// The live entity currently occupying `index`, if any.
    pub(crate) fn current(&self, index: u32) -> Option<Entity> {
        let slot = self.slots.get(index as usize)?;
        slot.alive.then(|| Entity::new(index, slot.generation))
    }

    /// Point a live entity at a table row. Table-store internals only.
    pub(crate) fn set_location(&mut self, entity: Entity, table: TableHandle, row: u32) {
        if let Some(slot) = self.live_slot_mut(entity) {
            slot.placement = Placement::Table { table, row };
        } else {
            debug_assert!(false, "set_location on dead entity");
        }
    }

    /// Number of live entities.
    pub(crate) fn alive_count(&self) -> usize {
        self.alive
    }

    // Slot 0 is never alive, so NULL falls out here without a special case.
    fn live_slot(&self, entity: Entity) -> Option<&Slot> {
        let slot = self.slots.get(entity.index() as usize)?;
        (slot.alive && slot.generation == entity.generation()).then_some(slot)
    }

    fn live_slot_mut(&mut self, entity: Entity) -> Option<&mut Slot> {
        let slot = self.slots.get_mut(entity.index() as usize)?;
        (slot.alive && slot.generation == entity.generation()).then_some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_produces_unique_live_entities() {
        let mut index = EntityIndex::with_capacity(8);
        let a = index.spawn();
        let b = index.spawn();
        assert_ne!(a, b);
        assert!(a.is_valid());
        assert!(index.is_alive(a));
        assert!(index.is_alive(b));
        assert_eq!(index.alive_count(), 2);
    }

    #[test]
    fn test_index_zero_is_never_allocated() {
        let mut index = EntityIndex::with_capacity(0);
        let first = index.spawn();
        assert_eq!(first.index(), 1);
    }

    #[test]
    fn test_despawn_kills_the_handle() {
        let mut index = EntityIndex::with_capacity(8);
        let e = index.spawn();
        index.despawn(e).unwrap();
        assert!(!index.is_alive(e));
        assert!(index.locate(e).is_none());
        assert!(matches!(
            index.despawn(e),
            Err(StorageError::DeadEntity(_))
        ));
    }

    #[test]
    fn test_reuse_bumps_generation() {
        let mut index = EntityIndex::with_capacity(8);
        let a = index.spawn();
        index.despawn(a).unwrap();
        let b = index.spawn();
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        // The recycled id carries a generation, so it no longer fits in 32 bits.
        assert!(b.to_bits() > u64::from(u32::MAX));
        assert!(!index.is_alive(a));
        assert!(index.is_alive(b));
    }

    #[test]
    fn test_placement_roundtrip() {
        let mut index = EntityIndex::with_capacity(8);
        let e = index.spawn();
        assert!(index.locate(e).is_none());

        let table = TableHandle::new(3, 0);
        index.set_location(e, table, 7);
        assert_eq!(index.locate(e), Some((table, 7)));

        // Despawn detaches placement along with liveness.
        index.despawn(e).unwrap();
        assert!(index.locate(e).is_none());
    }

    #[test]
    fn test_current_resolves_live_occupant() {
        let mut index = EntityIndex::with_capacity(8);
        let a = index.spawn();
        assert_eq!(index.current(a.index()), Some(a));

        index.despawn(a).unwrap();
        assert_eq!(index.current(a.index()), None);

        let b = index.spawn();
        assert_eq!(index.current(a.index()), Some(b));
    }
}
