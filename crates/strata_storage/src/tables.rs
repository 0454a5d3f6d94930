//! The table store.
//!
//! Tables live in a slot-map arena and are addressed two ways: by their id
//! set (one table per distinct sorted id list) and by [`TableHandle`], a
//! generation-checked key. Handles held across a table's destruction go
//! stale instead of dangling: the slot's generation no longer matches, so
//! lookups return `None` and the handle's numeric identity is never reused
//! for a different table.
//!
//! The store always contains the root table — the table of the empty id set,
//! where freshly spawned entities live until their first structural change.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use strata_component::{Id, TypeRegistry};

use crate::column::Column;
use crate::entity_index::EntityIndex;
use crate::id_record::IdRecordStore;
use crate::table::Table;

/// Generation-checked handle to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableHandle {
    index: u32,
    generation: u32,
}

impl TableHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Stable numeric identity for this table, usable as an external cache
    /// key. A reused slot carries a bumped generation, so the bits of a
    /// destroyed table never reappear for a different one.
    #[must_use]
    pub fn to_bits(self) -> u64 {
        (self.generation as u64) << 32 | self.index as u64
    }

    /// Rebuild a handle from [`TableHandle::to_bits`].
    #[must_use]
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }

    fn slot(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table({}v{})", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    table: Option<Table>,
}

/// The arena of all tables in a world.
pub(crate) struct Tables {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_type: HashMap<Box<[Id]>, TableHandle>,
    root: TableHandle,
}

impl Tables {
    pub(crate) fn new() -> Self {
        let mut tables = Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_type: HashMap::new(),
            root: TableHandle::new(0, 0),
        };
        let root = tables.allocate();
        debug_assert_eq!(root, tables.root);
        tables.slots[root.slot()].table =
            Some(Table::new(root, Box::new([]), Box::new([]), Vec::new()));
        tables.by_type.insert(Box::new([]), root);
        tables
    }

    /// The table of the empty id set.
    pub(crate) fn root(&self) -> TableHandle {
        self.root
    }

    /// Number of live tables, the root included.
    pub(crate) fn len(&self) -> usize {
        self.by_type.len()
    }

    pub(crate) fn get(&self, handle: TableHandle) -> Option<&Table> {
        let slot = self.slots.get(handle.slot())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.table.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: TableHandle) -> Option<&mut Table> {
        let slot = self.slots.get_mut(handle.slot())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.table.as_mut()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Table> {
        self.slots.iter().filter_map(|slot| slot.table.as_ref())
    }

    /// The table for exactly `ids`, created on first request.
    ///
    /// `ids` must be sorted and duplicate-free. Creation resolves every id
    /// through the record store (creating records as needed), builds dense
    /// columns for the ids that want them, and registers the new table in
    /// each id's table cache.
    pub(crate) fn find_or_create(
        &mut self,
        ids: &[Id],
        records: &mut IdRecordStore,
        registry: &TypeRegistry,
        entities: &EntityIndex,
    ) -> TableHandle {
        debug_assert!(
            ids.windows(2).all(|pair| pair[0] < pair[1]),
            "table ids must be sorted and duplicate-free"
        );
        if let Some(&handle) = self.by_type.get(ids) {
            return handle;
        }

        let mut column_map = Vec::with_capacity(ids.len());
        let mut columns = Vec::new();
        for &id in ids {
            match records.get_or_create(id, registry, entities).dense_info() {
                Some(info) => {
                    column_map.push(Some(columns.len() as u32));
                    columns.push(Column::new(id, info));
                }
                None => column_map.push(None),
            }
        }

        let handle = self.allocate();
        let table = Table::new(handle, ids.into(), column_map.into_boxed_slice(), columns);
        records.register_table(&table, registry, entities);
        debug!(
            table = %handle,
            ids = ids.len(),
            columns = table.column_count(),
            "table created"
        );
        self.slots[handle.slot()].table = Some(table);
        self.by_type.insert(ids.into(), handle);
        handle
    }

    /// Destroy the table behind `handle`, retiring its slot.
    ///
    /// The caller is responsible for the table being empty and for evicting
    /// it from the id record caches. Returns `None` for a stale handle.
    pub(crate) fn remove(&mut self, handle: TableHandle) -> Option<Table> {
        debug_assert!(handle != self.root, "the root table is permanent");
        let slot = self.slots.get_mut(handle.slot())?;
        if slot.generation != handle.generation {
            return None;
        }
        let table = slot.table.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.by_type.remove(table.ids());
        debug!(table = %handle, "table destroyed");
        Some(table)
    }

    /// Mutable access to two distinct tables at once.
    ///
    /// # Panics
    ///
    /// Panics if the handles are equal or either one is stale.
    pub(crate) fn pair_mut(&mut self, a: TableHandle, b: TableHandle) -> (&mut Table, &mut Table) {
        assert!(a != b, "pair_mut needs two distinct tables");
        let (ai, bi) = (a.slot(), b.slot());
        if ai == bi {
            // Same slot, different generations: one of them is gone.
            panic!("stale table handle {a}");
        }
        let (lo_idx, hi_idx) = if ai < bi { (ai, bi) } else { (bi, ai) };
        let (lo_half, hi_half) = self.slots.split_at_mut(hi_idx);
        let lo = &mut lo_half[lo_idx];
        let hi = &mut hi_half[0];
        let (slot_a, slot_b) = if ai < bi { (lo, hi) } else { (hi, lo) };
        if slot_a.generation != a.generation || slot_b.generation != b.generation {
            panic!("stale table handle");
        }
        match (slot_a.table.as_mut(), slot_b.table.as_mut()) {
            (Some(ta), Some(tb)) => (ta, tb),
            _ => panic!("stale table handle"),
        }
    }

    fn allocate(&mut self) -> TableHandle {
        match self.free.pop() {
            Some(index) => TableHandle::new(index, self.slots[index as usize].generation),
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    table: None,
                });
                TableHandle::new(index, 0)
            }
        }
    }
}

impl std::ops::Index<TableHandle> for Tables {
    type Output = Table;

    fn index(&self, handle: TableHandle) -> &Table {
        match self.get(handle) {
            Some(table) => table,
            None => panic!("stale table handle {handle}"),
        }
    }
}

impl std::ops::IndexMut<TableHandle> for Tables {
    fn index_mut(&mut self, handle: TableHandle) -> &mut Table {
        match self.get_mut(handle) {
            Some(table) => table,
            None => panic!("stale table handle {handle}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use strata_component::{Component, Entity, TypeInfo};

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Mass(f64);

    impl Component for Mass {
        fn type_name() -> &'static str {
            "Mass"
        }
    }

    struct Fixture {
        tables: Tables,
        records: IdRecordStore,
        registry: TypeRegistry,
        entities: EntityIndex,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tables: Tables::new(),
                records: IdRecordStore::new(64),
                registry: TypeRegistry::new(),
                entities: EntityIndex::with_capacity(8),
            }
        }

        fn typed<T: Component>(&mut self) -> Entity {
            let e = self.entities.spawn();
            self.registry
                .register(Id::entity(e), TypeInfo::of::<T>())
                .unwrap();
            e
        }

        fn tag(&mut self) -> Entity {
            self.entities.spawn()
        }

        fn find(&mut self, ids: &[Id]) -> TableHandle {
            self.tables
                .find_or_create(ids, &mut self.records, &self.registry, &self.entities)
        }
    }

    #[test]
    fn test_root_table_is_the_empty_id_set() {
        let fx = Fixture::new();
        let root = fx.tables.root();
        let table = fx.tables.get(root).unwrap();
        assert!(table.ids().is_empty());
        assert!(table.is_empty());
        assert_eq!(fx.tables.len(), 1);
    }

    #[test]
    fn test_find_or_create_reuses_by_id_set() {
        let mut fx = Fixture::new();
        let mass = fx.typed::<Mass>();
        let tag = fx.tag();
        let ids = [Id::entity(mass), Id::entity(tag)];

        let first = fx.find(&ids);
        let second = fx.find(&ids);
        assert_eq!(first, second);
        assert_eq!(first.to_bits(), second.to_bits());

        let other = fx.find(&[Id::entity(mass)]);
        assert_ne!(first, other);
        assert_eq!(fx.tables.len(), 3);
    }

    #[test]
    fn test_columns_follow_id_resolution() {
        let mut fx = Fixture::new();
        let mass = fx.typed::<Mass>();
        let tag = fx.tag();

        let handle = fx.find(&[Id::entity(mass), Id::entity(tag)]);
        let table = fx.tables.get(handle).unwrap();
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.column_of(Id::entity(mass)), Some(0));
        assert_eq!(table.column_of(Id::entity(tag)), None);

        let record = fx.records.get(Id::entity(mass)).unwrap();
        let cached = record.table_record(handle).unwrap();
        assert_eq!(cached.column, Some(0));
        assert_eq!(cached.count, 1);
    }

    #[test]
    fn test_sparse_ids_get_membership_without_columns() {
        let mut fx = Fixture::new();
        let mass = fx.typed::<Mass>();
        fx.records.set_sparse(mass, &fx.registry).unwrap();

        let handle = fx.find(&[Id::entity(mass)]);
        let table = fx.tables.get(handle).unwrap();
        assert!(table.has_id(Id::entity(mass)));
        assert_eq!(table.column_count(), 0);
    }

    #[test]
    fn test_stale_handles_are_detected_after_removal() {
        let mut fx = Fixture::new();
        let tag = fx.tag();
        let old = fx.find(&[Id::entity(tag)]);

        fx.tables.remove(old).unwrap();
        assert!(fx.tables.get(old).is_none());
        assert!(fx.tables.remove(old).is_none());

        // The slot is reused under a new generation; the old handle stays dead.
        let other = fx.tag();
        let new = fx.find(&[Id::entity(other)]);
        assert_ne!(new, old);
        assert_ne!(new.to_bits(), old.to_bits());
        assert!(fx.tables.get(old).is_none());
        assert!(fx.tables.get(new).is_some());
    }

    #[test]
    fn test_handle_bits_roundtrip() {
        let handle = TableHandle::new(7, 3);
        assert_eq!(TableHandle::from_bits(handle.to_bits()), handle);
    }

    #[test]
    fn test_pair_mut_yields_both_tables() {
        let mut fx = Fixture::new();
        let a = fx.tag();
        let b = fx.tag();
        let ha = fx.find(&[Id::entity(a)]);
        let hb = fx.find(&[Id::entity(b)]);

        let (ta, tb) = fx.tables.pair_mut(ha, hb);
        assert_eq!(ta.handle(), ha);
        assert_eq!(tb.handle(), hb);
    }
}
