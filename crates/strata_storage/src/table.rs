//! Dense tables.
//!
//! A [`Table`] stores every entity that has exactly one id set: a sorted,
//! duplicate-free list of [`Id`]s. Type-carrying, densely stored ids each get
//! a [`Column`]; tags and sparse ids participate in the id list only. A
//! parallel entity array maps each row back to its entity.
//!
//! Rows are removed by swap-remove, so removal reports which entity got
//! relocated into the vacated row; the caller patches that entity's record.
//!
//! Because the id list is sorted by raw bits, all pairs sit behind all plain
//! ids and pairs sharing a relation form one contiguous run, which makes
//! relationship queries two binary searches.

use std::ops::Range;

use strata_component::{Entity, Id};

use crate::column::Column;
use crate::error::StorageError;
use crate::tables::TableHandle;

/// One dense table: a unique id set and the rows of entities that carry it.
pub struct Table {
    handle: TableHandle,
    ids: Box<[Id]>,
    /// Per id-list position, the index into `columns`, or `None` for ids
    /// without dense storage (tags, sparse ids, typeless pairs).
    column_map: Box<[Option<u32>]>,
    columns: Vec<Column>,
    entities: Vec<Entity>,
}

impl Table {
    pub(crate) fn new(
        handle: TableHandle,
        ids: Box<[Id]>,
        column_map: Box<[Option<u32>]>,
        columns: Vec<Column>,
    ) -> Self {
        debug_assert!(
            ids.windows(2).all(|pair| pair[0] < pair[1]),
            "table ids must be sorted and duplicate-free"
        );
        debug_assert_eq!(ids.len(), column_map.len());
        Self {
            handle,
            ids,
            column_map,
            columns,
            entities: Vec::new(),
        }
    }

    /// This table's handle in the table store.
    #[must_use]
    pub fn handle(&self) -> TableHandle {
        self.handle
    }

    /// The sorted id list that defines this table.
    #[must_use]
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The entities stored here, row by row.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// The entity occupying `row`.
    #[must_use]
    pub fn entity_at(&self, row: u32) -> Entity {
        self.entities[row as usize]
    }

    /// Returns `true` if `id` is part of this table's id list.
    #[must_use]
    pub fn has_id(&self, id: Id) -> bool {
        self.type_index_of(id).is_some()
    }

    /// Position of `id` in the sorted id list.
    #[must_use]
    pub fn type_index_of(&self, id: Id) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    /// Index of the dense column storing `id`'s values.
    ///
    /// `None` when the id is absent or has no dense storage here.
    #[must_use]
    pub fn column_of(&self, id: Id) -> Option<usize> {
        self.column_map[self.type_index_of(id)?].map(|column| column as usize)
    }

    /// Number of dense columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of pairs in this table whose relation is `relation`.
    ///
    /// A wildcard relation counts every pair.
    #[must_use]
    pub fn pair_count(&self, relation: Entity) -> usize {
        self.pair_run(relation).len()
    }

    /// The id-list positions holding pairs with `relation`.
    ///
    /// Pairs sort behind plain ids and cluster by relation, so the run is
    /// contiguous and found with two binary searches.
    pub(crate) fn pair_run(&self, relation: Entity) -> Range<usize> {
        if relation.is_wildcard() {
            return self.ids.partition_point(|id| !id.is_pair())..self.ids.len();
        }
        let lo = Id::PAIR_FLAG | (relation.index() as u64) << 32;
        let hi = Id::PAIR_FLAG | (relation.index() as u64 + 1) << 32;
        let start = self.ids.partition_point(|id| id.to_bits() < lo);
        let end = self.ids.partition_point(|id| id.to_bits() < hi);
        start..end
    }

    pub(crate) fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    pub(crate) fn column_mut(&mut self, index: usize) -> &mut Column {
        &mut self.columns[index]
    }

    /// Pointer to the value at (`column`, `row`).
    ///
    /// Valid until the next structural change of this table.
    pub(crate) fn value_ptr(&self, column: usize, row: u32) -> *mut u8 {
        self.columns[column].ptr_at(row as usize)
    }

    /// Ensure capacity for one more row in the entity array and every column.
    ///
    /// Nothing is committed on failure, so a failed grow leaves the table
    /// exactly as it was.
    pub(crate) fn reserve_row(&mut self) -> Result<(), StorageError> {
        self.entities
            .try_reserve(1)
            .map_err(|_| StorageError::AllocationFailed {
                bytes: size_of::<Entity>(),
            })?;
        for column in &mut self.columns {
            column.reserve(1)?;
        }
        Ok(())
    }

    /// Append a row for `entity` with every column default-constructed.
    ///
    /// Capacity must have been reserved with [`Table::reserve_row`].
    pub(crate) fn push_row_default(&mut self, entity: Entity) -> u32 {
        let row = self.entities.len() as u32;
        self.entities.push(entity);
        for column in &mut self.columns {
            column.push_default();
        }
        row
    }

    /// Append a row for `entity` with every column slot uninitialized.
    ///
    /// Capacity must have been reserved with [`Table::reserve_row`].
    ///
    /// # Safety
    ///
    /// The caller must initialize every column's slot in the new row before
    /// anything reads or drops it.
    pub(crate) unsafe fn push_row_uninit(&mut self, entity: Entity) -> u32 {
        let row = self.entities.len() as u32;
        self.entities.push(entity);
        for column in &mut self.columns {
            // SAFETY: forwarded contract.
            unsafe { column.push_uninit() };
        }
        row
    }

    /// Remove `row`, dropping its column values.
    ///
    /// Returns the entity that was relocated into `row` to close the gap, or
    /// `None` if the removed row was the last one. The caller must update the
    /// relocated entity's stored row.
    pub(crate) fn remove_row(&mut self, row: u32) -> Option<Entity> {
        let row = row as usize;
        for column in &mut self.columns {
            column.swap_remove_drop(row);
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    /// Remove `row` whose column values have already been moved out.
    ///
    /// Returns the relocated entity as [`Table::remove_row`] does.
    ///
    /// # Safety
    ///
    /// Every column slot at `row` must be hollow (moved-from or dropped).
    pub(crate) unsafe fn remove_row_forget(&mut self, row: u32) -> Option<Entity> {
        let row = row as usize;
        for column in &mut self.columns {
            // SAFETY: forwarded contract.
            unsafe { column.swap_remove_forget(row) };
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }
}

/// Move one entity's row from `src` to `dst`.
///
/// Columns are merged by id: ids in both tables move their value, ids only in
/// the destination are default-constructed, ids only in the source are
/// dropped. Returns the new row and the entity relocated into the vacated
/// source row, if any.
///
/// Capacity for the new row must have been reserved on `dst`.
pub(crate) fn transfer_row(
    src: &mut Table,
    src_row: u32,
    dst: &mut Table,
    entity: Entity,
) -> (u32, Option<Entity>) {
    // SAFETY: the merge walk below initializes every column slot of the row.
    let dst_row = unsafe { dst.push_row_uninit(entity) };
    let (src_row_idx, dst_row_idx) = (src_row as usize, dst_row as usize);

    // Both column lists are sorted by id, so a single forward walk pairs
    // them up.
    let mut si = 0;
    let mut di = 0;
    loop {
        let s = (si < src.column_count()).then(|| src.column(si).id());
        let d = (di < dst.column_count()).then(|| dst.column(di).id());
        match (s, d) {
            (None, None) => break,
            (Some(sid), Some(did)) if sid == did => {
                let from = src.column(si).ptr_at(src_row_idx);
                // SAFETY: the dst slot is uninitialized; the src value is
                // moved out here and its slot retired below.
                unsafe { dst.column_mut(di).write_move_from(dst_row_idx, from) };
                si += 1;
                di += 1;
            }
            (Some(sid), Some(did)) if sid < did => {
                // SAFETY: the slot holds a valid value; the row is retired
                // below without touching it again.
                unsafe { src.column_mut(si).drop_at(src_row_idx) };
                si += 1;
            }
            (Some(_), Some(_)) | (None, Some(_)) => {
                // SAFETY: the dst slot is uninitialized.
                unsafe { dst.column_mut(di).write_default(dst_row_idx) };
                di += 1;
            }
            (Some(_), None) => {
                // SAFETY: as in the source-only arm above.
                unsafe { src.column_mut(si).drop_at(src_row_idx) };
                si += 1;
            }
        }
    }

    // SAFETY: every column slot at `src_row` was moved out or dropped.
    let relocated = unsafe { src.remove_row_forget(src_row) };
    (dst_row, relocated)
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("handle", &self.handle)
            .field("ids", &self.ids)
            .field("rows", &self.entities.len())
            .field("columns", &self.columns.len())
            .finish()
    }
}
