//! Sparse component storage.
//!
//! A [`SparseColumn`] keys component values directly by entity index, in
//! fixed-size pages that are allocated on demand and never move: growth adds
//! pages instead of reallocating, so the address handed out for an entity's
//! value stays valid until that entity removes the id or dies. Page size is a
//! power of two, making slot addressing a shift and a mask.
//!
//! Each slot remembers its owning entity (including generation), so lookups
//! with a stale handle miss instead of aliasing the index's new occupant.

use std::alloc::{Layout, alloc, dealloc};
use std::ptr::NonNull;

use strata_component::{Entity, TypeInfo};

use crate::error::StorageError;

/// One page of sparse values.
struct SparsePage {
    /// Owner per slot; [`Entity::NULL`] marks a vacant slot.
    entities: Box<[Entity]>,
    /// `rows * size` bytes of value storage.
    data: NonNull<u8>,
}

impl SparsePage {
    fn new(info: &TypeInfo, rows: usize) -> Result<Box<Self>, StorageError> {
        let layout = page_layout(info, rows)?;
        // SAFETY: layout has non-zero size (sparse columns hold sized types).
        let data = unsafe { alloc(layout) };
        let Some(data) = NonNull::new(data) else {
            return Err(StorageError::AllocationFailed {
                bytes: layout.size(),
            });
        };
        Ok(Box::new(Self {
            entities: vec![Entity::NULL; rows].into_boxed_slice(),
            data,
        }))
    }
}

/// Entity-keyed storage for one sparse id.
pub(crate) struct SparseColumn {
    info: TypeInfo,
    /// Rows per page; a power of two.
    page_rows: usize,
    shift: u32,
    pages: Vec<Option<Box<SparsePage>>>,
    len: usize,
}

// SAFETY: the raw buffers are owned by the column and the stored component
// types are required to be Send + Sync by the registration layer.
unsafe impl Send for SparseColumn {}
// SAFETY: as above; shared access never mutates through `&SparseColumn`.
unsafe impl Sync for SparseColumn {}

impl SparseColumn {
    /// Create an empty sparse column for values of `info`'s type.
    pub(crate) fn new(info: TypeInfo, page_rows: usize) -> Self {
        assert!(
            page_rows.is_power_of_two(),
            "sparse page size must be a power of two"
        );
        debug_assert!(!info.is_zero_sized(), "tags do not get sparse storage");
        Self {
            info,
            page_rows,
            shift: page_rows.trailing_zeros(),
            pages: Vec::new(),
            len: 0,
        }
    }

    /// The element type's metadata.
    pub(crate) fn info(&self) -> &TypeInfo {
        &self.info
    }

    /// Number of entities with a value in this column.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// The value address for `entity`, if it has one.
    ///
    /// Stale generations miss: the slot records its exact owner.
    pub(crate) fn get(&self, entity: Entity) -> Option<NonNull<u8>> {
        let (page_idx, slot) = self.slot_of(entity);
        let page = self.pages.get(page_idx)?.as_ref()?;
        (page.entities[slot] == entity).then(|| self.value_ptr(page, slot))
    }

    /// The value address for `entity`, default-constructing it if absent.
    ///
    /// The returned address is stable until [`SparseColumn::remove`] for the
    /// same entity: pages never relocate.
    pub(crate) fn ensure(&mut self, entity: Entity) -> Result<NonNull<u8>, StorageError> {
        let (page_idx, slot) = self.slot_of(entity);
        if page_idx >= self.pages.len() {
            self.pages.resize_with(page_idx + 1, || None);
        }
        let info = self.info;
        let page = match &mut self.pages[page_idx] {
            Some(page) => page,
            vacant => vacant.insert(SparsePage::new(&info, self.page_rows)?),
        };
        let owner = page.entities[slot];
        let ptr = page_value_ptr(&info, page, slot);
        if owner == entity {
            return Ok(ptr);
        }

        // The world removes values before an entity index is recycled, so an
        // occupied slot can only belong to `entity` itself.
        debug_assert_eq!(owner, Entity::NULL, "sparse slot owned by another entity");
        // SAFETY: the slot is vacant, so its bytes are free to initialize.
        unsafe { info.default_in_place(ptr.as_ptr()) };
        page.entities[slot] = entity;
        self.len += 1;
        Ok(ptr)
    }

    /// Drop `entity`'s value and vacate its slot.
    ///
    /// Returns `false` if the entity had no value here.
    pub(crate) fn remove(&mut self, entity: Entity) -> bool {
        let (page_idx, slot) = self.slot_of(entity);
        let info = self.info;
        let Some(Some(page)) = self.pages.get_mut(page_idx) else {
            return false;
        };
        if page.entities[slot] != entity {
            return false;
        }
        let ptr = page_value_ptr(&info, page, slot);
        // SAFETY: the slot is owned, so it holds a valid value; the slot is
        // marked vacant right after.
        unsafe { info.drop_in_place(ptr.as_ptr()) };
        page.entities[slot] = Entity::NULL;
        self.len -= 1;
        true
    }

    fn slot_of(&self, entity: Entity) -> (usize, usize) {
        let index = entity.index() as usize;
        (index >> self.shift, index & (self.page_rows - 1))
    }

    fn value_ptr(&self, page: &SparsePage, slot: usize) -> NonNull<u8> {
        page_value_ptr(&self.info, page, slot)
    }
}

fn page_value_ptr(info: &TypeInfo, page: &SparsePage, slot: usize) -> NonNull<u8> {
    // SAFETY: `slot < page_rows`, so the offset stays inside the page buffer.
    unsafe { NonNull::new_unchecked(page.data.as_ptr().add(slot * info.size())) }
}

fn page_layout(info: &TypeInfo, rows: usize) -> Result<Layout, StorageError> {
    let bytes = info
        .size()
        .checked_mul(rows)
        .ok_or(StorageError::AllocationFailed { bytes: usize::MAX })?;
    Layout::from_size_align(bytes, info.align())
        .map_err(|_| StorageError::AllocationFailed { bytes })
}

impl Drop for SparseColumn {
    fn drop(&mut self) {
        let info = self.info;
        for page in self.pages.iter_mut().flatten() {
            if info.needs_drop() {
                for slot in 0..self.page_rows {
                    if page.entities[slot] != Entity::NULL {
                        let ptr = page_value_ptr(&info, page, slot);
                        // SAFETY: owned slots hold valid values; the whole
                        // column is going away.
                        unsafe { info.drop_in_place(ptr.as_ptr()) };
                    }
                }
            }
            if let Ok(layout) = page_layout(&info, self.page_rows) {
                // SAFETY: `data` was allocated with exactly this layout.
                unsafe { dealloc(page.data.as_ptr(), layout) };
            }
        }
    }
}

impl std::fmt::Debug for SparseColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseColumn")
            .field("type", &self.info.name())
            .field("len", &self.len)
            .field("pages", &self.pages.len())
            .finish()
    }
}
