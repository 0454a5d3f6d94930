//! Type-erased dense columns.
//!
//! A [`Column`] owns one contiguous allocation of component values, laid out
//! back to back and managed through the element type's [`TypeInfo`]. Unlike a
//! `Vec<u8>`, the buffer honours the element alignment, and growth is
//! fallible so structural operations can report allocation failure instead of
//! aborting mid-mutation.
//!
//! Growth and row writes are split: callers `reserve` first (the only step
//! that can fail), then fill slots. Tables rely on this to keep multi-column
//! mutations atomic.

use std::alloc::{Layout, alloc, dealloc};
use std::ptr::NonNull;

use strata_component::{Id, TypeInfo};

use crate::error::StorageError;

/// A dense, type-erased column of component values.
pub(crate) struct Column {
    id: Id,
    info: TypeInfo,
    data: NonNull<u8>,
    len: usize,
    cap: usize,
}

// SAFETY: the raw buffer is owned by the column and the stored component
// types are required to be Send + Sync by the registration layer.
unsafe impl Send for Column {}
// SAFETY: as above; shared access never mutates through `&Column`.
unsafe impl Sync for Column {}

impl Column {
    /// Create an empty column for values of `info`'s type.
    ///
    /// Zero-sized types never get a column; membership alone covers them.
    pub(crate) fn new(id: Id, info: TypeInfo) -> Self {
        debug_assert!(!info.is_zero_sized(), "tags do not get columns");
        Self {
            id,
            info,
            // Never dereferenced while `cap` is 0.
            data: NonNull::dangling(),
            len: 0,
            cap: 0,
        }
    }

    /// The id whose values this column stores.
    pub(crate) fn id(&self) -> Id {
        self.id
    }

    /// The element type's metadata.
    pub(crate) fn info(&self) -> &TypeInfo {
        &self.info
    }

    /// Number of values currently stored.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Ensure capacity for `additional` more values.
    ///
    /// Growth is geometric and relocates existing values bytewise (a move
    /// hook, if registered, is for cross-slot moves; the buffer relocation
    /// preserves addresses relative to rows, which is all the pointer
    /// contract promises). On failure the column is untouched.
    pub(crate) fn reserve(&mut self, additional: usize) -> Result<(), StorageError> {
        let needed = self.len.checked_add(additional).ok_or(
            StorageError::AllocationFailed { bytes: usize::MAX },
        )?;
        if needed <= self.cap {
            return Ok(());
        }
        let new_cap = needed.max(self.cap.saturating_mul(2)).max(4);
        let new_layout = self.layout_for(new_cap)?;

        // SAFETY: `new_layout` has non-zero size (element size > 0, cap > 0).
        let new_data = unsafe { alloc(new_layout) };
        let Some(new_data) = NonNull::new(new_data) else {
            return Err(StorageError::AllocationFailed {
                bytes: new_layout.size(),
            });
        };

        if self.cap > 0 {
            let old_layout = self.layout_for(self.cap)?;
            // SAFETY: both buffers are valid for `len * size` bytes and do
            // not overlap; the old buffer is freed right after.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    self.data.as_ptr(),
                    new_data.as_ptr(),
                    self.len * self.info.size(),
                );
                dealloc(self.data.as_ptr(), old_layout);
            }
        }
        self.data = new_data;
        self.cap = new_cap;
        Ok(())
    }

    /// Append a slot and leave it uninitialized, returning its row.
    ///
    /// Capacity must have been reserved.
    ///
    /// # Safety
    ///
    /// The caller must initialize the slot (move, copy, or default) before
    /// any operation that reads or drops it.
    pub(crate) unsafe fn push_uninit(&mut self) -> usize {
        assert!(self.len < self.cap, "push without reserved capacity");
        let row = self.len;
        self.len += 1;
        row
    }

    /// Append a default-constructed value. Capacity must have been reserved.
    pub(crate) fn push_default(&mut self) {
        // SAFETY: the slot is initialized immediately below.
        let row = unsafe { self.push_uninit() };
        // SAFETY: `row` is a fresh, aligned, uninitialized slot.
        unsafe { self.info.default_in_place(self.ptr_at(row)) };
    }

    /// Default-construct into an existing slot.
    ///
    /// # Safety
    ///
    /// The slot at `row` must be uninitialized (fresh from
    /// [`Column::push_uninit`] or hollowed by a move-out/drop).
    pub(crate) unsafe fn write_default(&mut self, row: usize) {
        // SAFETY: forwarded contract.
        unsafe { self.info.default_in_place(self.ptr_at(row)) };
    }

    /// Move the value at `src` into the slot at `row`.
    ///
    /// # Safety
    ///
    /// The slot at `row` must be uninitialized; `src` must point to a valid
    /// value of this column's type, which is moved-from afterwards.
    pub(crate) unsafe fn write_move_from(&mut self, row: usize, src: *mut u8) {
        // SAFETY: forwarded contract.
        unsafe { self.info.move_to(self.ptr_at(row), src) };
    }

    /// Drop the value at `row` in place, leaving the slot hollow.
    ///
    /// # Safety
    ///
    /// The slot must hold a valid value, and afterwards must be overwritten
    /// or removed with [`Column::swap_remove_forget`] before anything reads
    /// or drops it again.
    pub(crate) unsafe fn drop_at(&mut self, row: usize) {
        // SAFETY: forwarded contract.
        unsafe { self.info.drop_in_place(self.ptr_at(row)) };
    }

    /// Drop the value at `row` and close the gap with the last value.
    pub(crate) fn swap_remove_drop(&mut self, row: usize) {
        assert!(row < self.len);
        // SAFETY: the slot holds a valid value and is refilled or retired
        // by the relocation below.
        unsafe {
            self.drop_at(row);
            self.relocate_last_into(row);
        }
    }

    /// Close the gap at `row` with the last value, without dropping `row`.
    ///
    /// # Safety
    ///
    /// The slot at `row` must already be hollow (moved-out or dropped).
    pub(crate) unsafe fn swap_remove_forget(&mut self, row: usize) {
        assert!(row < self.len);
        // SAFETY: forwarded contract.
        unsafe { self.relocate_last_into(row) };
    }

    /// Pointer to the value at `row`.
    ///
    /// Valid until the next structural mutation of this column.
    pub(crate) fn ptr_at(&self, row: usize) -> *mut u8 {
        debug_assert!(row < self.len, "row out of bounds");
        // SAFETY: `row < len <= cap`, so the offset stays inside the buffer.
        unsafe { self.data.as_ptr().add(row * self.info.size()) }
    }

    /// Move the last value into the hollow slot at `row` and shrink by one.
    ///
    /// # Safety
    ///
    /// The slot at `row` must be hollow.
    unsafe fn relocate_last_into(&mut self, row: usize) {
        let last = self.len - 1;
        if row != last {
            // SAFETY: `row` is hollow and `last` holds a valid value; the
            // two slots do not overlap.
            unsafe {
                let src = self.data.as_ptr().add(last * self.info.size());
                self.info.move_to(self.ptr_at(row), src);
            }
        }
        self.len = last;
    }

    fn layout_for(&self, cap: usize) -> Result<Layout, StorageError> {
        let bytes = self
            .info
            .size()
            .checked_mul(cap)
            .ok_or(StorageError::AllocationFailed { bytes: usize::MAX })?;
        Layout::from_size_align(bytes, self.info.align())
            .map_err(|_| StorageError::AllocationFailed { bytes })
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if self.info.needs_drop() {
            for row in 0..self.len {
                // SAFETY: every live slot holds a valid value; none is
                // touched again after this loop.
                unsafe { self.info.drop_in_place(self.ptr_at(row)) };
            }
        }
        if self.cap > 0
            && let Ok(layout) = self.layout_for(self.cap)
        {
            // SAFETY: `data` was allocated with exactly this layout.
            unsafe { dealloc(self.data.as_ptr(), layout) };
        }
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("id", &self.id)
            .field("type", &self.info.name())
            .field("len", &self.len)
            .field("cap", &self.cap)
            .finish()
    }
}
