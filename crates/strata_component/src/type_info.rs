//! Per-type layout and lifecycle metadata.
//!
//! [`TypeInfo`] is what the storage layer knows about a component type: its
//! memory layout and the lifecycle hooks (default-construct, drop, move,
//! copy) used to manage values in type-erased columns. For Rust types the
//! hooks are derived from the type itself; dynamically registered types
//! supply their own through the builder methods.

use std::alloc::Layout;

use crate::component::Component;

/// Writes a valid value into uninitialized, correctly aligned memory.
type DefaultFn = unsafe fn(*mut u8);

/// Drops the value in place.
type DropFn = unsafe fn(*mut u8);

/// Relocates the value from `src` to the uninitialized `dst`; `src` is
/// treated as moved-from afterwards and is not dropped.
type MoveFn = unsafe fn(dst: *mut u8, src: *mut u8);

/// Clones the value at `src` into the uninitialized `dst`.
type CopyFn = unsafe fn(dst: *mut u8, src: *const u8);

/// Layout and lifecycle operations for one component type.
///
/// Registered once per type and immutable afterwards. A missing hook falls
/// back to the trivial behaviour: zero bytes for default construction, no-op
/// drop, bytewise relocation for moves. Types for which those fallbacks are
/// wrong must register the corresponding hook.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    /// The human-readable type name (e.g. `"Position"`).
    name: &'static str,
    /// Size and alignment of one value.
    layout: Layout,
    default_fn: Option<DefaultFn>,
    drop_fn: Option<DropFn>,
    move_fn: Option<MoveFn>,
    copy_fn: Option<CopyFn>,
}

impl TypeInfo {
    /// The [`TypeInfo`] for a Rust component type.
    ///
    /// Default construction comes from `T::default()`; the drop hook is only
    /// registered when `T` actually needs dropping. Moves stay bytewise —
    /// that is what a Rust move is.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            name: T::type_name(),
            layout: Layout::new::<T>(),
            default_fn: Some(|dst: *mut u8| {
                // SAFETY: caller passes uninitialized, aligned storage for T.
                unsafe { std::ptr::write(dst.cast::<T>(), T::default()) }
            }),
            drop_fn: if std::mem::needs_drop::<T>() {
                Some(|ptr: *mut u8| {
                    // SAFETY: caller passes a valid T that is never used again.
                    unsafe { std::ptr::drop_in_place(ptr.cast::<T>()) }
                })
            } else {
                None
            },
            move_fn: None,
            copy_fn: None,
        }
    }

    /// The [`TypeInfo`] for a clonable Rust component type, with a copy hook
    /// so values can be duplicated through the type-erased API.
    #[must_use]
    pub fn of_cloneable<T: Component + Clone>() -> Self {
        let mut info = Self::of::<T>();
        info.copy_fn = Some(|dst: *mut u8, src: *const u8| {
            // SAFETY: caller passes a valid source T and uninitialized,
            // aligned destination storage.
            unsafe { std::ptr::write(dst.cast::<T>(), (*src.cast::<T>()).clone()) }
        });
        info
    }

    /// Metadata for a type not known to Rust (FFI or reflection-driven).
    ///
    /// No hooks are attached: the registering side asserts that the type is
    /// valid when zero-initialized and bytewise-copyable, or it attaches the
    /// appropriate hooks with the `with_*` builders before registering.
    #[must_use]
    pub const fn opaque(name: &'static str, layout: Layout) -> Self {
        Self {
            name,
            layout,
            default_fn: None,
            drop_fn: None,
            move_fn: None,
            copy_fn: None,
        }
    }

    /// Attach a default-construction hook.
    #[must_use]
    pub fn with_default(mut self, f: DefaultFn) -> Self {
        self.default_fn = Some(f);
        self
    }

    /// Attach a drop hook.
    #[must_use]
    pub fn with_drop(mut self, f: DropFn) -> Self {
        self.drop_fn = Some(f);
        self
    }

    /// Attach a move hook for types that cannot be relocated bytewise.
    #[must_use]
    pub fn with_move(mut self, f: MoveFn) -> Self {
        self.move_fn = Some(f);
        self
    }

    /// Attach a copy hook.
    #[must_use]
    pub fn with_copy(mut self, f: CopyFn) -> Self {
        self.copy_fn = Some(f);
        self
    }

    /// The registered type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The memory layout of one value.
    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Size of one value in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.layout.size()
    }

    /// Alignment of one value in bytes.
    #[must_use]
    pub const fn align(&self) -> usize {
        self.layout.align()
    }

    /// Returns `true` for zero-sized types, which carry no data.
    #[must_use]
    pub const fn is_zero_sized(&self) -> bool {
        self.layout.size() == 0
    }

    /// Returns `true` if dropping values of this type runs code.
    #[must_use]
    pub const fn needs_drop(&self) -> bool {
        self.drop_fn.is_some()
    }

    /// Returns `true` if values can be duplicated through [`TypeInfo::copy_to`]
    /// without breaking ownership: either a copy hook is registered or the
    /// type is trivially destructible.
    #[must_use]
    pub const fn is_copyable(&self) -> bool {
        self.copy_fn.is_some() || self.drop_fn.is_none()
    }

    /// Default-construct a value into `dst`.
    ///
    /// # Safety
    ///
    /// `dst` must be uninitialized storage of this type's layout. Without a
    /// default hook the storage is zero-filled, which the registering side
    /// asserted is a valid value.
    pub unsafe fn default_in_place(&self, dst: *mut u8) {
        match self.default_fn {
            // SAFETY: forwarded contract.
            Some(f) => unsafe { f(dst) },
            // SAFETY: dst is writable for `size` bytes.
            None => unsafe { std::ptr::write_bytes(dst, 0, self.size()) },
        }
    }

    /// Drop the value at `ptr` in place.
    ///
    /// # Safety
    ///
    /// `ptr` must hold a valid value of this type that is never read again.
    pub unsafe fn drop_in_place(&self, ptr: *mut u8) {
        if let Some(f) = self.drop_fn {
            // SAFETY: forwarded contract.
            unsafe { f(ptr) }
        }
    }

    /// Move the value at `src` into the uninitialized `dst`.
    ///
    /// # Safety
    ///
    /// `src` must hold a valid value, `dst` must be uninitialized storage of
    /// this type's layout, and the two must not overlap. After the call `src`
    /// is moved-from: it must not be read or dropped.
    pub unsafe fn move_to(&self, dst: *mut u8, src: *mut u8) {
        match self.move_fn {
            // SAFETY: forwarded contract.
            Some(f) => unsafe { f(dst, src) },
            // SAFETY: non-overlapping regions of `size` bytes.
            None => unsafe { std::ptr::copy_nonoverlapping(src, dst, self.size()) },
        }
    }

    /// Duplicate the value at `src` into the uninitialized `dst`.
    ///
    /// # Safety
    ///
    /// `src` must hold a valid value, `dst` must be uninitialized storage of
    /// this type's layout, and the two must not overlap. The caller must have
    /// checked [`TypeInfo::is_copyable`]; a bytewise fallback on an
    /// ownership-carrying type would double-free.
    pub unsafe fn copy_to(&self, dst: *mut u8, src: *const u8) {
        match self.copy_fn {
            // SAFETY: forwarded contract.
            Some(f) => unsafe { f(dst, src) },
            // SAFETY: non-overlapping regions of `size` bytes.
            None => unsafe { std::ptr::copy_nonoverlapping(src, dst, self.size()) },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::MaybeUninit;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::component::Component;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Score(u64);

    impl Component for Score {
        fn type_name() -> &'static str {
            "Score"
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Label(String);

    impl Component for Label {
        fn type_name() -> &'static str {
            "Label"
        }
    }

    #[test]
    fn test_layout_matches_type() {
        let info = TypeInfo::of::<Score>();
        assert_eq!(info.layout(), Layout::new::<Score>());
        assert_eq!(info.size(), std::mem::size_of::<Score>());
        assert_eq!(info.align(), std::mem::align_of::<Score>());
        assert_eq!(info.name(), "Score");
    }

    #[test]
    fn test_drop_hook_gated_on_needs_drop() {
        assert!(!TypeInfo::of::<Score>().needs_drop());
        assert!(TypeInfo::of::<Label>().needs_drop());
    }

    #[test]
    fn test_default_constructs_default_value() {
        let info = TypeInfo::of::<Score>();
        let mut slot = MaybeUninit::<Score>::uninit();
        unsafe {
            info.default_in_place(slot.as_mut_ptr().cast());
            assert_eq!(slot.assume_init(), Score(0));
        }
    }

    #[test]
    fn test_move_relocates_ownership() {
        let info = TypeInfo::of::<Label>();
        let mut src = MaybeUninit::new(Label(String::from("hello")));
        let mut dst = MaybeUninit::<Label>::uninit();
        unsafe {
            info.move_to(dst.as_mut_ptr().cast(), src.as_mut_ptr().cast());
            // src is moved-from and must not be dropped.
            let moved = dst.assume_init();
            assert_eq!(moved.0, "hello");
        }
    }

    #[test]
    fn test_copy_hook_clones() {
        #[derive(Debug, Default, Clone)]
        struct Shared(Option<Arc<AtomicU32>>);
        impl Component for Shared {
            fn type_name() -> &'static str {
                "Shared"
            }
        }

        let info = TypeInfo::of_cloneable::<Shared>();
        assert!(info.is_copyable());

        let counter = Arc::new(AtomicU32::new(7));
        let src = Shared(Some(counter.clone()));
        let mut dst = MaybeUninit::<Shared>::uninit();
        unsafe {
            info.copy_to(dst.as_mut_ptr().cast(), (&src as *const Shared).cast());
            let copy = dst.assume_init();
            assert_eq!(Arc::strong_count(&counter), 3);
            drop(copy);
        }
        assert_eq!(Arc::strong_count(&counter), 2);
        drop(src);
        assert_eq!(Arc::strong_count(&counter), 1);
    }

    #[test]
    fn test_plain_types_are_copyable_without_hook() {
        assert!(TypeInfo::of::<Score>().is_copyable());
        assert!(!TypeInfo::of::<Label>().is_copyable());
    }

    #[test]
    fn test_opaque_defaults_to_zero_fill() {
        let info = TypeInfo::opaque("RawCounter", Layout::new::<u32>());
        let mut slot = MaybeUninit::<u32>::uninit();
        unsafe {
            info.default_in_place(slot.as_mut_ptr().cast());
            assert_eq!(slot.assume_init(), 0);
        }
    }
}
