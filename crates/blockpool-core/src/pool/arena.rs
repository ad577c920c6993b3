//! Contiguous zero-initialized backing storage for one pool.
//!
//! The arena is allocated once with the system allocator and released when
//! the owning pool is dropped. It never grows or shrinks.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::ptr::NonNull;

use crate::config::ALIGNMENT;
use crate::error::PoolError;

/// Owned byte buffer of `len` bytes aligned to [`ALIGNMENT`].
pub(crate) struct Arena {
    base: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the arena exclusively owns its allocation. The pool never reads or
// writes arena bytes itself; it only hands out pointers into it, and access
// through those pointers is governed by the `Block` contract.
unsafe impl Send for Arena {}
// SAFETY: see above; `&Arena` only exposes address arithmetic.
unsafe impl Sync for Arena {}

impl Arena {
    /// Allocate `len` zeroed bytes. `len` must be non-zero.
    pub(crate) fn zeroed(len: usize) -> Result<Self, PoolError> {
        debug_assert!(len > 0);
        let layout = Layout::from_size_align(len, ALIGNMENT)
            .map_err(|_| PoolError::ArenaAllocation { bytes: len })?;
        // SAFETY: layout has non-zero size and a valid power-of-two alignment.
        let raw = unsafe { std::alloc::alloc_zeroed(layout) };
        let base = NonNull::new(raw).ok_or(PoolError::ArenaAllocation { bytes: len })?;
        Ok(Self { base, layout })
    }

    /// Total bytes owned.
    pub(crate) fn len(&self) -> usize {
        self.layout.size()
    }

    /// Pointer `offset` bytes past the start of the arena.
    pub(crate) fn at(&self, offset: usize) -> NonNull<u8> {
        assert!(offset < self.len(), "arena offset {offset} out of bounds");
        // SAFETY: offset is within the allocation checked above, so the result
        // stays inside the same allocated object and is non-null.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }

    /// Whether `ptr` points inside this arena.
    pub(crate) fn contains(&self, ptr: NonNull<u8>) -> bool {
        let start = self.base.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        addr >= start && addr - start < self.len()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: base was returned by `alloc_zeroed` with exactly this layout
        // and is released only here.
        unsafe { std::alloc::dealloc(self.base.as_ptr(), self.layout) };
    }
}
