//! Handles to blocks handed out by a pool.

#![allow(unsafe_code)]

use std::ptr::NonNull;

/// A block returned by [`FixedBlockPool::allocate`](super::FixedBlockPool::allocate).
///
/// The handle is a plain address plus the slot it came from; the pool does
/// not track it after handing it out. Returning it twice, returning it to a
/// different pool, or touching its bytes after it was returned are caller
/// errors the pool does not detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    ptr: NonNull<u8>,
    index: u32,
    size: usize,
}

// SAFETY: a `Block` is an address token. It performs no access on its own;
// reads and writes go through the unsafe accessors below, whose contract
// covers cross-thread use.
unsafe impl Send for Block {}
// SAFETY: see above.
unsafe impl Sync for Block {}

impl Block {
    pub(crate) fn new(ptr: NonNull<u8>, index: u32, size: usize) -> Self {
        Self { ptr, index, size }
    }

    /// Start of the block.
    #[must_use]
    pub fn as_ptr(self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Start of the block as a non-null pointer.
    #[must_use]
    pub fn as_non_null(self) -> NonNull<u8> {
        self.ptr
    }

    /// Slot index inside the owning pool's arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) fn slot(self) -> u32 {
        self.index
    }

    /// Usable bytes (the pool's adjusted block size).
    #[must_use]
    pub fn size(self) -> usize {
        self.size
    }

    /// View the block's bytes.
    ///
    /// # Safety
    ///
    /// The block must be currently allocated, its pool must still be alive,
    /// and no mutable view of the same block may exist for `'a`.
    #[must_use]
    pub unsafe fn as_slice<'a>(self) -> &'a [u8] {
        // SAFETY: upheld by the caller; the pointer covers `size` bytes of the arena.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    /// Mutable view of the block's bytes.
    ///
    /// # Safety
    ///
    /// The block must be currently allocated, its pool must still be alive,
    /// and no other view of the same block may exist for `'a`.
    #[must_use]
    pub unsafe fn as_mut_slice<'a>(self) -> &'a mut [u8] {
        // SAFETY: upheld by the caller; the pointer covers `size` bytes of the arena.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }
}
