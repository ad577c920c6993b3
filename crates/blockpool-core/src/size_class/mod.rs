//! Size-class routing.
//!
//! Variable-size requests are rounded up to the smallest class in a fixed
//! table and served by that class's fixed block pool. Sizes above the
//! largest class are refused; callers fall back to another allocator.

pub mod allocator;
pub mod table;

pub use allocator::{
    AllocatorReport, AllocatorSnapshot, ClassBlock, ClassSnapshot, SizeClassAllocator,
};
pub use table::{SizeClassTable, align_up};
