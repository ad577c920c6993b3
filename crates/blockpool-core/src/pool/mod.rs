//! Fixed-size block pools.
//!
//! - [`FixedBlockPool`]: free-list allocator over one pre-allocated arena
//! - [`Block`]: handle to an allocated block

mod arena;
pub mod block;
pub mod fixed;

pub use block::Block;
pub use fixed::FixedBlockPool;
