//! Construction errors.
//!
//! Every run-time condition (exhausted free list, oversize or zero-byte
//! request, null handle) is reported through `Option::None` plus a counter
//! and a diagnostic. Only building a pool can fail, because a pool cannot
//! exist without its arena.

use thiserror::Error;

/// Failure to construct a [`FixedBlockPool`](crate::pool::FixedBlockPool)
/// or a [`SizeClassAllocator`](crate::size_class::SizeClassAllocator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A pool was requested with no blocks at all.
    #[error("a pool needs at least one block")]
    ZeroBlocks,
    /// The arena size is not representable.
    #[error("arena of {num_blocks} blocks x {block_size} bytes is too large")]
    CapacityOverflow { block_size: usize, num_blocks: usize },
    /// The backing allocator refused the arena.
    #[error("failed to allocate a {bytes}-byte arena")]
    ArenaAllocation { bytes: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        let err = PoolError::CapacityOverflow {
            block_size: 64,
            num_blocks: usize::MAX,
        };
        assert!(err.to_string().contains("64 bytes"));

        let err = PoolError::ArenaAllocation { bytes: 4096 };
        assert_eq!(err.to_string(), "failed to allocate a 4096-byte arena");
    }
}
