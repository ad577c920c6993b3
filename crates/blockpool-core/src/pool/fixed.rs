//! Fixed-size block pool.
//!
//! One arena of `block_size * num_blocks` bytes is carved into equal blocks.
//! Free blocks are threaded into a LIFO free list held in a side table of
//! slot indices, so the arena bytes themselves are never reinterpreted.
//! Allocation pops the head, deallocation pushes onto it: both O(1).
//!
//! The free list and the pool's [`Statistics`] sit behind one
//! `parking_lot::Mutex`. The `&mut self` methods reach them through
//! `Mutex::get_mut` without locking; the `*_thread_safe` methods lock.

use std::io::{self, Write};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::arena::Arena;
use super::block::Block;
use crate::config::MIN_BLOCK_SIZE;
use crate::error::PoolError;
use crate::stats::{Statistics, StatisticsReport, StatisticsSnapshot};

/// Free-list terminator.
const NIL: u32 = u32::MAX;

/// Singly linked chain of free slot indices.
struct FreeList {
    head: u32,
    next: Box<[u32]>,
}

impl FreeList {
    /// Chain slots `0..len` in order so slot 0 is handed out first.
    fn chained(len: u32) -> Self {
        let next = (0..len)
            .map(|i| if i + 1 < len { i + 1 } else { NIL })
            .collect();
        Self {
            head: if len == 0 { NIL } else { 0 },
            next,
        }
    }

    fn pop(&mut self) -> Option<u32> {
        if self.head == NIL {
            return None;
        }
        let slot = self.head;
        self.head = self.next[slot as usize];
        Some(slot)
    }

    fn push(&mut self, slot: u32) {
        self.next[slot as usize] = self.head;
        self.head = slot;
    }

    /// Walk the chain. Stops after `next.len()` hops so a corrupted
    /// (cyclic) list cannot hang the caller.
    fn len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head;
        while cursor != NIL && count < self.next.len() {
            count += 1;
            cursor = self.next[cursor as usize];
        }
        count
    }
}

/// State guarded by the pool mutex.
struct PoolState {
    free: FreeList,
    stats: Statistics,
}

/// Allocator of equally sized blocks from one pre-allocated arena.
pub struct FixedBlockPool {
    state: Mutex<PoolState>,
    arena: Arena,
    block_size: usize,
    requested_block_size: usize,
    num_blocks: usize,
}

impl FixedBlockPool {
    /// Build a pool of `num_blocks` blocks of at least `block_size` bytes.
    pub fn new(block_size: usize, num_blocks: usize) -> Result<Self, PoolError> {
        Self::with_verbose(block_size, num_blocks, false)
    }

    /// Like [`new`](Self::new); `verbose` logs construction at `info` level.
    ///
    /// Block sizes below [`MIN_BLOCK_SIZE`] are rounded up to it. The arena
    /// is zero-initialized.
    pub fn with_verbose(
        block_size: usize,
        num_blocks: usize,
        verbose: bool,
    ) -> Result<Self, PoolError> {
        if num_blocks == 0 {
            return Err(PoolError::ZeroBlocks);
        }
        let adjusted = block_size.max(MIN_BLOCK_SIZE);
        let overflow = PoolError::CapacityOverflow {
            block_size: adjusted,
            num_blocks,
        };
        let slots = u32::try_from(num_blocks).map_err(|_| overflow.clone())?;
        let arena_bytes = adjusted
            .checked_mul(num_blocks)
            .filter(|&bytes| bytes <= isize::MAX as usize)
            .ok_or(overflow)?;

        let arena = Arena::zeroed(arena_bytes)?;

        if verbose {
            info!(
                block_size,
                adjusted_block_size = adjusted,
                num_blocks,
                arena_bytes,
                "created fixed block pool"
            );
        } else {
            debug!(
                block_size,
                adjusted_block_size = adjusted,
                num_blocks,
                arena_bytes,
                "created fixed block pool"
            );
        }

        Ok(Self {
            state: Mutex::new(PoolState {
                free: FreeList::chained(slots),
                stats: Statistics::new(),
            }),
            arena,
            block_size: adjusted,
            requested_block_size: block_size,
            num_blocks,
        })
    }

    /// Pop a block, or `None` when every block is in use.
    ///
    /// Reused blocks keep whatever their previous owner wrote; only a
    /// block's first use is guaranteed to be zeroed.
    pub fn allocate(&mut self) -> Option<Block> {
        let state = self.state.get_mut();
        pop_block(state, &self.arena, self.block_size)
    }

    /// Push `block` back onto the free list; it is the next one handed out.
    ///
    /// `None` is ignored with a warning. The block must come from this
    /// pool's `allocate` and must not already be free; violations are not
    /// detected and corrupt the free list.
    pub fn deallocate(&mut self, block: impl Into<Option<Block>>) {
        let Some(block) = block.into() else {
            warn!("ignoring deallocation of a null block handle");
            return;
        };
        debug_assert!(self.contains(&block), "block does not belong to this pool");
        let state = self.state.get_mut();
        push_block(state, block);
    }

    /// [`allocate`](Self::allocate) under the pool lock.
    pub fn allocate_thread_safe(&self) -> Option<Block> {
        let mut state = self.state.lock();
        pop_block(&mut state, &self.arena, self.block_size)
    }

    /// [`deallocate`](Self::deallocate) under the pool lock.
    pub fn deallocate_thread_safe(&self, block: impl Into<Option<Block>>) {
        let Some(block) = block.into() else {
            warn!("ignoring deallocation of a null block handle");
            return;
        };
        debug_assert!(self.contains(&block), "block does not belong to this pool");
        let mut state = self.state.lock();
        push_block(&mut state, block);
    }

    /// Whether `block` addresses one of this pool's slots.
    #[must_use]
    pub fn contains(&self, block: &Block) -> bool {
        block.index() < self.num_blocks
            && self.arena.contains(block.as_non_null())
            && self.arena.at(block.index() * self.block_size) == block.as_non_null()
    }

    /// Count the free list by walking it. O(num_blocks).
    #[must_use]
    pub fn free_blocks(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Blocks currently handed out according to the statistics.
    #[must_use]
    pub fn used_blocks(&self) -> usize {
        self.state.lock().stats.current_usage()
    }

    /// Usable bytes per block after the minimum-size adjustment.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Block size as passed to the constructor.
    pub fn requested_block_size(&self) -> usize {
        self.requested_block_size
    }

    /// Number of blocks carved from the arena.
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Size of the backing arena in bytes.
    pub fn arena_bytes(&self) -> usize {
        self.arena.len()
    }

    /// Copy of the statistics, taken under the lock.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        self.state.lock().stats.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.state.lock().stats.snapshot(self.num_blocks)
    }

    #[must_use]
    pub fn report(&self) -> StatisticsReport {
        self.state.lock().stats.report(self.num_blocks)
    }

    /// Write the text report to `out`.
    pub fn write_statistics<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.report())
    }

    /// Write the text report to standard output.
    pub fn print_statistics(&self) -> io::Result<()> {
        self.write_statistics(&mut io::stdout().lock())
    }

    /// Zero the statistics. The exclusive borrow guarantees no operation is in flight.
    pub fn reset_statistics(&mut self) {
        self.state.get_mut().stats.reset();
    }
}

fn pop_block(state: &mut PoolState, arena: &Arena, block_size: usize) -> Option<Block> {
    let start = Instant::now();
    let Some(slot) = state.free.pop() else {
        state.stats.record_failed_allocation();
        debug!(block_size, "fixed block pool exhausted");
        return None;
    };
    let ptr = arena.at(slot as usize * block_size);
    state.stats.record_allocation(block_size, start.elapsed());
    Some(Block::new(ptr, slot, block_size))
}

fn push_block(state: &mut PoolState, block: Block) {
    let start = Instant::now();
    state.free.push(block.slot());
    state.stats.record_deallocation(start.elapsed());
}

impl std::fmt::Debug for FixedBlockPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedBlockPool")
            .field("block_size", &self.block_size)
            .field("num_blocks", &self.num_blocks)
            .field("free_blocks", &self.free_blocks())
            .finish()
    }
}
