//! Size-class allocator.
//!
//! Routes variable-size requests to one [`FixedBlockPool`] per size class.
//! A request is rounded up to [`ALIGNMENT`] and served by the smallest class
//! that fits. There is no allocator-wide lock: each call touches exactly one
//! class pool and its lock, so requests for different classes never contend
//! and no call ever holds two locks.

use std::fmt;
use std::io::{self, Write};

use serde::Serialize;
use tracing::{debug, error, warn};

use super::table::{SizeClassTable, align_up};
use crate::config::{ALIGNMENT, MAX_SMALL_SIZE, PoolConfig};
use crate::error::PoolError;
use crate::metrics::{ClassCounters, ClassMetrics, efficiency_percent};
use crate::pool::{Block, FixedBlockPool};

/// A block handed out by [`SizeClassAllocator::allocate`], tagged with the
/// class it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassBlock {
    block: Block,
    class_index: usize,
}

impl ClassBlock {
    #[must_use]
    pub fn as_ptr(self) -> *mut u8 {
        self.block.as_ptr()
    }

    /// Usable bytes: the class size, which may exceed the requested size.
    #[must_use]
    pub fn size(self) -> usize {
        self.block.size()
    }

    /// Index of the size class that owns this block.
    #[must_use]
    pub fn class_index(self) -> usize {
        self.class_index
    }

    /// The underlying pool block.
    #[must_use]
    pub fn block(self) -> Block {
        self.block
    }
}

/// Allocator bucketing requests of 1..=[`MAX_SMALL_SIZE`] bytes into size classes.
pub struct SizeClassAllocator {
    table: SizeClassTable,
    pools: Box<[FixedBlockPool]>,
    metrics: Box<[ClassMetrics]>,
    blocks_per_class: usize,
}

impl SizeClassAllocator {
    /// One pool of `blocks_per_class` blocks for every size class.
    pub fn new(blocks_per_class: usize) -> Result<Self, PoolError> {
        Self::with_config(&PoolConfig {
            blocks_per_class,
            ..PoolConfig::default()
        })
    }

    /// Build with the default block count.
    pub fn with_defaults() -> Result<Self, PoolError> {
        Self::with_config(&PoolConfig::default())
    }

    /// Build from the environment-derived configuration.
    pub fn from_env() -> Result<Self, PoolError> {
        Self::with_config(&crate::config::global_config())
    }

    pub fn with_config(config: &PoolConfig) -> Result<Self, PoolError> {
        let table = SizeClassTable::build();
        debug!(classes = ?table.as_slice(), "built size class table");

        let pools = table
            .iter()
            .map(|size| {
                FixedBlockPool::with_verbose(size, config.blocks_per_class, config.verbose)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let metrics = table.iter().map(|_| ClassMetrics::new()).collect();

        debug!(
            num_classes = table.len(),
            blocks_per_class = config.blocks_per_class,
            "created size class allocator"
        );
        Ok(Self {
            table,
            pools: pools.into_boxed_slice(),
            metrics,
            blocks_per_class: config.blocks_per_class,
        })
    }

    /// Class index serving a `size`-byte request, after alignment.
    fn route(&self, size: usize) -> Option<usize> {
        align_up(size, ALIGNMENT).and_then(|aligned| self.table.size_class(aligned))
    }

    /// Allocate a block of at least `size` bytes.
    ///
    /// Returns `None` without side effects for `size == 0`, logs and returns
    /// `None` for sizes above the largest class, and counts a failure when the
    /// class pool is exhausted.
    pub fn allocate(&self, size: usize) -> Option<ClassBlock> {
        if size == 0 {
            return None;
        }
        let Some(index) = self.route(size) else {
            warn!(
                size,
                max_class = self.table.max_size(),
                "requested size exceeds the largest size class"
            );
            return None;
        };

        let class_size = self.table.class_size(index)?;
        match self.pools[index].allocate_thread_safe() {
            Some(block) => {
                self.metrics[index].record_allocation(class_size, size);
                Some(ClassBlock {
                    block,
                    class_index: index,
                })
            }
            None => {
                self.metrics[index].record_failed_allocation();
                warn!(size, class_size, "size class pool exhausted");
                None
            }
        }
    }

    /// Return `block` to the class selected by `size`.
    ///
    /// `size` must be the value passed to the matching `allocate`; a
    /// different size can select another class and corrupt that pool. `None`
    /// (logged at `debug`) and `size == 0` are no-ops. Sizes above the
    /// largest class are logged and the block is leaked.
    pub fn deallocate(&self, block: impl Into<Option<ClassBlock>>, size: usize) {
        let Some(block) = block.into() else {
            debug!(size, "ignoring deallocation of a null class block handle");
            return;
        };
        if size == 0 {
            return;
        }
        let Some(index) = self.route(size) else {
            error!(size, "invalid size for deallocation");
            return;
        };
        self.release(index, block.block);
    }

    /// Return `block` to the class recorded in the handle.
    pub fn free(&self, block: ClassBlock) {
        self.release(block.class_index, block.block);
    }

    fn release(&self, index: usize, block: Block) {
        self.pools[index].deallocate_thread_safe(block);
        self.metrics[index].record_deallocation();
    }

    /// Number of size classes in the table.
    pub fn num_size_classes(&self) -> usize {
        self.table.len()
    }

    /// Class index for `size` without alignment; `None` for 0 or oversize.
    pub fn size_class_for_size(&self, size: usize) -> Option<usize> {
        self.table.size_class(size)
    }

    /// Block size of class `index`.
    pub fn class_size(&self, index: usize) -> Option<usize> {
        self.table.class_size(index)
    }

    /// Blocks in the pool for class `index`; 0 for an unknown class.
    pub fn blocks_per_class(&self, index: usize) -> usize {
        self.pools.get(index).map_or(0, FixedBlockPool::num_blocks)
    }

    /// Free blocks in the pool for class `index`.
    pub fn free_blocks(&self, index: usize) -> Option<usize> {
        self.pools.get(index).map(FixedBlockPool::free_blocks)
    }

    /// The immutable size class table.
    pub fn table(&self) -> &SizeClassTable {
        &self.table
    }

    pub fn pool(&self, index: usize) -> Option<&FixedBlockPool> {
        self.pools.get(index)
    }

    pub fn class_stats(&self, index: usize) -> Option<ClassCounters> {
        self.metrics.get(index).map(ClassMetrics::snapshot)
    }

    /// Per-class and aggregate counters. Classes are read one after another,
    /// so the result is not atomic across classes.
    #[must_use]
    pub fn snapshot(&self) -> AllocatorSnapshot {
        let classes: Vec<ClassSnapshot> = self
            .table
            .iter()
            .enumerate()
            .map(|(index, size)| {
                let counters = self.metrics[index].snapshot();
                ClassSnapshot {
                    index,
                    size,
                    free_blocks: self.pools[index].free_blocks(),
                    efficiency_percent: counters.efficiency_percent(),
                    counters,
                }
            })
            .collect();
        let totals = classes
            .iter()
            .fold(ClassCounters::default(), |acc, c| acc.merged(c.counters));

        AllocatorSnapshot {
            alignment: ALIGNMENT,
            max_small_size: MAX_SMALL_SIZE,
            blocks_per_class: self.blocks_per_class,
            efficiency_percent: efficiency_percent(totals.requested_bytes, totals.allocated_bytes),
            totals,
            classes,
        }
    }

    #[must_use]
    pub fn report(&self) -> AllocatorReport {
        AllocatorReport(self.snapshot())
    }

    /// Write the text report to `out`.
    pub fn write_statistics<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.report())
    }

    /// Write the text report to standard output.
    pub fn print_statistics(&self) -> io::Result<()> {
        self.write_statistics(&mut io::stdout().lock())
    }
}

impl fmt::Debug for SizeClassAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SizeClassAllocator")
            .field("classes", &self.table.as_slice())
            .field("blocks_per_class", &self.blocks_per_class)
            .finish()
    }
}

/// Counters for one size class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSnapshot {
    pub index: usize,
    pub size: usize,
    pub free_blocks: usize,
    #[serde(flatten)]
    pub counters: ClassCounters,
    pub efficiency_percent: f64,
}

/// Whole-allocator statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocatorSnapshot {
    pub alignment: usize,
    pub max_small_size: usize,
    pub blocks_per_class: usize,
    pub classes: Vec<ClassSnapshot>,
    pub totals: ClassCounters,
    pub efficiency_percent: f64,
}

/// Text rendering of an [`AllocatorSnapshot`].
#[derive(Debug, Clone)]
pub struct AllocatorReport(pub AllocatorSnapshot);

impl fmt::Display for AllocatorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        writeln!(f, "=== Size Class Memory Pool Statistics ===")?;
        writeln!(f, "Total size classes: {}", s.classes.len())?;
        writeln!(f, "Maximum small object size: {} bytes", s.max_small_size)?;
        writeln!(f, "Alignment: {} bytes", s.alignment)?;
        writeln!(f)?;
        writeln!(f, "Size Class Details:")?;
        writeln!(
            f,
            "{:>8}{:>12}{:>13}{:>15}{:>10}{:>15}{:>12}",
            "Class",
            "Size(bytes)",
            "Allocations",
            "Deallocations",
            "Failed",
            "Total Bytes",
            "Efficiency"
        )?;
        writeln!(f, "{}", "-".repeat(85))?;
        for class in &s.classes {
            let c = &class.counters;
            writeln!(
                f,
                "{:>8}{:>12}{:>13}{:>15}{:>10}{:>15}{:>11.1}%",
                class.index,
                class.size,
                c.allocations,
                c.deallocations,
                c.failed_allocations,
                c.allocated_bytes,
                class.efficiency_percent
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Summary:")?;
        writeln!(f, "  Total allocations: {}", s.totals.allocations)?;
        writeln!(f, "  Total deallocations: {}", s.totals.deallocations)?;
        writeln!(f, "  Total failed allocations: {}", s.totals.failed_allocations)?;
        writeln!(f, "  Total allocated bytes: {}", s.totals.allocated_bytes)?;
        writeln!(f, "  Total requested bytes: {}", s.totals.requested_bytes)?;
        if s.totals.allocations > 0 {
            writeln!(
                f,
                "  Average memory efficiency: {:.1}%",
                s.efficiency_percent
            )?;
        }
        write!(f, "===========================================")
    }
}
