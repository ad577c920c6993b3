//! # blockpool-core
//!
//! Syscall-free block allocation with introspectable usage statistics.
//!
//! - **Statistics** (`stats`): per-pool counters, latencies and throughput
//! - **Fixed block pool** (`pool`): O(1) free-list allocator over one arena,
//!   with an exclusive-borrow interface and a lock-guarded interface
//! - **Size classes** (`size_class`): table of 14 classes from 8 to 1024 bytes
//!   and an allocator routing each request to one class pool
//! - **Class metrics** (`metrics`): relaxed atomic counters per size class
//! - **Configuration** (`config`): constants and environment overrides
//!
//! Only the arena and block byte access use `unsafe`; everything else is safe Rust.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod size_class;
pub mod stats;

pub use config::{ALIGNMENT, MAX_SMALL_SIZE, PoolConfig};
pub use error::PoolError;
pub use metrics::{ClassCounters, ClassMetrics};
pub use pool::{Block, FixedBlockPool};
pub use size_class::{ClassBlock, SizeClassAllocator, SizeClassTable};
pub use stats::{Statistics, StatisticsSnapshot};
