//! Per-size-class counters.
//!
//! The size-class allocator takes no allocator-wide lock, so these counters
//! are atomics updated with relaxed ordering. They are observational only;
//! a snapshot across classes is not a consistent point in time.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for one size class.
#[derive(Debug, Default)]
pub struct ClassMetrics {
    /// Successful allocations.
    pub allocations: AtomicU64,
    /// Deallocations routed to this class.
    pub deallocations: AtomicU64,
    /// Allocations that found the class pool exhausted.
    pub failed_allocations: AtomicU64,
    /// Bytes handed out, counted at the class size.
    pub allocated_bytes: AtomicU64,
    /// Bytes callers actually asked for.
    pub requested_bytes: AtomicU64,
}

impl ClassMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            allocations: AtomicU64::new(0),
            deallocations: AtomicU64::new(0),
            failed_allocations: AtomicU64::new(0),
            allocated_bytes: AtomicU64::new(0),
            requested_bytes: AtomicU64::new(0),
        }
    }

    /// Add `n` to a counter.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub(crate) fn record_allocation(&self, class_size: usize, requested: usize) {
        Self::inc(&self.allocations);
        Self::add(&self.allocated_bytes, class_size as u64);
        Self::add(&self.requested_bytes, requested as u64);
    }

    pub(crate) fn record_deallocation(&self) {
        Self::inc(&self.deallocations);
    }

    pub(crate) fn record_failed_allocation(&self) {
        Self::inc(&self.failed_allocations);
    }

    #[must_use]
    pub fn snapshot(&self) -> ClassCounters {
        ClassCounters {
            allocations: Self::get(&self.allocations),
            deallocations: Self::get(&self.deallocations),
            failed_allocations: Self::get(&self.failed_allocations),
            allocated_bytes: Self::get(&self.allocated_bytes),
            requested_bytes: Self::get(&self.requested_bytes),
        }
    }
}

/// Plain copy of a [`ClassMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassCounters {
    pub allocations: u64,
    pub deallocations: u64,
    pub failed_allocations: u64,
    pub allocated_bytes: u64,
    pub requested_bytes: u64,
}

impl ClassCounters {
    /// Requested bytes as a percentage of the class bytes handed out.
    /// Zero when nothing was allocated.
    #[must_use]
    pub fn efficiency_percent(&self) -> f64 {
        efficiency_percent(self.requested_bytes, self.allocated_bytes)
    }

    /// Field-wise sum.
    #[must_use]
    pub fn merged(self, other: Self) -> Self {
        Self {
            allocations: self.allocations + other.allocations,
            deallocations: self.deallocations + other.deallocations,
            failed_allocations: self.failed_allocations + other.failed_allocations,
            allocated_bytes: self.allocated_bytes + other.allocated_bytes,
            requested_bytes: self.requested_bytes + other.requested_bytes,
        }
    }
}

pub(crate) fn efficiency_percent(requested: u64, allocated: u64) -> f64 {
    if allocated == 0 {
        return 0.0;
    }
    requested as f64 / allocated as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = ClassMetrics::new();
        assert_eq!(m.snapshot(), ClassCounters::default());
    }

    #[test]
    fn records_accumulate() {
        let m = ClassMetrics::new();
        m.record_allocation(24, 17);
        m.record_allocation(24, 24);
        m.record_failed_allocation();
        m.record_deallocation();
        let snap = m.snapshot();
        assert_eq!(snap.allocations, 2);
        assert_eq!(snap.deallocations, 1);
        assert_eq!(snap.failed_allocations, 1);
        assert_eq!(snap.allocated_bytes, 48);
        assert_eq!(snap.requested_bytes, 41);
    }

    #[test]
    fn efficiency_is_requested_over_allocated() {
        let counters = ClassCounters {
            allocated_bytes: 64,
            requested_bytes: 48,
            ..ClassCounters::default()
        };
        assert!((counters.efficiency_percent() - 75.0).abs() < 1e-9);
        assert_eq!(ClassCounters::default().efficiency_percent(), 0.0);
    }

    #[test]
    fn merge_sums_fields() {
        let a = ClassCounters {
            allocations: 1,
            allocated_bytes: 8,
            ..ClassCounters::default()
        };
        let b = ClassCounters {
            allocations: 2,
            failed_allocations: 1,
            allocated_bytes: 16,
            ..ClassCounters::default()
        };
        let sum = a.merged(b);
        assert_eq!(sum.allocations, 3);
        assert_eq!(sum.failed_allocations, 1);
        assert_eq!(sum.allocated_bytes, 24);
    }
}
