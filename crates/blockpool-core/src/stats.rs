//! Per-pool usage statistics.
//!
//! `Statistics` is a plain aggregate with no synchronization of its own. A
//! [`FixedBlockPool`](crate::pool::FixedBlockPool) keeps it behind the same
//! mutex as the free list it describes, so every update happens together
//! with the pop or push it records.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Below this much elapsed time the throughput is reported as zero.
const THROUGHPUT_EPSILON: Duration = Duration::from_micros(1);

/// Counters and timers for one pool.
#[derive(Debug, Clone)]
pub struct Statistics {
    total_allocations: u64,
    total_deallocations: u64,
    current_usage: usize,
    peak_usage: usize,
    failed_allocations: u64,
    total_bytes_allocated: u64,
    total_allocation_time: Duration,
    total_deallocation_time: Duration,
    start: Instant,
}

impl Statistics {
    /// Create zeroed statistics; the throughput clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_allocations: 0,
            total_deallocations: 0,
            current_usage: 0,
            peak_usage: 0,
            failed_allocations: 0,
            total_bytes_allocated: 0,
            total_allocation_time: Duration::ZERO,
            total_deallocation_time: Duration::ZERO,
            start: Instant::now(),
        }
    }

    /// Record a successful allocation of a `block_size`-byte block.
    pub fn record_allocation(&mut self, block_size: usize, duration: Duration) {
        self.total_allocations += 1;
        self.current_usage += 1;
        self.total_bytes_allocated += block_size as u64;
        self.total_allocation_time += duration;
        if self.current_usage > self.peak_usage {
            self.peak_usage = self.current_usage;
        }
    }

    /// Record a deallocation. Current usage never drops below zero.
    pub fn record_deallocation(&mut self, duration: Duration) {
        self.total_deallocations += 1;
        if self.current_usage > 0 {
            self.current_usage -= 1;
        }
        self.total_deallocation_time += duration;
    }

    /// Record an allocation that found the free list empty.
    pub fn record_failed_allocation(&mut self) {
        self.failed_allocations += 1;
    }

    /// Zero every counter and restart the throughput clock.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn allocations(&self) -> u64 {
        self.total_allocations
    }

    pub fn deallocations(&self) -> u64 {
        self.total_deallocations
    }

    pub fn current_usage(&self) -> usize {
        self.current_usage
    }

    pub fn peak_usage(&self) -> usize {
        self.peak_usage
    }

    pub fn failed_allocations(&self) -> u64 {
        self.failed_allocations
    }

    pub fn total_bytes_allocated(&self) -> u64 {
        self.total_bytes_allocated
    }

    /// Blocks not in use out of `total_blocks`.
    pub fn free_blocks(&self, total_blocks: usize) -> usize {
        total_blocks.saturating_sub(self.current_usage)
    }

    /// Wall time since construction or the last reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Percentage of `total_blocks` currently handed out.
    pub fn utilization_rate(&self, total_blocks: usize) -> f64 {
        if total_blocks == 0 {
            return 0.0;
        }
        self.current_usage as f64 / total_blocks as f64 * 100.0
    }

    /// Mean allocation latency in microseconds.
    pub fn average_allocation_time_us(&self) -> f64 {
        average_us(self.total_allocation_time, self.total_allocations)
    }

    /// Mean deallocation latency in microseconds.
    pub fn average_deallocation_time_us(&self) -> f64 {
        average_us(self.total_deallocation_time, self.total_deallocations)
    }

    /// Allocations plus deallocations per second of wall time.
    pub fn operations_per_second(&self) -> f64 {
        self.operations_per_second_over(self.elapsed())
    }

    fn operations_per_second_over(&self, elapsed: Duration) -> f64 {
        if elapsed < THROUGHPUT_EPSILON {
            return 0.0;
        }
        (self.total_allocations + self.total_deallocations) as f64 / elapsed.as_secs_f64()
    }

    /// Capture every counter and derived metric.
    #[must_use]
    pub fn snapshot(&self, total_blocks: usize) -> StatisticsSnapshot {
        let elapsed = self.elapsed();
        StatisticsSnapshot {
            total_blocks,
            current_usage: self.current_usage,
            free_blocks: self.free_blocks(total_blocks),
            peak_usage: self.peak_usage,
            allocations: self.total_allocations,
            deallocations: self.total_deallocations,
            failed_allocations: self.failed_allocations,
            total_bytes_allocated: self.total_bytes_allocated,
            utilization_percent: self.utilization_rate(total_blocks),
            average_allocation_us: self.average_allocation_time_us(),
            average_deallocation_us: self.average_deallocation_time_us(),
            operations_per_second: self.operations_per_second_over(elapsed),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Human-readable report for a pool of `total_blocks` blocks.
    #[must_use]
    pub fn report(&self, total_blocks: usize) -> StatisticsReport {
        StatisticsReport(self.snapshot(total_blocks))
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

fn average_us(total: Duration, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total.as_secs_f64() * 1_000_000.0 / count as f64
}

/// Point-in-time copy of a pool's statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub total_blocks: usize,
    pub current_usage: usize,
    pub free_blocks: usize,
    pub peak_usage: usize,
    pub allocations: u64,
    pub deallocations: u64,
    pub failed_allocations: u64,
    pub total_bytes_allocated: u64,
    pub utilization_percent: f64,
    pub average_allocation_us: f64,
    pub average_deallocation_us: f64,
    pub operations_per_second: f64,
    pub elapsed_ms: u64,
}

/// Text rendering of a [`StatisticsSnapshot`].
#[derive(Debug, Clone)]
pub struct StatisticsReport(pub StatisticsSnapshot);

impl fmt::Display for StatisticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        writeln!(f, "=== Memory Pool Statistics Report ===")?;
        writeln!(f, "Running Time: {}ms", s.elapsed_ms)?;
        writeln!(f, "Total Blocks: {}", s.total_blocks)?;
        writeln!(f, "Currently Used Blocks: {}", s.current_usage)?;
        writeln!(f, "Free Blocks: {}", s.free_blocks)?;
        writeln!(f, "Usage Rate: {:.2}%", s.utilization_percent)?;
        writeln!(f, "Peak Usage Blocks: {}", s.peak_usage)?;
        writeln!(f)?;
        writeln!(f, "Operation Statistics:")?;
        writeln!(f, "  Allocations: {}", s.allocations)?;
        writeln!(f, "  Deallocations: {}", s.deallocations)?;
        writeln!(f, "  Failed Allocations: {}", s.failed_allocations)?;
        writeln!(f, "  Total Allocated Bytes: {}", s.total_bytes_allocated)?;
        writeln!(f)?;
        writeln!(f, "Performance Statistics:")?;
        writeln!(f, "  Average Allocation Time: {:.3} us", s.average_allocation_us)?;
        writeln!(
            f,
            "  Average Deallocation Time: {:.3} us",
            s.average_deallocation_us
        )?;
        writeln!(f, "  Operations Per Second: {:.0} ops/s", s.operations_per_second)?;
        write!(f, "=====================================")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let stats = Statistics::new();
        assert_eq!(stats.allocations(), 0);
        assert_eq!(stats.deallocations(), 0);
        assert_eq!(stats.current_usage(), 0);
        assert_eq!(stats.peak_usage(), 0);
        assert_eq!(stats.failed_allocations(), 0);
        assert_eq!(stats.average_allocation_time_us(), 0.0);
        assert_eq!(stats.average_deallocation_time_us(), 0.0);
    }

    #[test]
    fn allocation_updates_peak() {
        let mut stats = Statistics::new();
        stats.record_allocation(64, Duration::from_micros(2));
        stats.record_allocation(64, Duration::from_micros(4));
        stats.record_deallocation(Duration::from_micros(1));
        assert_eq!(stats.allocations(), 2);
        assert_eq!(stats.current_usage(), 1);
        assert_eq!(stats.peak_usage(), 2);
        assert_eq!(stats.total_bytes_allocated(), 128);
        assert!((stats.average_allocation_time_us() - 3.0).abs() < 1e-9);
        assert!((stats.average_deallocation_time_us() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn deallocation_floors_at_zero() {
        let mut stats = Statistics::new();
        stats.record_deallocation(Duration::ZERO);
        stats.record_deallocation(Duration::ZERO);
        assert_eq!(stats.deallocations(), 2);
        assert_eq!(stats.current_usage(), 0);
    }

    #[test]
    fn failure_touches_only_its_counter() {
        let mut stats = Statistics::new();
        stats.record_failed_allocation();
        assert_eq!(stats.failed_allocations(), 1);
        assert_eq!(stats.allocations(), 0);
        assert_eq!(stats.current_usage(), 0);
    }

    #[test]
    fn utilization_and_free_blocks() {
        let mut stats = Statistics::new();
        for _ in 0..3 {
            stats.record_allocation(8, Duration::ZERO);
        }
        assert!((stats.utilization_rate(4) - 75.0).abs() < 1e-9);
        assert_eq!(stats.utilization_rate(0), 0.0);
        assert_eq!(stats.free_blocks(4), 1);
        assert_eq!(stats.free_blocks(2), 0);
    }

    #[test]
    fn throughput_is_zero_below_epsilon() {
        let mut stats = Statistics::new();
        stats.record_allocation(8, Duration::ZERO);
        assert_eq!(stats.operations_per_second_over(Duration::ZERO), 0.0);
        let ops = stats.operations_per_second_over(Duration::from_millis(500));
        assert!((ops - 2.0).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_everything() {
        let mut stats = Statistics::new();
        stats.record_allocation(16, Duration::from_micros(5));
        stats.record_failed_allocation();
        stats.reset();
        assert_eq!(stats.allocations(), 0);
        assert_eq!(stats.current_usage(), 0);
        assert_eq!(stats.peak_usage(), 0);
        assert_eq!(stats.failed_allocations(), 0);
        assert_eq!(stats.total_bytes_allocated(), 0);
        assert_eq!(stats.average_allocation_time_us(), 0.0);
    }

    #[test]
    fn snapshot_serializes() {
        let mut stats = Statistics::new();
        stats.record_allocation(32, Duration::from_micros(1));
        let snap = stats.snapshot(10);
        assert_eq!(snap.free_blocks, 9);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["allocations"], 1);
        assert_eq!(json["total_blocks"], 10);
        assert_eq!(json["total_bytes_allocated"], 32);
    }

    #[test]
    fn report_mentions_counters() {
        let mut stats = Statistics::new();
        stats.record_allocation(48, Duration::ZERO);
        let text = stats.report(5).to_string();
        assert!(text.contains("Total Blocks: 5"));
        assert!(text.contains("Currently Used Blocks: 1"));
        assert!(text.contains("Usage Rate: 20.00%"));
        assert!(text.contains("Total Allocated Bytes: 48"));
    }
}
