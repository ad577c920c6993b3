//! Scenario drivers.
//!
//! Each scenario builds its own pools, runs a fixed workload, and returns an
//! outcome that renders as text or JSON and knows whether it passed. Random
//! choices come from a seeded [`XorShift64`] so runs are reproducible
//! (thread interleavings aside).

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use blockpool_core::size_class::{AllocatorReport, AllocatorSnapshot};
use blockpool_core::stats::StatisticsReport;
use blockpool_core::{Block, ClassBlock, FixedBlockPool, MAX_SMALL_SIZE, SizeClassAllocator};
use blockpool_core::{StatisticsSnapshot, config::DEFAULT_BLOCKS_PER_CLASS};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::error::HarnessError;
use crate::payload::{self, POINT_SIZE, Point, RECORD_SIZE, Record};
use crate::rng::XorShift64;

/// Every scenario the harness knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    Simple,
    Performance,
    Reuse,
    Threads,
    Compare,
    Race,
    TwoPools,
    SizeClasses,
}

impl Scenario {
    pub const ALL: [Scenario; 8] = [
        Scenario::Simple,
        Scenario::Performance,
        Scenario::Reuse,
        Scenario::Threads,
        Scenario::Compare,
        Scenario::Race,
        Scenario::TwoPools,
        Scenario::SizeClasses,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Simple => "simple",
            Scenario::Performance => "performance",
            Scenario::Reuse => "reuse",
            Scenario::Threads => "threads",
            Scenario::Compare => "compare",
            Scenario::Race => "race",
            Scenario::TwoPools => "two_pools",
            Scenario::SizeClasses => "size_classes",
        }
    }
}

/// Knobs shared by the scenarios.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioParams {
    pub seed: u64,
    /// Worker threads for `threads`.
    pub threads: usize,
    /// Iterations per worker for `threads`.
    pub iterations: usize,
    /// Allocate/free pairs timed by `compare`.
    pub operations: usize,
    /// Blocks per class for `size_classes`.
    pub blocks_per_class: usize,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            seed: 0xDEAD_BEEF,
            threads: 5,
            iterations: 20,
            operations: 10_000,
            blocks_per_class: DEFAULT_BLOCKS_PER_CLASS,
        }
    }
}

/// Run one scenario.
pub fn run(scenario: Scenario, params: &ScenarioParams) -> Result<ScenarioOutcome, HarnessError> {
    info!(scenario = scenario.name(), seed = params.seed, "running scenario");
    let outcome = match scenario {
        Scenario::Simple => ScenarioOutcome::Simple(simple()?),
        Scenario::Performance => ScenarioOutcome::Performance(performance(params.seed)?),
        Scenario::Reuse => ScenarioOutcome::Reuse(reuse()?),
        Scenario::Threads => ScenarioOutcome::Threads(threads(params)?),
        Scenario::Compare => ScenarioOutcome::Compare(compare(params.operations)?),
        Scenario::Race => ScenarioOutcome::Race(race(params.seed)?),
        Scenario::TwoPools => ScenarioOutcome::TwoPools(two_pools(params.seed)?),
        Scenario::SizeClasses => {
            ScenarioOutcome::SizeClasses(size_classes(params.blocks_per_class)?)
        }
    };
    Ok(outcome)
}

/// Result of one scenario run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "scenario", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Simple(SimpleOutcome),
    Performance(PerformanceOutcome),
    Reuse(ReuseOutcome),
    Threads(ThreadsOutcome),
    Compare(CompareOutcome),
    Race(RaceOutcome),
    TwoPools(TwoPoolsOutcome),
    SizeClasses(SizeClassOutcome),
}

impl ScenarioOutcome {
    pub fn scenario(&self) -> Scenario {
        match self {
            ScenarioOutcome::Simple(_) => Scenario::Simple,
            ScenarioOutcome::Performance(_) => Scenario::Performance,
            ScenarioOutcome::Reuse(_) => Scenario::Reuse,
            ScenarioOutcome::Threads(_) => Scenario::Threads,
            ScenarioOutcome::Compare(_) => Scenario::Compare,
            ScenarioOutcome::Race(_) => Scenario::Race,
            ScenarioOutcome::TwoPools(_) => Scenario::TwoPools,
            ScenarioOutcome::SizeClasses(_) => Scenario::SizeClasses,
        }
    }

    /// `Err` with a reason when the scenario's expectations were not met.
    pub fn check(&self) -> Result<(), HarnessError> {
        let failure = match self {
            ScenarioOutcome::Simple(o) => o.failure(),
            ScenarioOutcome::Performance(o) => o.failure(),
            ScenarioOutcome::Reuse(o) => o.failure(),
            ScenarioOutcome::Threads(o) => o.failure(),
            ScenarioOutcome::Compare(o) => o.failure(),
            ScenarioOutcome::Race(o) => o.failure(),
            ScenarioOutcome::TwoPools(o) => o.failure(),
            ScenarioOutcome::SizeClasses(o) => o.failure(),
        };
        match failure {
            None => Ok(()),
            Some(reason) => Err(HarnessError::ScenarioFailed {
                name: self.scenario().name(),
                reason,
            }),
        }
    }

    pub fn passed(&self) -> bool {
        self.check().is_ok()
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.scenario().name())?;
        match self {
            ScenarioOutcome::Simple(o) => fmt::Display::fmt(o, f),
            ScenarioOutcome::Performance(o) => fmt::Display::fmt(o, f),
            ScenarioOutcome::Reuse(o) => fmt::Display::fmt(o, f),
            ScenarioOutcome::Threads(o) => fmt::Display::fmt(o, f),
            ScenarioOutcome::Compare(o) => fmt::Display::fmt(o, f),
            ScenarioOutcome::Race(o) => fmt::Display::fmt(o, f),
            ScenarioOutcome::TwoPools(o) => fmt::Display::fmt(o, f),
            ScenarioOutcome::SizeClasses(o) => fmt::Display::fmt(o, f),
        }
    }
}

fn verdict(ok: bool) -> &'static str {
    if ok { "PASS" } else { "FAIL" }
}

// ---------------------------------------------------------------------------
// simple
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SimpleOutcome {
    pub capacity: usize,
    pub allocated: usize,
    pub rejected_overallocation: bool,
    pub reused_last_freed: bool,
    pub payloads_intact: bool,
    pub free_after_cleanup: usize,
    pub stats: StatisticsSnapshot,
}

impl SimpleOutcome {
    fn failure(&self) -> Option<String> {
        if self.allocated != self.capacity {
            return Some(format!("allocated {} of {}", self.allocated, self.capacity));
        }
        if !self.rejected_overallocation {
            return Some("over-allocation was not rejected".into());
        }
        if !self.reused_last_freed {
            return Some("reallocation did not reuse the last freed block".into());
        }
        if !self.payloads_intact {
            return Some("payload of a live block changed".into());
        }
        (self.free_after_cleanup != self.capacity)
            .then(|| format!("{} blocks free after cleanup", self.free_after_cleanup))
    }
}

impl fmt::Display for SimpleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Allocated {} of {} points", self.allocated, self.capacity)?;
        writeln!(
            f,
            "Over-allocation rejected: {}",
            verdict(self.rejected_overallocation)
        )?;
        writeln!(f, "Reuse of last freed block: {}", verdict(self.reused_last_freed))?;
        writeln!(f, "Payloads intact: {}", verdict(self.payloads_intact))?;
        writeln!(f, "{}", StatisticsReport(self.stats.clone()))
    }
}

fn simple() -> Result<SimpleOutcome, HarnessError> {
    const CAPACITY: usize = 5;
    let mut pool = FixedBlockPool::new(POINT_SIZE, CAPACITY)?;

    let mut points: Vec<Block> = Vec::new();
    for i in 0..CAPACITY as i32 {
        if let Some(block) = pool.allocate() {
            payload::write(block, &Point::new(i * 10, i * 20).encode());
            points.push(block);
        }
    }
    let allocated = points.len();
    let rejected_overallocation = pool.allocate().is_none();

    let mut last_freed = None;
    for _ in 0..2 {
        if let Some(block) = points.pop() {
            pool.deallocate(block);
            last_freed = Some(block);
        }
    }

    let reallocated = pool.allocate();
    let reused_last_freed = reallocated.is_some() && reallocated == last_freed;
    let survivors = points.len();
    if let Some(block) = reallocated {
        payload::write(block, &Point::new(100, 200).encode());
        points.push(block);
    }

    let payloads_intact = points[..survivors].iter().enumerate().all(|(i, &block)| {
        let i = i as i32;
        Point::decode(&payload::read(block, POINT_SIZE))
            .is_some_and(|p| p.x == i * 10 && p.y == i * 20)
    });

    let stats = pool.snapshot();
    for block in points {
        pool.deallocate(block);
    }

    Ok(SimpleOutcome {
        capacity: CAPACITY,
        allocated,
        rejected_overallocation,
        reused_last_freed,
        payloads_intact,
        free_after_cleanup: pool.free_blocks(),
        stats,
    })
}

// ---------------------------------------------------------------------------
// performance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceOutcome {
    pub capacity: usize,
    pub steps: usize,
    pub elapsed_us: f64,
    pub free_after_cleanup: usize,
    pub stats: StatisticsSnapshot,
}

impl PerformanceOutcome {
    fn failure(&self) -> Option<String> {
        if self.stats.failed_allocations != 0 {
            return Some(format!(
                "{} allocations failed",
                self.stats.failed_allocations
            ));
        }
        (self.free_after_cleanup != self.capacity)
            .then(|| format!("{} blocks free after cleanup", self.free_after_cleanup))
    }
}

impl fmt::Display for PerformanceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Steps: {} in {:.0} us", self.steps, self.elapsed_us)?;
        writeln!(f, "Peak usage: {}", self.stats.peak_usage)?;
        writeln!(f, "{}", StatisticsReport(self.stats.clone()))
    }
}

fn performance(seed: u64) -> Result<PerformanceOutcome, HarnessError> {
    const CAPACITY: usize = 1000;
    const STEPS: usize = 1000;
    let mut pool = FixedBlockPool::new(POINT_SIZE, CAPACITY)?;
    let mut rng = XorShift64::new(seed);
    let mut live: Vec<Block> = Vec::with_capacity(CAPACITY);

    let start = Instant::now();
    for step in 0..STEPS {
        if let Some(block) = pool.allocate() {
            let point = Point::new(rng.gen_range(0, 99) as i32, rng.gen_range(0, 99) as i32);
            payload::write(block, &point.encode());
            live.push(block);
        }
        if step % 7 == 0 && !live.is_empty() {
            let idx = rng.gen_range(0, live.len() - 1);
            pool.deallocate(live.swap_remove(idx));
        }
    }
    for block in live {
        pool.deallocate(block);
    }
    let elapsed_us = start.elapsed().as_secs_f64() * 1_000_000.0;

    Ok(PerformanceOutcome {
        capacity: CAPACITY,
        steps: STEPS,
        elapsed_us,
        free_after_cleanup: pool.free_blocks(),
        stats: pool.snapshot(),
    })
}

// ---------------------------------------------------------------------------
// reuse
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReuseOutcome {
    pub blocks: usize,
    pub reused: usize,
    pub stats: StatisticsSnapshot,
}

impl ReuseOutcome {
    fn failure(&self) -> Option<String> {
        (self.reused != self.blocks)
            .then(|| format!("only {} of {} addresses reused", self.reused, self.blocks))
    }
}

impl fmt::Display for ReuseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reused {} of {} addresses", self.reused, self.blocks)?;
        writeln!(f, "{}", StatisticsReport(self.stats.clone()))
    }
}

fn reuse() -> Result<ReuseOutcome, HarnessError> {
    const BLOCKS: usize = 10;
    let mut pool = FixedBlockPool::new(64, BLOCKS)?;

    let first: Vec<Block> = (0..BLOCKS).filter_map(|_| pool.allocate()).collect();
    let original: HashSet<usize> = first.iter().map(|b| b.as_ptr() as usize).collect();
    for block in first.into_iter().rev() {
        pool.deallocate(block);
    }

    let second: Vec<Block> = (0..BLOCKS).filter_map(|_| pool.allocate()).collect();
    let reused = second
        .iter()
        .filter(|b| original.contains(&(b.as_ptr() as usize)))
        .count();
    for block in second {
        pool.deallocate(block);
    }

    Ok(ReuseOutcome {
        blocks: BLOCKS,
        reused,
        stats: pool.snapshot(),
    })
}

// ---------------------------------------------------------------------------
// threads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ThreadsOutcome {
    pub threads: usize,
    pub iterations: usize,
    pub capacity: usize,
    pub allocations: u64,
    pub deallocations: u64,
    pub corrupted: u64,
    pub outstanding_before_cleanup: usize,
    pub free_after_cleanup: usize,
    pub stats: StatisticsSnapshot,
}

impl ThreadsOutcome {
    fn failure(&self) -> Option<String> {
        if self.corrupted != 0 {
            return Some(format!("{} records overwritten by another thread", self.corrupted));
        }
        if self.allocations != self.deallocations + self.outstanding_before_cleanup as u64 {
            return Some("allocation and deallocation counts disagree".into());
        }
        (self.free_after_cleanup != self.capacity)
            .then(|| format!("{} blocks free after cleanup", self.free_after_cleanup))
    }
}

impl fmt::Display for ThreadsOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} threads x {} iterations on {} blocks",
            self.threads, self.iterations, self.capacity
        )?;
        writeln!(
            f,
            "Allocations: {}, deallocations: {}, outstanding: {}",
            self.allocations, self.deallocations, self.outstanding_before_cleanup
        )?;
        writeln!(f, "Corrupted records: {}", self.corrupted)?;
        writeln!(f, "{}", StatisticsReport(self.stats.clone()))
    }
}

fn threads(params: &ScenarioParams) -> Result<ThreadsOutcome, HarnessError> {
    const CAPACITY: usize = 100;
    let pool = FixedBlockPool::new(RECORD_SIZE, CAPACITY)?;
    let outstanding: Mutex<Vec<Block>> = Mutex::new(Vec::new());
    let allocations = AtomicU64::new(0);
    let deallocations = AtomicU64::new(0);
    let corrupted = AtomicU64::new(0);
    let root = XorShift64::new(params.seed);

    thread::scope(|scope| {
        for worker in 1..=params.threads {
            let mut rng = root.fork(worker as u64);
            let (pool, outstanding) = (&pool, &outstanding);
            let (allocations, deallocations, corrupted) = (&allocations, &deallocations, &corrupted);
            scope.spawn(move || {
                for i in 0..params.iterations {
                    if let Some(block) = pool.allocate_thread_safe() {
                        allocations.fetch_add(1, Ordering::Relaxed);
                        outstanding.lock().push(block);

                        let id = (worker * 100 + i) as i32;
                        let record = Record {
                            id,
                            value: worker as f64 * 1.5 + i as f64 * 0.1,
                            description: format!("Thread {worker}, Iteration {i}"),
                        };
                        payload::write(block, &record.encode());
                        thread::yield_now();

                        if rng.gen_range(1, 100) < 50 {
                            let back = Record::decode(&payload::read(block, RECORD_SIZE));
                            if back.is_none_or(|r| r.id != id) {
                                corrupted.fetch_add(1, Ordering::Relaxed);
                            }
                            {
                                let mut held = outstanding.lock();
                                if let Some(pos) = held.iter().position(|&b| b == block) {
                                    held.swap_remove(pos);
                                }
                            }
                            pool.deallocate_thread_safe(block);
                            deallocations.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    thread::yield_now();
                }
            });
        }
    });

    let stats = pool.snapshot();
    let remaining = outstanding.into_inner();
    let outstanding_before_cleanup = remaining.len();
    for block in remaining {
        pool.deallocate_thread_safe(block);
    }

    Ok(ThreadsOutcome {
        threads: params.threads,
        iterations: params.iterations,
        capacity: CAPACITY,
        allocations: allocations.into_inner(),
        deallocations: deallocations.into_inner(),
        corrupted: corrupted.into_inner(),
        outstanding_before_cleanup,
        free_after_cleanup: pool.free_blocks(),
        stats,
    })
}

// ---------------------------------------------------------------------------
// compare
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CompareOutcome {
    pub operations: usize,
    pub exclusive_us: f64,
    pub locked_us: f64,
    pub exclusive_avg_us: f64,
    pub locked_avg_us: f64,
    pub pools_whole: bool,
}

impl CompareOutcome {
    fn failure(&self) -> Option<String> {
        (!self.pools_whole).then(|| "a pool lost blocks during timing".to_string())
    }
}

impl fmt::Display for CompareOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Operations: {}", self.operations)?;
        writeln!(
            f,
            "Exclusive (no lock): {:.0} us, {:.4} us/op",
            self.exclusive_us, self.exclusive_avg_us
        )?;
        writeln!(
            f,
            "Lock-guarded: {:.0} us, {:.4} us/op",
            self.locked_us, self.locked_avg_us
        )
    }
}

fn compare(operations: usize) -> Result<CompareOutcome, HarnessError> {
    const CAPACITY: usize = 200;
    let per_op = |us: f64| {
        if operations == 0 { 0.0 } else { us / operations as f64 }
    };

    let mut exclusive = FixedBlockPool::new(64, CAPACITY)?;
    let start = Instant::now();
    for _ in 0..operations {
        if let Some(block) = exclusive.allocate() {
            exclusive.deallocate(block);
        }
    }
    let exclusive_us = start.elapsed().as_secs_f64() * 1_000_000.0;

    let locked = FixedBlockPool::new(64, CAPACITY)?;
    let start = Instant::now();
    for _ in 0..operations {
        if let Some(block) = locked.allocate_thread_safe() {
            locked.deallocate_thread_safe(block);
        }
    }
    let locked_us = start.elapsed().as_secs_f64() * 1_000_000.0;

    Ok(CompareOutcome {
        operations,
        exclusive_us,
        locked_us,
        exclusive_avg_us: per_op(exclusive_us),
        locked_avg_us: per_op(locked_us),
        pools_whole: exclusive.free_blocks() == CAPACITY && locked.free_blocks() == CAPACITY,
    })
}

// ---------------------------------------------------------------------------
// race
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RaceOutcome {
    pub threads: usize,
    pub iterations: usize,
    pub allocations: u64,
    pub deallocations: u64,
    pub failed_allocations: u64,
    pub expected_free: usize,
    pub actual_free: usize,
    pub stats: StatisticsSnapshot,
}

impl RaceOutcome {
    fn failure(&self) -> Option<String> {
        if self.actual_free != self.expected_free {
            return Some(format!(
                "memory leak: {} of {} blocks free",
                self.actual_free, self.expected_free
            ));
        }
        if self.allocations != self.deallocations {
            return Some("allocation and deallocation counts disagree".into());
        }
        (self.stats.failed_allocations != self.failed_allocations)
            .then(|| "pool failure counter disagrees with workers".to_string())
    }
}

impl fmt::Display for RaceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total allocations: {}", self.allocations)?;
        writeln!(f, "Total deallocations: {}", self.deallocations)?;
        writeln!(f, "Failed allocations: {}", self.failed_allocations)?;
        writeln!(f, "Expected free blocks: {}", self.expected_free)?;
        writeln!(f, "Actual free blocks: {}", self.actual_free)?;
        writeln!(
            f,
            "No memory leaks: {}",
            verdict(self.actual_free == self.expected_free)
        )?;
        writeln!(f, "{}", StatisticsReport(self.stats.clone()))
    }
}

fn race(seed: u64) -> Result<RaceOutcome, HarnessError> {
    const BLOCKS: usize = 20;
    const THREADS: usize = 8;
    const ITERATIONS: usize = 100;
    let pool = FixedBlockPool::new(32, BLOCKS)?;
    let allocations = AtomicU64::new(0);
    let deallocations = AtomicU64::new(0);
    let failed = AtomicU64::new(0);
    let root = XorShift64::new(seed);

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let mut rng = root.fork(worker as u64);
            let pool = &pool;
            let (allocations, deallocations, failed) = (&allocations, &deallocations, &failed);
            scope.spawn(move || {
                let mut mine: Vec<Block> = Vec::new();
                for i in 0..ITERATIONS {
                    let Some(block) = pool.allocate_thread_safe() else {
                        failed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    };
                    allocations.fetch_add(1, Ordering::Relaxed);
                    let mut tag = [0_u8; 8];
                    tag[..4].copy_from_slice(&(worker as i32).to_le_bytes());
                    tag[4..].copy_from_slice(&(i as i32).to_le_bytes());
                    payload::write(block, &tag);
                    mine.push(block);

                    if rng.gen_range(0, 2) == 0 {
                        let idx = rng.gen_range(0, mine.len() - 1);
                        pool.deallocate_thread_safe(mine.swap_remove(idx));
                        deallocations.fetch_add(1, Ordering::Relaxed);
                    }
                }
                for block in mine {
                    pool.deallocate_thread_safe(block);
                    deallocations.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    Ok(RaceOutcome {
        threads: THREADS,
        iterations: ITERATIONS,
        allocations: allocations.into_inner(),
        deallocations: deallocations.into_inner(),
        failed_allocations: failed.into_inner(),
        expected_free: BLOCKS,
        actual_free: pool.free_blocks(),
        stats: pool.snapshot(),
    })
}

// ---------------------------------------------------------------------------
// two pools
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TwoPoolsOutcome {
    pub workers: usize,
    pub rounds: usize,
    pub paired_successes: u64,
    pub first_free: usize,
    pub second_free: usize,
    pub capacity: usize,
}

impl TwoPoolsOutcome {
    fn failure(&self) -> Option<String> {
        (self.first_free != self.capacity || self.second_free != self.capacity).then(|| {
            format!(
                "pools not whole: {} and {} of {} free",
                self.first_free, self.second_free, self.capacity
            )
        })
    }
}

impl fmt::Display for TwoPoolsOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Successful allocations from both pools: {}",
            self.paired_successes
        )?;
        writeln!(f, "Completed without deadlock ({} workers)", self.workers)
    }
}

fn two_pools(seed: u64) -> Result<TwoPoolsOutcome, HarnessError> {
    const CAPACITY: usize = 10;
    const WORKERS: usize = 8;
    const ROUNDS: usize = 50;
    let first = FixedBlockPool::new(64, CAPACITY)?;
    let second = FixedBlockPool::new(128, CAPACITY)?;
    let paired = AtomicU64::new(0);
    let root = XorShift64::new(seed);

    thread::scope(|scope| {
        for worker in 0..WORKERS {
            let mut rng = root.fork(worker as u64);
            let (first, second, paired) = (&first, &second, &paired);
            // Half the workers always take the pools in order, half pick randomly.
            let ordered = worker < WORKERS / 2;
            scope.spawn(move || {
                for _ in 0..ROUNDS {
                    let (a, b) = if ordered || rng.gen_range(0, 1) == 0 {
                        let a = first.allocate_thread_safe();
                        (a, second.allocate_thread_safe())
                    } else {
                        let b = second.allocate_thread_safe();
                        (first.allocate_thread_safe(), b)
                    };
                    if a.is_some() && b.is_some() {
                        paired.fetch_add(1, Ordering::Relaxed);
                    }
                    if a.is_some() {
                        first.deallocate_thread_safe(a);
                    }
                    if b.is_some() {
                        second.deallocate_thread_safe(b);
                    }
                }
            });
        }
    });

    Ok(TwoPoolsOutcome {
        workers: WORKERS,
        rounds: ROUNDS,
        paired_successes: paired.into_inner(),
        first_free: first.free_blocks(),
        second_free: second.free_blocks(),
        capacity: CAPACITY,
    })
}

// ---------------------------------------------------------------------------
// size classes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SizeClassOutcome {
    pub classes: Vec<usize>,
    pub round_trips: usize,
    pub round_trip_failures: usize,
    pub zero_rejected: bool,
    pub oversize_rejected: bool,
    pub pools_whole_after_cleanup: bool,
    pub snapshot: AllocatorSnapshot,
}

impl SizeClassOutcome {
    fn failure(&self) -> Option<String> {
        if self.round_trip_failures != 0 {
            return Some(format!("{} round trips failed", self.round_trip_failures));
        }
        if !self.zero_rejected {
            return Some("zero-byte request was served".into());
        }
        if !self.oversize_rejected {
            return Some("oversize request was served".into());
        }
        (!self.pools_whole_after_cleanup).then(|| "size class pools leaked blocks".to_string())
    }
}

impl fmt::Display for SizeClassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes: Vec<String> = self.classes.iter().map(ToString::to_string).collect();
        writeln!(f, "Size classes: {}", classes.join(", "))?;
        writeln!(
            f,
            "Round trips for sizes 1..={}: {} failed",
            self.round_trips, self.round_trip_failures
        )?;
        writeln!(f, "Zero-byte request rejected: {}", verdict(self.zero_rejected))?;
        writeln!(f, "Oversize request rejected: {}", verdict(self.oversize_rejected))?;
        writeln!(f, "{}", AllocatorReport(self.snapshot.clone()))
    }
}

fn size_classes(blocks_per_class: usize) -> Result<SizeClassOutcome, HarnessError> {
    const MIXED_SIZES: [usize; 8] = [8, 17, 24, 33, 100, 129, 500, 1000];
    let alloc = SizeClassAllocator::new(blocks_per_class)?;

    let mut round_trip_failures = 0;
    for size in 1..=MAX_SMALL_SIZE {
        let Some(block) = alloc.allocate(size) else {
            round_trip_failures += 1;
            continue;
        };
        let class = block.class_index();
        let before = alloc.free_blocks(class);
        alloc.deallocate(block, size);
        if alloc.free_blocks(class) != before.map(|n| n + 1) {
            round_trip_failures += 1;
        }
    }

    let zero_rejected = alloc.allocate(0).is_none();
    let oversize_rejected = alloc.allocate(MAX_SMALL_SIZE * 2).is_none();

    let held: Vec<(ClassBlock, usize)> = MIXED_SIZES
        .iter()
        .flat_map(|&size| std::iter::repeat_n(size, 3))
        .filter_map(|size| alloc.allocate(size).map(|block| (block, size)))
        .collect();
    let snapshot = alloc.snapshot();
    for (block, size) in held {
        alloc.deallocate(block, size);
    }
    let pools_whole_after_cleanup = (0..alloc.num_size_classes())
        .all(|index| alloc.free_blocks(index) == Some(blocks_per_class));

    Ok(SizeClassOutcome {
        classes: alloc.table().as_slice().to_vec(),
        round_trips: MAX_SMALL_SIZE,
        round_trip_failures,
        zero_rejected,
        oversize_rejected,
        pools_whole_after_cleanup,
        snapshot,
    })
}
