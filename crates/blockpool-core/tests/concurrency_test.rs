#![allow(unsafe_code)]

use blockpool_core::{Block, FixedBlockPool, SizeClassAllocator};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

#[test]
fn threads_sharing_one_pool_leave_no_leaks() {
    const THREADS: usize = 8;
    const CYCLES: usize = 500;
    const BLOCKS: usize = 20;

    let pool = Arc::new(FixedBlockPool::new(32, BLOCKS).expect("pool"));
    let allocations = Arc::new(AtomicU64::new(0));
    let deallocations = Arc::new(AtomicU64::new(0));
    let failures = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|thread_id| {
            let pool = Arc::clone(&pool);
            let allocations = Arc::clone(&allocations);
            let deallocations = Arc::clone(&deallocations);
            let failures = Arc::clone(&failures);
            thread::spawn(move || {
                let mut mine: Vec<Block> = Vec::new();
                for i in 0..CYCLES {
                    match pool.allocate_thread_safe() {
                        Some(block) => {
                            allocations.fetch_add(1, Ordering::Relaxed);
                            // SAFETY: this thread exclusively owns the live block.
                            let bytes = unsafe { block.as_mut_slice() };
                            bytes[0] = thread_id as u8;
                            bytes[1] = i as u8;
                            mine.push(block);
                        }
                        None => {
                            failures.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    if i % 3 == 0 {
                        if let Some(block) = mine.pop() {
                            // SAFETY: still owned by this thread.
                            let bytes = unsafe { block.as_slice() };
                            assert_eq!(bytes[0], thread_id as u8, "block shared between threads");
                            pool.deallocate_thread_safe(block);
                            deallocations.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                for block in mine {
                    pool.deallocate_thread_safe(block);
                    deallocations.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let allocations = allocations.load(Ordering::Relaxed);
    let deallocations = deallocations.load(Ordering::Relaxed);
    assert_eq!(allocations, deallocations);
    assert_eq!(pool.free_blocks(), BLOCKS);

    let stats = pool.statistics();
    assert_eq!(stats.allocations(), allocations);
    assert_eq!(stats.deallocations(), deallocations);
    assert_eq!(stats.failed_allocations(), failures.load(Ordering::Relaxed));
    assert_eq!(stats.current_usage(), 0);
    assert!(stats.peak_usage() <= BLOCKS);
}

#[test]
fn two_pools_in_both_orders_do_not_deadlock() {
    let first = Arc::new(FixedBlockPool::new(64, 10).expect("pool"));
    let second = Arc::new(FixedBlockPool::new(128, 10).expect("pool"));
    let paired = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let first = Arc::clone(&first);
            let second = Arc::clone(&second);
            let paired = Arc::clone(&paired);
            thread::spawn(move || {
                for _ in 0..200 {
                    let (a, b) = if worker % 2 == 0 {
                        (first.allocate_thread_safe(), second.allocate_thread_safe())
                    } else {
                        let b = second.allocate_thread_safe();
                        (first.allocate_thread_safe(), b)
                    };
                    if a.is_some() && b.is_some() {
                        paired.fetch_add(1, Ordering::Relaxed);
                    }
                    first.deallocate_thread_safe(a);
                    second.deallocate_thread_safe(b);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked");
    }
    assert!(paired.load(Ordering::Relaxed) > 0);
    assert_eq!(first.free_blocks(), 10);
    assert_eq!(second.free_blocks(), 10);
}

#[test]
fn size_class_allocator_is_shareable_across_threads() {
    let alloc = Arc::new(SizeClassAllocator::new(64).expect("allocator"));
    let sizes = [1_usize, 8, 24, 100, 500, 1024];

    thread::scope(|scope| {
        for (worker, &size) in sizes.iter().enumerate() {
            let alloc = Arc::clone(&alloc);
            scope.spawn(move || {
                for round in 0..300 {
                    let block = alloc.allocate(size).expect("class has room");
                    // SAFETY: block is live and owned by this thread.
                    let bytes = unsafe { block.block().as_mut_slice() };
                    bytes[..size].fill((worker + round) as u8);
                    if round % 2 == 0 {
                        alloc.deallocate(block, size);
                    } else {
                        alloc.free(block);
                    }
                }
            });
        }
    });

    let snap = alloc.snapshot();
    for class in &snap.classes {
        assert_eq!(class.free_blocks, 64);
        assert_eq!(class.counters.allocations, class.counters.deallocations);
    }
    assert_eq!(snap.totals.allocations, 6 * 300);
}
