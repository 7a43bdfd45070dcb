//! End-to-end allocator scenarios: mixed traffic, cross-thread churn, and
//! the reclaim lifecycle.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fastmem_core::allocator::{FastAllocator, RegionConfig};
use fastmem_core::error::ReclaimOutcome;
use fastmem_core::pool::ObjectHooks;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn concurrent_churn_restores_accounting() {
    init_tracing();
    let ctx = Arc::new(FastAllocator::new("churn", 0, 0.80, None).unwrap());

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                for round in 0..200usize {
                    let size = (worker * 37 + round * 13) % 5000;
                    let mut buf = ctx.alloc(size).expect("unbudgeted alloc");
                    if !buf.is_empty() {
                        buf[0] = worker as u8;
                    }
                    ctx.free(buf);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(ctx.alloc_bytes(), 0);
}

#[test]
fn mixed_pooled_and_fallback_traffic() {
    let ctx = FastAllocator::new("mixed", 0, 0.80, None).unwrap();

    let small = ctx.alloc(100).unwrap();
    let medium = ctx.alloc(8_000).unwrap();
    let large = ctx.alloc(500_000).unwrap();
    assert!(ctx.malloc_bytes() >= large.charged_bytes() as i64);

    let outstanding =
        small.charged_bytes() + medium.charged_bytes() + large.charged_bytes();
    assert_eq!(ctx.alloc_bytes(), outstanding as i64);

    ctx.free(large);
    ctx.free(medium);
    ctx.free(small);
    assert_eq!(ctx.alloc_bytes(), 0);
}

#[test]
fn budget_pressure_fails_cleanly_under_threads() {
    init_tracing();
    let regions = [RegionConfig::new(0, 256, 8, 4)];
    let ctx = Arc::new(
        FastAllocator::with_regions(
            "pressure",
            0,
            ObjectHooks::none(),
            &regions,
            4096,
            0.80,
            None,
        )
        .unwrap(),
    );

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                let mut held = Vec::new();
                for _ in 0..50 {
                    if let Some(buf) = ctx.alloc(100) {
                        held.push(buf);
                    }
                }
                held
            })
        })
        .collect();

    let held: Vec<_> = workers
        .into_iter()
        .flat_map(|worker| worker.join().unwrap())
        .collect();

    assert!(!held.is_empty());
    let outstanding: u64 = held.iter().map(|buf| buf.charged_bytes()).sum();
    assert_eq!(ctx.alloc_bytes(), outstanding as i64);

    for buf in held {
        ctx.free(buf);
    }
    assert_eq!(ctx.alloc_bytes(), 0);
}

#[test]
fn reclaim_cycle_returns_idle_memory() {
    let regions = [RegionConfig::new(0, 256, 8, 32)];
    let ctx = FastAllocator::with_regions(
        "reclaim",
        0,
        ObjectHooks::none(),
        &regions,
        0,
        0.80,
        Some(Duration::ZERO),
    )
    .unwrap();

    let held: Vec<_> = (0..64).map(|_| ctx.alloc(100).unwrap()).collect();
    let committed = ctx.malloc_bytes();
    assert!(committed > 0);

    for buf in held {
        ctx.free(buf);
    }
    assert_eq!(ctx.alloc_bytes(), 0);

    match ctx.retry_reclaim() {
        ReclaimOutcome::Reclaimed(bytes) => assert_eq!(bytes as i64, committed),
        other => panic!("expected a reclaim, got {other:?}"),
    }
    assert_eq!(ctx.malloc_bytes(), 0);
}

#[test]
fn memdup_round_trips_through_the_ladder() {
    let ctx = FastAllocator::new("dup", 0, 0.80, None).unwrap();

    for len in [0usize, 1, 100, 5_000, 70_000] {
        let src: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let buf = ctx.memdup(&src).unwrap();
        assert_eq!(&buf[..len], &src[..]);
        ctx.free(buf);
    }
    assert_eq!(ctx.alloc_bytes(), 0);
}
