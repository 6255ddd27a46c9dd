//! Window ring DST tests.
//!
//! Deterministic simulation of consumer workloads against `WindowRing` with:
//! - Model equivalence checked after every operation
//! - Commit monotonicity and memory bound checks
//! - Order independence across completion orders
//! - Exact replay for a fixed seed

// Test-specific lint allowances.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::uninlined_format_args)]

use bitring::{Offset, RingConfig, RingStats, WindowRing};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::init_tracing;
use crate::properties::{PropertyChecker, ReferenceModel};
use crate::scenarios::seeds::{CI_SEED_COUNT, REGRESSION_SEEDS};
use crate::scenarios::{generate, RingOp, WorkloadConfig};

// ============================================================================
// Harness
// ============================================================================

/// Outcome of running one workload.
struct RunSummary {
    checker: PropertyChecker,
    /// Ring state after every operation.
    trace: Vec<RingStats>,
    accepted_pending: u64,
    rejected_pending: u64,
}

/// Applies `ops` to a fresh ring and reference model, checking every
/// property after each step.
fn run_ops(ops: &[RingOp], initial_bit_capacity: u64) -> RunSummary {
    let mut ring = WindowRing::with_config(&RingConfig::new(initial_bit_capacity));
    let mut model = ReferenceModel::new();
    let mut summary = RunSummary {
        checker: PropertyChecker::new(),
        trace: Vec::with_capacity(ops.len()),
        accepted_pending: 0,
        rejected_pending: 0,
    };

    for (step, op) in ops.iter().enumerate() {
        let step = step as u64;
        let completed = match *op {
            RingOp::MarkPending(offset) => {
                let before = ring.stats();
                let ring_accepted = ring.mark_pending(offset).is_ok();
                let model_accepted = model.mark_pending(offset.get());
                summary
                    .checker
                    .check_acceptance(step, offset.get(), ring_accepted, model_accepted);
                if ring_accepted {
                    summary.accepted_pending += 1;
                } else {
                    summary.rejected_pending += 1;
                    assert_eq!(ring.stats(), before, "step {step}: rejected pending mutated ring");
                }
                false
            }
            RingOp::MarkComplete(offset) => {
                ring.mark_complete(offset);
                model.mark_complete(offset.get());
                true
            }
            RingOp::Reset(bit_capacity) => {
                ring.reset(bit_capacity);
                model.reset();
                summary.checker.note_reset();
                false
            }
        };
        summary.checker.check(step, &ring, &model, completed);
        summary.trace.push(ring.stats());
    }
    summary
}

fn run_workload(config: &WorkloadConfig) -> RunSummary {
    run_ops(&generate(config), 64)
}

/// Marks `count` offsets from `base` and completes them in `order`, given as
/// offsets relative to `base`.
fn run_ordered(base: u64, count: u64, order: &[u64]) -> RunSummary {
    let ops: Vec<RingOp> = (0..count)
        .map(|rel| RingOp::MarkPending(Offset::new(base + rel)))
        .chain(order.iter().map(|rel| RingOp::MarkComplete(Offset::new(base + rel))))
        .collect();
    run_ops(&ops, 64)
}

// ============================================================================
// Model Equivalence
// ============================================================================

#[test]
fn test_dst_ring_regression_seeds() {
    init_tracing();
    for &seed in REGRESSION_SEEDS {
        let summary = run_workload(&WorkloadConfig::new(seed));
        assert!(
            summary.checker.is_clean(),
            "seed {}: {:?}",
            seed,
            summary.checker.violations()
        );
        assert!(summary.checker.frontier_advances > 0, "seed {}: frontier never moved", seed);
    }
}

#[test]
fn test_dst_ring_ci_seeds() {
    init_tracing();
    let mut total_checks = 0u64;
    let mut total_rejected = 0u64;

    for i in 0..u64::from(CI_SEED_COUNT) {
        let seed = i * 12345 + 42;
        let summary = run_workload(&WorkloadConfig::new(seed).with_op_count(2_000));
        if !summary.checker.is_clean() {
            summary.checker.print_summary(&format!("seed {seed}"));
            for violation in summary.checker.violations().iter().take(5) {
                println!("  {violation}");
            }
        }
        assert!(summary.checker.is_clean(), "seed {} failed", seed);
        total_checks += summary.checker.checks_performed;
        total_rejected += summary.rejected_pending;
    }

    assert_eq!(total_checks, u64::from(CI_SEED_COUNT) * 2_000);
    assert!(total_rejected > 0, "regressing pending offsets should be rejected");
}

#[test]
fn test_dst_ring_rejected_pending_counted() {
    init_tracing();
    let mut accepted = 0u64;
    let mut rejected = 0u64;
    for &seed in REGRESSION_SEEDS {
        let summary = run_workload(&WorkloadConfig::new(seed).without_resets());
        assert!(summary.checker.is_clean(), "seed {}: {:?}", seed, summary.checker.violations());
        accepted += summary.accepted_pending;
        rejected += summary.rejected_pending;
    }
    assert!(accepted > rejected);
    assert!(rejected > 0);
}

// ============================================================================
// Window Size
// ============================================================================

#[test]
fn test_dst_ring_stalled_frontier_grows() {
    init_tracing();
    for &seed in REGRESSION_SEEDS {
        // The oldest offset is never finished while others are outstanding.
        let config = WorkloadConfig::new(seed)
            .with_stall_probability(1.0)
            .without_resets();
        let summary = run_workload(&config);

        assert!(summary.checker.is_clean(), "seed {}: {:?}", seed, summary.checker.violations());
        assert!(
            summary.checker.max_bit_capacity > 256,
            "seed {}: window never grew ({})",
            seed,
            summary.checker.max_bit_capacity
        );
    }
}

#[test]
fn test_dst_ring_grows_then_shrinks() {
    init_tracing();
    const BASE: u64 = 1_000_000;
    const COUNT: u64 = 20_000;
    const HELD: u64 = 15_000;

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut order: Vec<u64> = (1..COUNT).filter(|rel| *rel != HELD).collect();
    order.shuffle(&mut rng);

    let mut ring = WindowRing::new(64);
    for rel in 0..COUNT {
        ring.mark_pending(Offset::new(BASE + rel)).unwrap();
    }
    for &rel in &order {
        ring.mark_complete(Offset::new(BASE + rel));
    }
    assert_eq!(ring.bit_capacity(), 32_768);
    assert_eq!(ring.committable_offset(), Some(Offset::new(BASE - 1)));
    assert_eq!(ring.committable_count(), COUNT - 2);

    // The base releases everything up to the held offset.
    ring.mark_complete(Offset::new(BASE));
    assert_eq!(ring.committable_offset(), Some(Offset::new(BASE + HELD - 1)));
    assert_eq!(ring.complete_range_size(), COUNT - HELD);
    assert_eq!(ring.bit_capacity(), 16_384);
    assert!(ring.bit_capacity() <= 4 * ring.complete_range_size());

    ring.mark_complete(Offset::new(BASE + HELD));
    assert!(ring.is_idle());
    assert_eq!(ring.committable_offset(), Some(Offset::new(BASE + COUNT - 1)));
    assert_eq!(ring.bit_capacity(), 64);

    // Same run against the model.
    let mut full_order = order;
    full_order.push(0);
    full_order.push(HELD);
    let summary = run_ordered(BASE, COUNT, &full_order);
    assert!(summary.checker.is_clean(), "{:?}", summary.checker.violations());
}

// ============================================================================
// Order Independence
// ============================================================================

#[test]
fn test_dst_ring_order_independence() {
    init_tracing();
    const BASE: u64 = 1_000_000;
    const COUNT: u64 = 3_000;

    let forward: Vec<u64> = (0..COUNT).collect();
    let reverse: Vec<u64> = (0..COUNT).rev().collect();
    let mut orders = vec![("forward", forward.clone()), ("reverse", reverse)];
    for &seed in REGRESSION_SEEDS {
        let mut shuffled = forward.clone();
        shuffled.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        orders.push(("shuffled", shuffled));
    }

    for (label, order) in &orders {
        let summary = run_ordered(BASE, COUNT, order);
        assert!(summary.checker.is_clean(), "{}: {:?}", label, summary.checker.violations());

        let last = summary.trace.last().copied().unwrap_or_default();
        assert_eq!(last.committable_offset, Some(Offset::new(BASE + COUNT - 1)), "{}", label);
        assert_eq!(last.committable_count, 0, "{}", label);
        assert_eq!(last.lowest_pending, None, "{}", label);
        assert_eq!(last.bit_capacity, 64, "{}", label);
    }
}

// ============================================================================
// Epochs
// ============================================================================

#[test]
fn test_dst_ring_reset_across_epochs() {
    init_tracing();
    let mut rng = ChaCha8Rng::seed_from_u64(7777);
    let mut ring = WindowRing::default();
    let mut checker = PropertyChecker::new();
    let mut step = 0u64;

    // Later epochs may start below earlier ones.
    for (base, bit_capacity) in [(5_000u64, 0u64), (100, 100), (1 << 40, 4096), (0, 64)] {
        ring.reset(bit_capacity);
        checker.note_reset();
        let mut model = ReferenceModel::new();

        let mut order: Vec<u64> = (base..base + 500).collect();
        for &offset in &order {
            ring.mark_pending(Offset::new(offset)).unwrap();
            assert!(model.mark_pending(offset));
            checker.check(step, &ring, &model, false);
            step += 1;
        }
        order.shuffle(&mut rng);
        for &offset in &order {
            ring.mark_complete(Offset::new(offset));
            model.mark_complete(offset);
            checker.check(step, &ring, &model, true);
            step += 1;
        }

        assert!(ring.is_idle());
        assert_eq!(ring.lowest_marked_offset(), Some(Offset::new(base)));
        assert_eq!(ring.committable_offset(), Some(Offset::new(base + 499)));
    }

    assert!(checker.is_clean(), "{:?}", checker.violations());
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_determinism_exact_replay() {
    init_tracing();
    let config = WorkloadConfig::new(0xCAFE_BABE);

    let first = run_workload(&config);
    let second = run_workload(&config);

    assert_eq!(first.trace, second.trace);
    assert_eq!(first.accepted_pending, second.accepted_pending);
    assert_eq!(first.rejected_pending, second.rejected_pending);
    assert_eq!(first.checker.frontier_advances, second.checker.frontier_advances);
    assert_eq!(first.checker.max_bit_capacity, second.checker.max_bit_capacity);
}
