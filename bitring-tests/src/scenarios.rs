//! Reusable workloads for ring simulation.
//!
//! A workload is a deterministic sequence of [`RingOp`]s generated from a
//! seed, shaped like a consumer that leases offsets in order and finishes
//! them out of order across many workers.

use bitring::Offset;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Seeds for reproducible testing.
pub mod seeds {
    /// Standard test seeds that have historically found bugs.
    pub const REGRESSION_SEEDS: &[u64] = &[
        42,
        12345,
        0xDEAD_BEEF,
        999,
        7777,
        0x1337,
        0xCAFE_BABE,
        1,
        u64::MAX,
        0,
    ];

    /// Number of random seeds to test in CI.
    pub const CI_SEED_COUNT: u32 = 100;
}

/// A single operation applied to a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingOp {
    /// Register an offset as in flight.
    MarkPending(Offset),
    /// Finish an offset.
    MarkComplete(Offset),
    /// Clear the ring for a new epoch with the given bit capacity.
    Reset(u64),
}

/// Shape of a generated workload.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Seed for the workload RNG.
    pub seed: u64,
    /// Number of operations to generate.
    pub op_count: u32,
    /// Maximum offsets leased per pending batch.
    pub max_batch: u32,
    /// Probability of skipping a few offsets when leasing.
    pub gap_probability: f64,
    /// Probability that the lowest outstanding offset is held back on a
    /// completion step, letting the window grow.
    pub stall_probability: f64,
    /// Probability of re-delivering an already finished offset.
    pub redelivery_probability: f64,
    /// Probability of re-marking an offset that may already be committed.
    pub regress_probability: f64,
    /// Probability of resetting the ring.
    pub reset_probability: f64,
}

impl WorkloadConfig {
    /// Creates a default workload for the given seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            op_count: 5_000,
            max_batch: 8,
            gap_probability: 0.05,
            stall_probability: 0.5,
            redelivery_probability: 0.05,
            regress_probability: 0.02,
            reset_probability: 0.002,
        }
    }

    /// Sets the number of operations.
    #[must_use]
    pub const fn with_op_count(mut self, op_count: u32) -> Self {
        self.op_count = op_count;
        self
    }

    /// Sets the stall probability.
    #[must_use]
    pub fn with_stall_probability(mut self, probability: f64) -> Self {
        self.stall_probability = probability;
        self
    }

    /// Disables resets, so the workload covers a single epoch.
    #[must_use]
    pub fn without_resets(mut self) -> Self {
        self.reset_probability = 0.0;
        self
    }
}

/// Generates a deterministic operation sequence.
#[must_use]
pub fn generate(config: &WorkloadConfig) -> Vec<RingOp> {
    const RESET_CAPACITIES: [u64; 4] = [0, 64, 100, 1024];

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut ops = Vec::with_capacity(config.op_count as usize);

    let mut next_offset: u64 = rng.gen_range(0..1_000);
    // Offsets handed out but not yet finished, in lease order.
    let mut outstanding: Vec<u64> = Vec::new();
    let mut finished: Vec<u64> = Vec::new();

    while ops.len() < config.op_count as usize {
        if rng.gen_bool(config.reset_probability) {
            ops.push(RingOp::Reset(RESET_CAPACITIES[rng.gen_range(0..RESET_CAPACITIES.len())]));
            next_offset = rng.gen_range(0..1_000);
            outstanding.clear();
            finished.clear();
            continue;
        }

        if rng.gen_bool(config.regress_probability) {
            let offset = rng.gen_range(0..=next_offset);
            ops.push(RingOp::MarkPending(Offset::new(offset)));
            continue;
        }

        if !finished.is_empty() && rng.gen_bool(config.redelivery_probability) {
            let offset = finished[rng.gen_range(0..finished.len())];
            ops.push(RingOp::MarkComplete(Offset::new(offset)));
            continue;
        }

        let lease = outstanding.len() < 4 || rng.gen_bool(0.15);
        if lease {
            if rng.gen_bool(config.gap_probability) {
                // Skipped offsets are never marked but still block commit.
                let gap = rng.gen_range(1..4);
                outstanding.extend(next_offset..next_offset + gap);
                next_offset += gap;
            }
            let batch = rng.gen_range(1..=config.max_batch);
            for _ in 0..batch {
                ops.push(RingOp::MarkPending(Offset::new(next_offset)));
                outstanding.push(next_offset);
                next_offset += 1;
            }
            continue;
        }

        // Finish any outstanding offset; the oldest one is often held back.
        let start = usize::from(outstanding.len() > 1 && rng.gen_bool(config.stall_probability));
        let index = rng.gen_range(start..outstanding.len());
        let offset = outstanding.remove(index);
        ops.push(RingOp::MarkComplete(Offset::new(offset)));
        finished.push(offset);
        if finished.len() > 64 {
            finished.remove(0);
        }
    }

    ops.truncate(config.op_count as usize);
    debug!(seed = config.seed, ops = ops.len(), "Generated ring workload");
    ops
}
