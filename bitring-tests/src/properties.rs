//! Reference model and property checker for ring simulation tests.
//!
//! The [`ReferenceModel`] tracks the same state as a `WindowRing` with a
//! sparse `RoaringTreemap` and no ring arithmetic at all. The
//! [`PropertyChecker`] compares the two after every operation and records
//! every [`Violation`] it finds.

use bitring::{Offset, RingStats, WindowRing, MAX_BIT_CAPACITY, MIN_BIT_CAPACITY};
use roaring::RoaringTreemap;

// ============================================================================
// Reference Model
// ============================================================================

/// Straightforward commit tracker used as an oracle.
///
/// Complete offsets above the frontier live in a treemap; the frontier
/// advances by popping contiguous members.
#[derive(Debug, Default)]
pub struct ReferenceModel {
    lowest_marked: Option<u64>,
    highest_marked: Option<u64>,
    frontier: Option<u64>,
    complete: RoaringTreemap,
    highest_complete: Option<u64>,
}

impl ReferenceModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `offset` as pending. Returns false if it is rejected.
    pub fn mark_pending(&mut self, offset: u64) -> bool {
        if self.committable().is_some_and(|committable| offset <= committable) {
            return false;
        }
        if offset == u64::MAX
            || self
                .frontier
                .is_some_and(|frontier| offset - frontier >= MAX_BIT_CAPACITY)
        {
            return false;
        }
        self.highest_marked = Some(self.highest_marked.map_or(offset, |h| h.max(offset)));
        if self.lowest_marked.is_none() {
            self.lowest_marked = Some(offset);
            self.frontier = Some(offset);
        } else if self.frontier.is_none() {
            self.frontier = Some(offset);
        }
        true
    }

    /// Registers `offset` as complete.
    pub fn mark_complete(&mut self, offset: u64) {
        let (Some(frontier), Some(highest_marked)) = (self.frontier, self.highest_marked) else {
            return;
        };
        if offset < frontier || offset > highest_marked || !self.complete.insert(offset) {
            return;
        }
        self.highest_complete = Some(self.highest_complete.map_or(offset, |h| h.max(offset)));

        let mut frontier = frontier;
        while self.complete.remove(frontier) {
            frontier += 1;
        }
        self.frontier = (frontier <= highest_marked).then_some(frontier);
    }

    /// Clears all state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Highest offset with nothing pending below it.
    #[must_use]
    pub fn committable(&self) -> Option<u64> {
        match self.frontier {
            None => self.highest_marked,
            Some(frontier) => frontier.checked_sub(1),
        }
    }

    /// Highest offset in the window which is not complete.
    #[must_use]
    pub fn highest_pending(&self) -> Option<u64> {
        let frontier = self.frontier?;
        let mut offset = self.highest_marked?;
        while offset > frontier && self.complete.contains(offset) {
            offset -= 1;
        }
        Some(offset)
    }

    /// Expected ring stats. Capacity is not modelled and is passed through.
    #[must_use]
    pub fn expected(&self, bit_capacity: u64) -> RingStats {
        let pending_range_size = match (self.frontier, self.highest_marked) {
            (Some(low), Some(high)) => high + 1 - low,
            _ => 0,
        };
        let complete_range_size = match (self.frontier, self.highest_complete) {
            (Some(low), Some(high)) if high >= low => high + 1 - low,
            _ => 0,
        };
        RingStats {
            bit_capacity,
            lowest_marked: self.lowest_marked.map(Offset::new),
            highest_marked: self.highest_marked.map(Offset::new),
            lowest_pending: self.frontier.map(Offset::new),
            highest_pending: self.highest_pending().map(Offset::new),
            lowest_complete: self.frontier.and(self.complete.min()).map(Offset::new),
            highest_complete: self.highest_complete.map(Offset::new),
            committable_offset: self.committable().map(Offset::new),
            committable_count: self.complete.len(),
            pending_range_size,
            complete_range_size,
        }
    }
}

// ============================================================================
// Violations
// ============================================================================

/// All possible invariant violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Ring state differs from the reference model.
    StateMismatch {
        /// Operation index.
        step: u64,
        /// Observed ring state.
        ring: Box<RingStats>,
        /// Expected state.
        model: Box<RingStats>,
    },
    /// Ring and model disagree on whether a pending offset is accepted.
    AcceptanceMismatch {
        /// Operation index.
        step: u64,
        /// Offset marked pending.
        offset: u64,
        /// Whether the ring accepted it.
        ring_accepted: bool,
    },
    /// Committable offset moved backwards within an epoch.
    CommittableDecreased {
        /// Operation index.
        step: u64,
        /// Previous committable offset.
        old: u64,
        /// New committable offset.
        new: Option<u64>,
    },
    /// Capacity is not a power of two of at least the minimum.
    InvalidCapacity {
        /// Operation index.
        step: u64,
        /// Observed capacity.
        bit_capacity: u64,
    },
    /// Capacity does not cover the live complete range.
    CapacityBelowRange {
        /// Operation index.
        step: u64,
        /// Observed capacity.
        bit_capacity: u64,
        /// Live complete range.
        complete_range_size: u64,
    },
    /// Capacity stayed above 4x the complete range after the frontier moved.
    CapacityNotShrunk {
        /// Operation index.
        step: u64,
        /// Observed capacity.
        bit_capacity: u64,
        /// Live complete range.
        complete_range_size: u64,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StateMismatch { step, ring, model } => {
                write!(f, "step {step}: ring {ring:?} != model {model:?}")
            }
            Self::AcceptanceMismatch {
                step,
                offset,
                ring_accepted,
            } => write!(
                f,
                "step {step}: ring accepted={ring_accepted} for pending offset {offset}"
            ),
            Self::CommittableDecreased { step, old, new } => {
                write!(f, "step {step}: committable decreased from {old} to {new:?}")
            }
            Self::InvalidCapacity { step, bit_capacity } => {
                write!(f, "step {step}: invalid capacity {bit_capacity}")
            }
            Self::CapacityBelowRange {
                step,
                bit_capacity,
                complete_range_size,
            } => write!(
                f,
                "step {step}: capacity {bit_capacity} below complete range {complete_range_size}"
            ),
            Self::CapacityNotShrunk {
                step,
                bit_capacity,
                complete_range_size,
            } => write!(
                f,
                "step {step}: capacity {bit_capacity} not shrunk for complete range \
                 {complete_range_size}"
            ),
        }
    }
}

// ============================================================================
// Property Checker
// ============================================================================

/// Compares a ring against the reference model after every operation.
#[derive(Debug, Default)]
pub struct PropertyChecker {
    /// Committable offset at the previous check in this epoch.
    last_committable: Option<u64>,
    violations: Vec<Violation>,
    /// Number of checks performed.
    pub checks_performed: u64,
    /// Number of checks where the frontier advanced.
    pub frontier_advances: u64,
    /// Largest capacity observed.
    pub max_bit_capacity: u64,
}

impl PropertyChecker {
    /// Creates a checker with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets monotonicity history; call after resetting the ring.
    pub fn note_reset(&mut self) {
        self.last_committable = None;
    }

    /// Records a disagreement on `mark_pending` acceptance.
    pub fn check_acceptance(&mut self, step: u64, offset: u64, ring: bool, model: bool) {
        if ring != model {
            self.violations.push(Violation::AcceptanceMismatch {
                step,
                offset,
                ring_accepted: ring,
            });
        }
    }

    /// Checks every invariant. `completed` is true when the operation was a
    /// completion, the only transition that may move the frontier and shrink.
    pub fn check(&mut self, step: u64, ring: &WindowRing, model: &ReferenceModel, completed: bool) {
        self.checks_performed += 1;
        let stats = ring.stats();
        let bit_capacity = stats.bit_capacity;
        self.max_bit_capacity = self.max_bit_capacity.max(bit_capacity);

        // 1. Every accessor agrees with the model.
        let expected = model.expected(bit_capacity);
        if stats != expected {
            self.violations.push(Violation::StateMismatch {
                step,
                ring: Box::new(stats),
                model: Box::new(expected),
            });
        }

        // 2. Capacity is a power of two covering the live range.
        if !bit_capacity.is_power_of_two() || bit_capacity < MIN_BIT_CAPACITY {
            self.violations
                .push(Violation::InvalidCapacity { step, bit_capacity });
        }
        if stats.complete_range_size > bit_capacity {
            self.violations.push(Violation::CapacityBelowRange {
                step,
                bit_capacity,
                complete_range_size: stats.complete_range_size,
            });
        }

        // 3. Commit progress is monotonic.
        let committable = stats.committable_offset.map(Offset::get);
        if let Some(old) = self.last_committable {
            if committable.map_or(true, |new| new < old) {
                self.violations.push(Violation::CommittableDecreased {
                    step,
                    old,
                    new: committable,
                });
            }
        }
        let advanced = committable > self.last_committable;
        self.last_committable = committable;

        // 4. Memory stays bounded once the frontier moves.
        if completed && advanced {
            self.frontier_advances += 1;
            let bound = MIN_BIT_CAPACITY.max(4 * stats.complete_range_size);
            if bit_capacity > bound {
                self.violations.push(Violation::CapacityNotShrunk {
                    step,
                    bit_capacity,
                    complete_range_size: stats.complete_range_size,
                });
            }
        }
    }

    /// Returns all violations found so far.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Returns true if no violations were found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Prints a one-line summary.
    pub fn print_summary(&self, label: &str) {
        println!(
            "{}: checks={}, frontier_advances={}, max_bit_capacity={}, violations={}",
            label,
            self.checks_performed,
            self.frontier_advances,
            self.max_bit_capacity,
            self.violations.len()
        );
    }
}
