//! Ring configuration.

use crate::bits::MIN_BIT_CAPACITY;

/// Configuration for a [`WindowRing`](crate::WindowRing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConfig {
    /// Requested bit capacity at construction, rounded up to a power of two
    /// of at least 64 bits.
    pub initial_bit_capacity: u64,
}

impl RingConfig {
    /// Creates a new ring configuration.
    #[must_use]
    pub const fn new(initial_bit_capacity: u64) -> Self {
        Self {
            initial_bit_capacity,
        }
    }

    /// Sets the initial bit capacity.
    #[must_use]
    pub const fn with_initial_bit_capacity(mut self, bits: u64) -> Self {
        self.initial_bit_capacity = bits;
        self
    }

    /// Creates a configuration for testing: the smallest ring, so growth and
    /// wraparound are exercised early.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            initial_bit_capacity: MIN_BIT_CAPACITY,
        }
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            initial_bit_capacity: 1024,
        }
    }
}
