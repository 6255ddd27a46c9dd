//! Window ring error types.

use thiserror::Error;

use crate::offset::Offset;

/// Result type for ring operations.
pub type RingResult<T> = Result<T, RingError>;

/// Errors that can occur when registering offsets with a ring.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RingError {
    /// Offset is at or below the committable offset.
    ///
    /// Accepting it would move the committed frontier backwards and
    /// misalign every completed bit in the window.
    #[error("offset {offset} already committed (committable offset is {committable})")]
    OffsetAlreadyCommitted {
        /// The offset that was rejected.
        offset: Offset,
        /// The committable offset at the time of the call.
        committable: Offset,
    },

    /// Offset is `u64::MAX`, which the frontier could never move past.
    #[error("offset {offset} is at the end of the offset space")]
    OffsetOutOfRange {
        /// The offset that was rejected.
        offset: Offset,
    },

    /// Offset is too far ahead of the lowest pending offset for the window
    /// to hold.
    #[error("offset {offset} is {distance} past lowest pending offset {lowest_pending} (max {max_bits})")]
    WindowTooLarge {
        /// The offset that was rejected.
        offset: Offset,
        /// The lowest pending offset at the time of the call.
        lowest_pending: Offset,
        /// Distance from `lowest_pending` to `offset`.
        distance: u64,
        /// Largest window a ring can hold, in bits.
        max_bits: u64,
    },
}
