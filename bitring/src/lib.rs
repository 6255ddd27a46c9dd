//! Windowed out-of-order offset commit tracking.
//!
//! This crate answers "what is the highest offset I can safely commit right
//! now?" for a stream of offsets that finish processing in arbitrary order.
//! Commit must be contiguous: an offset is committable only once every
//! lower offset has completed.
//!
//! # Overview
//!
//! [`WindowRing`] keeps one bit per offset in a power-of-two circular bitmap
//! covering only the live window, from the lowest pending offset up to the
//! highest complete one:
//!
//! - **Mark pending**: register an offset as in flight, in non-decreasing
//!   order.
//! - **Mark complete**: finish an offset in any order. When the lowest
//!   pending offset completes, every contiguous complete offset above it is
//!   coalesced into the committed prefix.
//! - **Resize**: the bitmap doubles when a completion lands past its end and
//!   shrinks back once the live window falls below 25% occupancy, so memory
//!   stays proportional to the working set.
//!
//! Every operation is amortized O(1). Stale, duplicate and unmarked
//! completions are ignored rather than reported, so redelivery is harmless.
//!
//! # Example
//!
//! ```rust
//! use bitring::{Offset, RingConfig, WindowRing};
//!
//! let mut ring = WindowRing::with_config(&RingConfig::for_testing());
//! for offset in 100..110 {
//!     ring.mark_pending(Offset::new(offset))?;
//! }
//!
//! // Workers finish out of order.
//! for offset in [103, 101, 100, 102] {
//!     ring.mark_complete(Offset::new(offset));
//! }
//! assert_eq!(ring.committable_offset(), Some(Offset::new(103)));
//!
//! // Going backwards is rejected instead of corrupting the window.
//! assert!(ring.mark_pending(Offset::new(101)).is_err());
//! # Ok::<(), bitring::RingError>(())
//! ```
//!
//! # Thread Safety
//!
//! The ring is a single-threaded accounting primitive. Wrap it in a mutex or
//! give it a single owning task when completions arrive from many workers.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Allow these for cleaner code in this crate.
#![allow(clippy::module_name_repetitions)]

pub mod bits;
mod config;
mod error;
mod offset;
mod ring;

// Re-export public API.
pub use bits::{round_up_capacity, MAX_BIT_CAPACITY, MIN_BIT_CAPACITY};
pub use config::RingConfig;
pub use error::{RingError, RingResult};
pub use offset::Offset;
pub use ring::{RingStats, WindowRing};
