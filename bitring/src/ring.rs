//! Bitmap ring-buffer tracking windowed out-of-order completion.
//!
//! The ring maps the window of offsets `[lowest_pending, lowest_pending + capacity)`
//! onto a power-of-two bitmap. Offset `X` lives at ring position
//! `(tail_bit + (X - lowest_pending)) & (capacity - 1)`. A set bit means the
//! offset is complete but cannot be committed yet because a lower offset is
//! still pending. When the frontier itself completes, the run of set bits
//! starting at the tail is folded into the committed prefix.
//!
//! ```text
//!             tail_bit
//!                │
//!   bits:  ... 0 0 1 1 0 1 0 0 ...
//!                │           │
//!         lowest_pending  highest_complete
//! ```

use std::cell::Cell;

use tracing::{debug, trace, warn};

use crate::bits::{self, MAX_BIT_CAPACITY, MIN_BIT_CAPACITY, WORD_BITS};
use crate::config::RingConfig;
use crate::error::{RingError, RingResult};
use crate::offset::Offset;

// -----------------------------------------------------------------------------
// Cached Offsets
// -----------------------------------------------------------------------------

/// A boundary offset derived from the bitmap on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cached {
    /// Must be recomputed on the next read.
    Stale,
    /// Known to have no value.
    Absent,
    /// Known value.
    Known(Offset),
}

impl From<Option<Offset>> for Cached {
    fn from(offset: Option<Offset>) -> Self {
        offset.map_or(Self::Absent, Self::Known)
    }
}

// -----------------------------------------------------------------------------
// Ring Stats
// -----------------------------------------------------------------------------

/// Point-in-time view of every ring boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingStats {
    /// Current bitmap capacity in bits.
    pub bit_capacity: u64,
    /// First offset ever marked pending.
    pub lowest_marked: Option<Offset>,
    /// Highest offset marked pending.
    pub highest_marked: Option<Offset>,
    /// Lowest offset not yet committed.
    pub lowest_pending: Option<Offset>,
    /// Highest offset marked pending but not complete.
    pub highest_pending: Option<Offset>,
    /// Lowest complete offset above the commit frontier.
    pub lowest_complete: Option<Offset>,
    /// Highest offset marked complete.
    pub highest_complete: Option<Offset>,
    /// Highest offset safe to commit.
    pub committable_offset: Option<Offset>,
    /// Complete offsets waiting on a lower pending offset.
    pub committable_count: u64,
    /// Offsets from the frontier through the highest marked offset.
    pub pending_range_size: u64,
    /// Offsets from the frontier through the highest complete offset.
    pub complete_range_size: u64,
}

// -----------------------------------------------------------------------------
// Window Ring
// -----------------------------------------------------------------------------

/// Bitmap ring-buffer tracking windowed out-of-order processing over a
/// sequence of offsets.
///
/// Offsets are registered with [`mark_pending`](Self::mark_pending) in
/// non-decreasing order and finished with
/// [`mark_complete`](Self::mark_complete) in any order.
/// [`committable_offset`](Self::committable_offset) then reports the highest
/// offset below which everything has completed.
///
/// # Thread Safety
///
/// The ring is single-threaded (`!Sync`): queries refresh lazily cached
/// boundaries through interior mutability. Callers sharing a ring across
/// tasks must serialize access themselves.
///
/// # Example
///
/// ```rust
/// use bitring::{Offset, WindowRing};
///
/// let mut ring = WindowRing::new(64);
/// for offset in 0..5 {
///     ring.mark_pending(Offset::new(offset))?;
/// }
///
/// ring.mark_complete(Offset::new(2));
/// ring.mark_complete(Offset::new(0));
/// assert_eq!(ring.committable_offset(), Some(Offset::new(0)));
///
/// // Completing 1 closes the gap, so 2 is committable as well.
/// ring.mark_complete(Offset::new(1));
/// assert_eq!(ring.committable_offset(), Some(Offset::new(2)));
/// assert_eq!(ring.committable_count(), 0);
/// # Ok::<(), bitring::RingError>(())
/// ```
#[derive(Debug, Clone)]
pub struct WindowRing {
    /// Complete-but-uncommitted bits, `bit_capacity()` bits long.
    bitmap: Vec<u64>,
    /// Ring position of `lowest_pending`.
    tail_bit: u64,
    lowest_marked: Option<Offset>,
    highest_marked: Option<Offset>,
    /// Commit frontier. `None` while nothing is pending.
    lowest_pending: Option<Offset>,
    highest_pending: Cell<Cached>,
    lowest_complete: Cell<Cached>,
    highest_complete: Option<Offset>,
    /// Number of set bits in `bitmap`.
    num_committable: u64,
}

impl WindowRing {
    /// Creates a ring able to hold at least `bit_capacity` offsets before
    /// growing.
    ///
    /// # Panics
    ///
    /// Panics if `bit_capacity` exceeds [`bits::MAX_BIT_CAPACITY`].
    #[must_use]
    pub fn new(bit_capacity: u64) -> Self {
        let capacity = bits::round_up_capacity(bit_capacity);
        Self {
            bitmap: vec![0; bits::word_count(capacity)],
            tail_bit: 0,
            lowest_marked: None,
            highest_marked: None,
            lowest_pending: None,
            highest_pending: Cell::new(Cached::Absent),
            lowest_complete: Cell::new(Cached::Absent),
            highest_complete: None,
            num_committable: 0,
        }
    }

    /// Creates a ring from configuration.
    #[must_use]
    pub fn with_config(config: &RingConfig) -> Self {
        Self::new(config.initial_bit_capacity)
    }

    /// Clears all state, keeping the bitmap allocation when the rounded
    /// capacity is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `bit_capacity` exceeds [`bits::MAX_BIT_CAPACITY`].
    pub fn reset(&mut self, bit_capacity: u64) {
        self.reset_bitmap(bit_capacity);
        self.tail_bit = 0;
        self.lowest_marked = None;
        self.highest_marked = None;
        self.lowest_pending = None;
        self.highest_pending.set(Cached::Absent);
        self.lowest_complete.set(Cached::Absent);
        self.highest_complete = None;
        self.num_committable = 0;
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Marks `offset` as pending.
    ///
    /// Offsets must be submitted in non-decreasing order. Re-marking an
    /// offset inside the live window is a no-op bound update.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::OffsetAlreadyCommitted`] if `offset` is at or
    /// below [`committable_offset`](Self::committable_offset),
    /// [`RingError::OffsetOutOfRange`] for `u64::MAX`, and
    /// [`RingError::WindowTooLarge`] if `offset` is [`MAX_BIT_CAPACITY`] or
    /// more past the lowest pending offset. The ring is left unchanged.
    pub fn mark_pending(&mut self, offset: Offset) -> RingResult<()> {
        if let Some(committable) = self.committable_offset() {
            if offset <= committable {
                warn!(
                    offset = %offset,
                    committable = %committable,
                    "Rejected pending offset at or below commit frontier"
                );
                return Err(RingError::OffsetAlreadyCommitted {
                    offset,
                    committable,
                });
            }
        }
        // The frontier must be able to move one past every marked offset.
        if offset.get() == u64::MAX {
            warn!(offset = %offset, "Rejected pending offset at end of offset space");
            return Err(RingError::OffsetOutOfRange { offset });
        }
        if let Some(lowest_pending) = self.lowest_pending {
            if let Some(distance) = offset.distance_from(lowest_pending) {
                if distance >= MAX_BIT_CAPACITY {
                    warn!(
                        offset = %offset,
                        lowest_pending = %lowest_pending,
                        distance,
                        "Rejected pending offset beyond max window"
                    );
                    return Err(RingError::WindowTooLarge {
                        offset,
                        lowest_pending,
                        distance,
                        max_bits: MAX_BIT_CAPACITY,
                    });
                }
            }
        }

        if self.highest_marked.map_or(true, |highest| offset > highest) {
            self.highest_marked = Some(offset);
        }

        if self.lowest_marked.is_none() {
            self.lowest_marked = Some(offset);
            self.lowest_pending = Some(offset);
            self.highest_pending.set(Cached::Stale);
            return Ok(());
        }

        let highest_pending = match self.highest_pending.get() {
            Cached::Known(highest) if offset <= highest => Cached::Known(highest),
            Cached::Known(_) if self.highest_complete.map_or(true, |c| c < offset) => {
                Cached::Known(offset)
            }
            _ => Cached::Stale,
        };
        self.highest_pending.set(highest_pending);

        match self.lowest_pending {
            Some(lowest) if lowest <= offset => {}
            // The ring emptied itself; a new window starts here.
            _ => {
                self.lowest_pending = Some(offset);
                self.lowest_complete.set(Cached::Stale);
            }
        }

        // TigerStyle: Assert postconditions.
        debug_assert!(self.lowest_pending <= self.highest_marked);
        Ok(())
    }

    /// Marks `offset` as complete.
    ///
    /// Completing the commit frontier folds every contiguous complete offset
    /// above it into the committed prefix. Offsets that are already
    /// committed, already complete, or were never marked pending are ignored.
    /// Offsets beyond the current capacity grow the bitmap. Growth never
    /// exceeds [`MAX_BIT_CAPACITY`] because `mark_pending` bounds the window.
    pub fn mark_complete(&mut self, offset: Offset) {
        let (Some(lowest_pending), Some(highest_marked)) =
            (self.lowest_pending, self.highest_marked)
        else {
            trace!(offset = %offset, "Ignored completion with nothing pending");
            return;
        };
        if offset > highest_marked {
            trace!(
                offset = %offset,
                highest_marked = %highest_marked,
                "Ignored completion of unmarked offset"
            );
            return;
        }
        let Some(rel) = offset.distance_from(lowest_pending) else {
            trace!(offset = %offset, "Ignored completion of committed offset");
            return;
        };

        let pos = if rel < self.bit_capacity() {
            let pos = self.wrap_forward(self.tail_bit + rel);
            if bits::get_bit(&self.bitmap, pos) {
                trace!(offset = %offset, "Ignored duplicate completion");
                return;
            }
            pos
        } else {
            self.resize(rel + 1, self.complete_range_size());
            rel
        };

        bits::set_bit(&mut self.bitmap, pos);
        self.num_committable += 1;
        // lowest_pending moves below, if the frontier itself just completed.
        self.highest_pending.set(Cached::Stale);
        self.lowest_complete.set(Cached::Stale);
        if self.highest_complete.map_or(true, |highest| offset > highest) {
            self.highest_complete = Some(offset);
        }

        if pos == self.tail_bit {
            self.coalesce(lowest_pending, highest_marked);
        }
    }

    /// Folds the run of set bits at the tail into the committed prefix.
    fn coalesce(&mut self, lowest_pending: Offset, highest_marked: Offset) {
        let mut frontier = lowest_pending.get();
        while bits::try_clear_bit(&mut self.bitmap, self.tail_bit) {
            self.tail_bit = self.wrap_forward(self.tail_bit + 1);
            self.num_committable -= 1;
            frontier += 1;
        }
        let frontier = Offset::new(frontier);

        if frontier > highest_marked {
            self.clear_window(highest_marked);
            return;
        }
        self.lowest_pending = Some(frontier);

        // Below 25% occupancy, shrink to roughly 50%.
        let range = self.complete_range_size();
        let capacity = self.bit_capacity();
        if range * 4 < capacity && bits::round_up_capacity(range * 2) < capacity {
            self.resize(range * 2, range);
        }
    }

    /// Returns to the empty minimum-capacity state once every marked offset
    /// is committed. Marked and completed bounds are kept.
    fn clear_window(&mut self, committed: Offset) {
        debug_assert_eq!(self.num_committable, 0, "bits left behind the frontier");
        self.lowest_pending = None;
        self.tail_bit = 0;
        self.highest_pending.set(Cached::Absent);
        self.lowest_complete.set(Cached::Absent);
        self.reset_bitmap(MIN_BIT_CAPACITY);
        debug!(committed = %committed, "All marked offsets committed");
    }

    fn reset_bitmap(&mut self, bit_capacity: u64) {
        let capacity = bits::round_up_capacity(bit_capacity);
        if capacity == self.bit_capacity() {
            self.bitmap.fill(0);
        } else {
            self.bitmap = vec![0; bits::word_count(capacity)];
        }
    }

    /// Reallocates the bitmap, re-basing the first `preserve_bits` ring bits
    /// from the tail onto position 0.
    fn resize(&mut self, bit_capacity: u64, preserve_bits: u64) {
        let from_bits = self.bit_capacity();
        let capacity = bits::round_up_capacity(bit_capacity);
        let mut bitmap = vec![0; bits::word_count(capacity)];
        bits::copy_rebased(&self.bitmap, self.tail_bit, preserve_bits, &mut bitmap);
        self.bitmap = bitmap;
        self.tail_bit = 0;

        debug!(
            from_bits,
            to_bits = capacity,
            preserved_bits = preserve_bits,
            "Resized window ring"
        );

        // TigerStyle: Assert postconditions.
        debug_assert_eq!(bits::count_ones(&self.bitmap), self.num_committable);
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Returns the first offset ever marked pending.
    #[must_use]
    pub const fn lowest_marked_offset(&self) -> Option<Offset> {
        self.lowest_marked
    }

    /// Returns the highest offset marked pending.
    #[must_use]
    pub const fn highest_marked_offset(&self) -> Option<Offset> {
        self.highest_marked
    }

    /// Returns the lowest offset which is not yet committed.
    #[must_use]
    pub const fn lowest_pending_offset(&self) -> Option<Offset> {
        self.lowest_pending
    }

    /// Returns the highest offset which is pending but not complete.
    #[must_use]
    pub fn highest_pending_offset(&self) -> Option<Offset> {
        match self.highest_pending.get() {
            Cached::Known(offset) => Some(offset),
            Cached::Absent => None,
            Cached::Stale => {
                let found = self.find_highest_pending();
                self.highest_pending.set(found.into());
                found
            }
        }
    }

    /// Returns the lowest complete offset still waiting on the frontier.
    #[must_use]
    pub fn lowest_complete_offset(&self) -> Option<Offset> {
        match self.lowest_complete.get() {
            Cached::Known(offset) => Some(offset),
            Cached::Absent => None,
            Cached::Stale => {
                let found = self.find_lowest_complete();
                self.lowest_complete.set(found.into());
                found
            }
        }
    }

    /// Returns the highest offset marked complete.
    #[must_use]
    pub const fn highest_complete_offset(&self) -> Option<Offset> {
        self.highest_complete
    }

    /// Returns the highest offset with no lower offset still pending.
    #[must_use]
    pub const fn committable_offset(&self) -> Option<Offset> {
        match self.lowest_pending {
            None => self.highest_marked,
            Some(lowest) => lowest.prev(),
        }
    }

    /// Returns the number of complete offsets that can only be committed
    /// once a lower pending offset completes.
    #[must_use]
    pub const fn committable_count(&self) -> u64 {
        self.num_committable
    }

    /// Returns the number of offsets from the frontier through the highest
    /// marked offset.
    #[must_use]
    pub fn pending_range_size(&self) -> u64 {
        match (self.lowest_pending, self.highest_marked) {
            (Some(lowest), Some(highest)) => highest.get() + 1 - lowest.get(),
            _ => 0,
        }
    }

    /// Returns the number of offsets from the frontier through the highest
    /// complete offset.
    #[must_use]
    pub fn complete_range_size(&self) -> u64 {
        match (self.lowest_pending, self.highest_complete) {
            (Some(lowest), Some(highest)) if highest >= lowest => {
                highest.get() + 1 - lowest.get()
            }
            _ => 0,
        }
    }

    /// Returns the current bitmap capacity in bits.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn bit_capacity(&self) -> u64 {
        self.bitmap.len() as u64 * WORD_BITS
    }

    /// Returns true if every marked offset is committed.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.lowest_pending.is_none()
    }

    /// Returns every boundary at once.
    #[must_use]
    pub fn stats(&self) -> RingStats {
        RingStats {
            bit_capacity: self.bit_capacity(),
            lowest_marked: self.lowest_marked,
            highest_marked: self.highest_marked,
            lowest_pending: self.lowest_pending,
            highest_pending: self.highest_pending_offset(),
            lowest_complete: self.lowest_complete_offset(),
            highest_complete: self.highest_complete,
            committable_offset: self.committable_offset(),
            committable_count: self.num_committable,
            pending_range_size: self.pending_range_size(),
            complete_range_size: self.complete_range_size(),
        }
    }

    // -------------------------------------------------------------------------
    // Boundary Search
    // -------------------------------------------------------------------------

    fn find_highest_pending(&self) -> Option<Offset> {
        let lowest_pending = self.lowest_pending?;
        let highest_marked = self.highest_marked?;
        // Anything marked above the complete range is still pending.
        let highest_complete = match self.highest_complete {
            Some(highest) if highest >= highest_marked => highest,
            _ => return Some(highest_marked),
        };

        let mut pos = self.ring_position(lowest_pending, highest_complete);
        let mut offset = highest_complete.get();
        while pos != self.tail_bit && bits::get_bit(&self.bitmap, pos) {
            offset -= 1;
            pos = self.wrap_back(pos);
        }
        Some(Offset::new(offset))
    }

    fn find_lowest_complete(&self) -> Option<Offset> {
        let lowest_pending = self.lowest_pending?;
        let highest_complete = self
            .highest_complete
            .filter(|highest| *highest > lowest_pending)?;

        let end = self.ring_position(lowest_pending, highest_complete);
        let mut pos = self.tail_bit;
        let mut offset = lowest_pending.get();
        while pos != end && !bits::get_bit(&self.bitmap, pos) {
            offset += 1;
            pos = self.wrap_forward(pos + 1);
        }
        Some(Offset::new(offset))
    }

    // -------------------------------------------------------------------------
    // Ring Arithmetic
    // -------------------------------------------------------------------------

    /// Ring position of `offset`, which must lie inside the live window.
    fn ring_position(&self, lowest_pending: Offset, offset: Offset) -> u64 {
        let rel = offset.get() - lowest_pending.get();
        debug_assert!(rel < self.bit_capacity());
        self.wrap_forward(self.tail_bit + rel)
    }

    /// Wraps to the start if necessary; capacity is always a power of two.
    fn wrap_forward(&self, pos: u64) -> u64 {
        pos & (self.bit_capacity() - 1)
    }

    /// Steps back one position, wrapping to the end if necessary.
    fn wrap_back(&self, pos: u64) -> u64 {
        let capacity = self.bit_capacity();
        (capacity + pos - 1) & (capacity - 1)
    }
}

impl Default for WindowRing {
    fn default() -> Self {
        Self::with_config(&RingConfig::default())
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
