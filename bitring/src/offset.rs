//! Logical offsets tracked by the ring.
//!
//! Following `TigerStyle`: explicit types prevent mixing up offsets with
//! ring positions or bit counts. Offsets are 64-bit and never negative;
//! "no offset" is expressed with `Option<Offset>` rather than a sentinel.

use std::fmt;

/// Position in a logical sequence processed out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Offset(u64);

impl Offset {
    /// Creates an offset from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw offset value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the next offset.
    ///
    /// # Panics
    /// Panics if the offset would overflow.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        assert!(self.0 < u64::MAX, "offset overflow");
        Self(self.0 + 1)
    }

    /// Returns the previous offset, or `None` at offset zero.
    #[inline]
    #[must_use]
    pub const fn prev(self) -> Option<Self> {
        match self.0.checked_sub(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Returns the distance from `base` up to `self`, or `None` if `self < base`.
    #[inline]
    #[must_use]
    pub const fn distance_from(self, base: Self) -> Option<u64> {
        self.0.checked_sub(base.0)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Offset {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<Offset> for u64 {
    fn from(offset: Offset) -> Self {
        offset.get()
    }
}
