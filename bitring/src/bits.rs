//! Word-array bit primitives for the window ring.
//!
//! Bitmaps are plain `[u64]` slices whose bit length is always a power of
//! two, so ring positions wrap with a mask instead of a division.

/// Bits per bitmap word.
pub const WORD_BITS: u64 = u64::BITS as u64;

/// Smallest capacity a ring bitmap is ever allocated with.
pub const MIN_BIT_CAPACITY: u64 = 64;

/// Largest capacity a ring bitmap may grow to (512 MiB of words).
pub const MAX_BIT_CAPACITY: u64 = 1 << 32;

/// Returns the smallest power of two that is at least `max(requested, 64)`.
///
/// # Panics
///
/// Panics if the rounded capacity would exceed [`MAX_BIT_CAPACITY`].
#[must_use]
pub fn round_up_capacity(requested: u64) -> u64 {
    // TigerStyle: Put a limit on everything.
    assert!(
        requested <= MAX_BIT_CAPACITY,
        "bit capacity {requested} exceeds max {MAX_BIT_CAPACITY}"
    );
    let capacity = requested.max(MIN_BIT_CAPACITY).next_power_of_two();

    // TigerStyle: Assert postconditions.
    debug_assert!(capacity.is_power_of_two());
    debug_assert!(capacity >= requested && capacity >= MIN_BIT_CAPACITY);
    capacity
}

/// Returns the number of words backing a bitmap of `bit_capacity` bits.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn word_count(bit_capacity: u64) -> usize {
    bit_capacity.div_ceil(WORD_BITS) as usize
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn locate(pos: u64) -> (usize, u64) {
    ((pos / WORD_BITS) as usize, 1 << (pos % WORD_BITS))
}

/// Returns whether the bit at `pos` is set.
#[inline]
#[must_use]
pub fn get_bit(bitmap: &[u64], pos: u64) -> bool {
    let (word, mask) = locate(pos);
    bitmap[word] & mask != 0
}

/// Sets the bit at `pos`.
#[inline]
pub fn set_bit(bitmap: &mut [u64], pos: u64) {
    let (word, mask) = locate(pos);
    bitmap[word] |= mask;
}

/// Clears the bit at `pos`, returning whether it had been set.
#[inline]
pub fn try_clear_bit(bitmap: &mut [u64], pos: u64) -> bool {
    let (word, mask) = locate(pos);
    let block = bitmap[word];
    bitmap[word] = block & !mask;
    block & mask != 0
}

/// Returns the number of set bits.
#[must_use]
pub fn count_ones(bitmap: &[u64]) -> u64 {
    bitmap.iter().map(|word| u64::from(word.count_ones())).sum()
}

/// Copies `len_bits` ring bits of `src`, starting at ring position `start`,
/// into `dst` starting at bit 0.
///
/// Reading wraps around the end of `src`. When `start` is not word aligned
/// each destination word is stitched from two adjacent source words. Bits of
/// the last destination word beyond `len_bits` are left clear.
///
/// # Panics
///
/// Panics if `src` is not a power-of-two number of words, or if `len_bits`
/// exceeds the bit length of either bitmap.
#[allow(clippy::cast_possible_truncation)]
pub fn copy_rebased(src: &[u64], start: u64, len_bits: u64, dst: &mut [u64]) {
    let src_bits = src.len() as u64 * WORD_BITS;
    assert!(src.len().is_power_of_two(), "source words must be a power of two");
    assert!(len_bits <= src_bits, "range of {len_bits} bits exceeds source");
    assert!(
        len_bits <= dst.len() as u64 * WORD_BITS,
        "range of {len_bits} bits exceeds destination"
    );

    let wrap = src.len() as u64 - 1;
    let first = start / WORD_BITS;
    let shift = start % WORD_BITS;
    let words = len_bits.div_ceil(WORD_BITS);

    for i in 0..words {
        let low = src[((first + i) & wrap) as usize];
        dst[i as usize] = if shift == 0 {
            low
        } else {
            let high = src[((first + i + 1) & wrap) as usize];
            (low >> shift) | (high << (WORD_BITS - shift))
        };
    }

    let partial = len_bits % WORD_BITS;
    if partial != 0 {
        dst[words as usize - 1] &= (1 << partial) - 1;
    }
}
