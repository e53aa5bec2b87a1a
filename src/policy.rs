//! Table limits and capacity math shared by both backends.
//!
//! The limits are fixed crate-wide. Ratio checks are done in integer
//! arithmetic so that `len / capacity <= 3/4` and
//! `tombstones / capacity <= 1/4` hold exactly, without rounding.

use crate::error::TryReserveError;

/// Slot count of a table built with `new()`.
pub const INITIAL_CAPACITY: usize = 16;

/// Smallest slot count a capacity hint can produce.
pub const MIN_CAPACITY: usize = 8;

/// Upper bound on `len / capacity` after every mutating call.
pub const MAX_LOAD_FACTOR: f64 = 0.75;

/// Upper bound on `tombstones / capacity` after every mutating call.
pub const MAX_TOMBSTONE_RATIO: f64 = 0.25;

/// Size and alignment of one inline slot.
pub const CACHE_LINE: usize = 64;

/// Bytes left for the key and value once the stored hash is accounted for.
pub const SLOT_BUDGET: usize = CACHE_LINE - core::mem::size_of::<u64>();

/// Slot count for a table expected to hold `expected` entries without
/// rehashing: the next power of two at or above `expected / MAX_LOAD_FACTOR`,
/// never below `MIN_CAPACITY`.
pub fn capacity_for(expected: usize) -> Result<usize, TryReserveError> {
    let scaled = expected
        .checked_mul(4)
        .ok_or(TryReserveError::CapacityOverflow)?
        / 3;
    let capacity = scaled
        .checked_next_power_of_two()
        .ok_or(TryReserveError::CapacityOverflow)?;
    Ok(capacity.max(MIN_CAPACITY))
}

/// True when holding `len` entries in `capacity` slots breaks the load bound.
#[inline]
pub(crate) fn over_load(len: usize, capacity: usize) -> bool {
    len.saturating_mul(4) > capacity.saturating_mul(3)
}

/// True when `tombstones` markers in `capacity` slots break the tombstone bound.
#[inline]
pub(crate) fn over_tombstones(tombstones: usize, capacity: usize) -> bool {
    tombstones.saturating_mul(4) > capacity
}

/// Capacity a table must move to before it can accept one more entry, or
/// `None` when the current array already satisfies both bounds.
///
/// Breaking the load bound doubles the capacity; breaking only the
/// tombstone bound compacts at the same capacity.
pub(crate) fn rehash_target(len: usize, tombstones: usize, capacity: usize) -> Option<usize> {
    if over_load(len + 1, capacity) {
        Some(capacity.checked_mul(2).unwrap_or_else(|| capacity_overflow()))
    } else if over_tombstones(tombstones, capacity) {
        Some(capacity)
    } else {
        None
    }
}

#[cold]
#[inline(never)]
pub(crate) fn capacity_overflow() -> ! {
    panic!("hash table capacity overflow")
}
