//! Slot states, stored hashes and the linear probe shared by both backends.
//!
//! A slot is Empty, a Tombstone, or Occupied by a live key. Both backends
//! describe their slots through `SlotState` and run the same three scans
//! over it:
//! - `lookup`: stop at the first Empty, skip Tombstones, match on stored
//!   hash and then key equality.
//! - `locate`: like `lookup`, but remember the first Tombstone so that an
//!   absent key is placed there rather than at the terminating Empty.
//! - `vacant_for_move`: find a free slot for an entry that is known to be
//!   absent (rehash), without calling user code.

use std::alloc::Layout;

use crate::error::{Result, TryReserveError};

/// Marker stored in an empty slot's hash field.
pub(crate) const EMPTY_HASH: u64 = 0;
/// Marker stored in a tombstone's hash field.
pub(crate) const TOMBSTONE_HASH: u64 = 1;
/// Stand-in for real hashes that collide with a marker.
const REMAPPED_HASH: u64 = 2;

/// A hash value as stored in a slot. Never equal to a control marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoredHash(u64);

impl StoredHash {
    /// Remaps raw hashes 0 and 1 so they cannot be read back as markers.
    #[inline]
    pub fn new(raw: u64) -> Self {
        if raw == EMPTY_HASH || raw == TOMBSTONE_HASH {
            StoredHash(REMAPPED_HASH)
        } else {
            StoredHash(raw)
        }
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    #[inline]
    fn ideal_index(self, mask: usize) -> usize {
        (self.0 as usize) & mask
    }
}

/// State of one slot in either backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Tombstone,
    Occupied(StoredHash),
}

impl SlotState {
    /// Decodes a hash field that uses 0 and 1 as markers.
    #[inline]
    pub(crate) fn from_marker(hash: u64) -> Self {
        match hash {
            EMPTY_HASH => SlotState::Empty,
            TOMBSTONE_HASH => SlotState::Tombstone,
            h => SlotState::Occupied(StoredHash(h)),
        }
    }

    /// Encodes the state back into a marker-carrying hash field.
    #[inline]
    pub(crate) fn marker(self) -> u64 {
        match self {
            SlotState::Empty => EMPTY_HASH,
            SlotState::Tombstone => TOMBSTONE_HASH,
            SlotState::Occupied(h) => h.0,
        }
    }

    #[inline]
    pub fn is_occupied(self) -> bool {
        matches!(self, SlotState::Occupied(_))
    }
}

/// Where an insertion lands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Locate {
    /// The key is already stored at this index.
    Found(usize),
    /// The key is absent; place it at `index`. `reclaims` is set when
    /// `index` currently holds a tombstone.
    Vacant { index: usize, reclaims: bool },
}

/// Linear probe sequence: `ideal, ideal + 1, ...` modulo the capacity,
/// visiting each slot at most once.
struct Probe {
    index: usize,
    mask: usize,
    remaining: usize,
}

impl Probe {
    #[inline]
    fn start(hash: StoredHash, capacity: usize) -> Probe {
        debug_assert!(capacity.is_power_of_two());
        let mask = capacity - 1;
        Probe {
            index: hash.ideal_index(mask),
            mask,
            remaining: capacity,
        }
    }
}

impl Iterator for Probe {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let i = self.index;
        self.index = (self.index + 1) & self.mask;
        Some(i)
    }
}

/// Finds the index holding a key equal to the probe target.
///
/// `is_match` is only called for Occupied slots whose stored hash equals
/// `hash`.
#[inline]
pub(crate) fn lookup(
    hash: StoredHash,
    capacity: usize,
    state: impl Fn(usize) -> SlotState,
    mut is_match: impl FnMut(usize) -> bool,
) -> Option<usize> {
    for i in Probe::start(hash, capacity) {
        match state(i) {
            SlotState::Empty => return None,
            SlotState::Tombstone => continue,
            SlotState::Occupied(h) => {
                if h == hash && is_match(i) {
                    return Some(i);
                }
            }
        }
    }
    None
}

/// Finds either the index of an equal key or the slot an absent key
/// belongs in: the first tombstone seen before the terminating Empty, or
/// that Empty itself.
///
/// `is_match` is only called for Occupied slots whose stored hash equals
/// `hash`.
#[inline]
pub(crate) fn locate(
    hash: StoredHash,
    capacity: usize,
    state: impl Fn(usize) -> SlotState,
    mut is_match: impl FnMut(usize) -> bool,
) -> Locate {
    let mut first_tombstone = None;
    for i in Probe::start(hash, capacity) {
        match state(i) {
            SlotState::Empty => {
                return match first_tombstone {
                    Some(index) => Locate::Vacant {
                        index,
                        reclaims: true,
                    },
                    None => Locate::Vacant {
                        index: i,
                        reclaims: false,
                    },
                };
            }
            SlotState::Tombstone => {
                if first_tombstone.is_none() {
                    first_tombstone = Some(i);
                }
            }
            SlotState::Occupied(h) => {
                if h == hash && is_match(i) {
                    return Locate::Found(i);
                }
            }
        }
    }
    // A full cycle without an Empty. The load bound keeps at least a
    // quarter of the slots Empty or Tombstone, so a tombstone must exist.
    match first_tombstone {
        Some(index) => Locate::Vacant {
            index,
            reclaims: true,
        },
        None => table_full(),
    }
}

/// First Empty or Tombstone slot on the probe sequence of `hash`.
/// Used when moving entries that are known to be absent from the target.
#[inline]
pub(crate) fn vacant_for_move(
    hash: StoredHash,
    capacity: usize,
    state: impl Fn(usize) -> SlotState,
) -> usize {
    for i in Probe::start(hash, capacity) {
        if !state(i).is_occupied() {
            return i;
        }
    }
    table_full()
}

#[cold]
#[inline(never)]
fn table_full() -> ! {
    panic!("hash table is full: load-factor invariant violated")
}

/// Allocates a slot array of exactly `capacity` elements.
pub(crate) fn try_alloc_slots<T>(capacity: usize, fill: impl FnMut() -> T) -> Result<Box<[T]>> {
    let layout = Layout::array::<T>(capacity).map_err(|_| TryReserveError::CapacityOverflow)?;
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(capacity)
        .map_err(|_| TryReserveError::AllocError { layout })?;
    slots.extend(std::iter::repeat_with(fill).take(capacity));
    Ok(slots.into_boxed_slice())
}

/// Infallible `try_alloc_slots`: panics on overflow and defers to the
/// global allocation-error handler when memory runs out.
pub(crate) fn alloc_slots<T>(capacity: usize, fill: impl FnMut() -> T) -> Box<[T]> {
    match try_alloc_slots(capacity, fill) {
        Ok(slots) => slots,
        Err(TryReserveError::CapacityOverflow) => crate::policy::capacity_overflow(),
        Err(TryReserveError::AllocError { layout }) => std::alloc::handle_alloc_error(layout),
    }
}
