//! hybrid-hashmap: an open-addressing hash map that picks, per key/value
//! type pair, between storing entries inline in the slot array and storing
//! them in separately allocated nodes.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: one map type whose layout is chosen at compile time from the
//!   sizes of `K` and `V`, with a single probing algorithm shared by both
//!   layouts.
//! - Layers:
//!   - `probe`: slot-state algebra (`Empty | Tombstone | Occupied(hash)`),
//!     hash remapping, and linear probing over a power-of-two slot array.
//!   - `FlatHashMap<K, V, S>`: cache-line slots holding the stored hash,
//!     key and value inline. Pairs move on rehash.
//!   - `NodeHashMap<K, V, S>`: compact slots holding the stored hash and a
//!     `Box` to the entry. Entries never move while they are in the map.
//!   - `HashMap<K, V, S>`: forwards every operation to whichever of the two
//!     `select::storage_for::<K, V>()` names.
//!
//! Slot states
//! - A slot is Empty, Tombstone, or Occupied. The inline backend encodes
//!   the state in the stored hash (0 and 1 are reserved markers and real
//!   hashes of 0 or 1 are remapped to 2). The node backend uses an enum.
//! - Lookups stop at the first Empty slot and walk past Tombstones.
//!   Inserts of absent keys reuse the first Tombstone on their chain.
//!
//! Table limits
//! - `len / capacity <= 3/4` and `tombstones / capacity <= 1/4` hold after
//!   every mutating call. Insert doubles the capacity before it would
//!   break the first bound and compacts in place if only the second is
//!   broken. Erase compacts in place when it breaks the second bound, or
//!   resets every marker to Empty when the table has become empty.
//! - Capacity is always a power of two, at least `policy::MIN_CAPACITY`.
//!
//! Hasher and rehashing invariants
//! - Each slot keeps the hash computed at insert time. Rehashing uses the
//!   stored hash and never calls `K: Hash` or `K: Eq`, so a rehash cannot
//!   observe or be interrupted by user code.
//!
//! Reentrancy
//! - Probing runs user `Hash` and `Eq`. Entering the same table again from
//!   inside those calls is a bug; debug builds detect it with a per-table
//!   guard and panic. Release builds compile the guard away.
//!
//! Threading
//! - Maps are `Send` when their contents are, and never `Sync`.
//!
//! Errors
//! - Infallible constructors and `reserve` panic on capacity overflow and
//!   abort through `handle_alloc_error` when allocation fails. The `try_`
//!   variants return `TryReserveError` instead.
//!
//! Notes and non-goals
//! - No `Clone`, no entry API, no draining iterators.
//! - Limits are crate-wide constants, not per-instance settings.

mod error;
pub mod flat_hash_map;
pub mod hash_map;
mod inline_slot;
pub mod node_hash_map;
pub mod policy;
mod probe;
mod reentrancy;
mod select;

#[cfg(test)]
mod hash_map_proptest;
#[cfg(test)]
mod test_util;

// Public surface
pub use error::{Result, TryReserveError};
pub use flat_hash_map::FlatHashMap;
pub use hash_map::HashMap;
pub use node_hash_map::NodeHashMap;
pub use probe::{SlotState, StoredHash};
pub use select::{fits_inline, storage_for, Storage};
