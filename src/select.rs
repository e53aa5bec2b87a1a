//! Compile-time choice between inline and out-of-line storage.
//!
//! A pair is stored inline when its slot body (stored hash, key, value,
//! with natural padding) fits one cache line. Moves in Rust are bitwise
//! copies that cannot fail or observe partial state, so every key and value
//! type is safe to relocate during a rehash; layout is the only criterion.
//!
//! The decision is a `const fn` of the two types, evaluated once per
//! monomorphization. It cannot be overridden per instance; use
//! `NodeHashMap` directly to opt out of inline storage.

use core::mem::{align_of, size_of};

use crate::inline_slot::{InlineSlot, SlotBody};
use crate::policy::CACHE_LINE;

/// Storage layout bound to a key/value type pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Storage {
    /// Key and value live inside the slot array (`FlatHashMap`).
    Embedded,
    /// Slots hold a hash and an owned pointer to a separately allocated
    /// entry (`NodeHashMap`).
    Indirect,
}

/// Whether `(K, V)` can be stored inline in a single cache-line slot.
pub const fn fits_inline<K, V>() -> bool {
    size_of::<SlotBody<K, V>>() <= CACHE_LINE
        && align_of::<SlotBody<K, V>>() <= CACHE_LINE
        && size_of::<InlineSlot<K, V>>() == CACHE_LINE
}

/// The storage `HashMap<K, V>` binds to.
pub const fn storage_for<K, V>() -> Storage {
    if fits_inline::<K, V>() {
        Storage::Embedded
    } else {
        Storage::Indirect
    }
}
