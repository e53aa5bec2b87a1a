//! Cache-line slot with uninitialized inline storage for one key and value.
//!
//! The hash field doubles as the initialization flag: the key and value are
//! live exactly when the field holds an Occupied state. Every function that
//! changes the flag also constructs or destroys the pair, so the two never
//! drift apart.

use core::mem::MaybeUninit;
use core::ptr;

use crate::policy::CACHE_LINE;
use crate::probe::{SlotState, StoredHash, EMPTY_HASH};

/// Unpadded slot contents. Its size decides whether a pair can be stored
/// inline at all (see `select::fits_inline`).
#[repr(C)]
pub(crate) struct SlotBody<K, V> {
    hash: u64,
    key: MaybeUninit<K>,
    value: MaybeUninit<V>,
}

#[repr(C, align(64))]
pub(crate) struct InlineSlot<K, V> {
    body: SlotBody<K, V>,
}

const _: () = assert!(core::mem::align_of::<InlineSlot<u8, u8>>() == CACHE_LINE);
const _: () = assert!(core::mem::size_of::<InlineSlot<u64, u64>>() == CACHE_LINE);
const _: () = assert!(core::mem::size_of::<InlineSlot<[u8; 28], [u8; 28]>>() == CACHE_LINE);

impl<K, V> InlineSlot<K, V> {
    #[inline]
    pub(crate) fn empty() -> Self {
        InlineSlot {
            body: SlotBody {
                hash: EMPTY_HASH,
                key: MaybeUninit::uninit(),
                value: MaybeUninit::uninit(),
            },
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> SlotState {
        SlotState::from_marker(self.body.hash)
    }

    /// Moves `key` and `value` into the slot and marks it Occupied.
    ///
    /// # Safety
    /// The slot must not be Occupied. Constructing over a live pair would
    /// forget it without running its destructor.
    #[inline]
    pub(crate) unsafe fn construct(&mut self, hash: StoredHash, key: K, value: V) -> &mut V {
        debug_assert!(!self.state().is_occupied());
        self.body.key.write(key);
        let v = self.body.value.write(value);
        self.body.hash = hash.get();
        v
    }

    /// Moves the pair out and leaves the slot in `vacated` state.
    ///
    /// # Safety
    /// The slot must be Occupied, and `vacated` must be Empty or Tombstone.
    #[inline]
    pub(crate) unsafe fn take(&mut self, vacated: SlotState) -> (K, V) {
        debug_assert!(self.state().is_occupied());
        debug_assert!(!vacated.is_occupied());
        self.body.hash = vacated.marker();
        (self.body.key.assume_init_read(), self.body.value.assume_init_read())
    }

    /// Destroys the pair in place, if any, and marks the slot Empty.
    ///
    /// The slot is marked before the destructors run, so a panicking `Drop`
    /// leaks the rest of the pair instead of leaving a live-looking slot.
    #[inline]
    pub(crate) fn clear(&mut self) {
        let was_occupied = self.state().is_occupied();
        self.body.hash = EMPTY_HASH;
        if was_occupied {
            // SAFETY: the Occupied flag guaranteed both fields were live,
            // and the flag is already cleared so they are dropped once.
            unsafe {
                ptr::drop_in_place(self.body.key.as_mut_ptr());
                ptr::drop_in_place(self.body.value.as_mut_ptr());
            }
        }
    }

    /// # Safety
    /// The slot must be Occupied.
    #[inline]
    pub(crate) unsafe fn key(&self) -> &K {
        debug_assert!(self.state().is_occupied());
        self.body.key.assume_init_ref()
    }

    /// # Safety
    /// The slot must be Occupied.
    #[inline]
    pub(crate) unsafe fn value(&self) -> &V {
        debug_assert!(self.state().is_occupied());
        self.body.value.assume_init_ref()
    }

    /// # Safety
    /// The slot must be Occupied.
    #[inline]
    pub(crate) unsafe fn value_mut(&mut self) -> &mut V {
        debug_assert!(self.state().is_occupied());
        self.body.value.assume_init_mut()
    }

    /// Key and value of an Occupied slot, `None` otherwise.
    #[inline]
    pub(crate) fn pair(&self) -> Option<(&K, &V)> {
        if self.state().is_occupied() {
            // SAFETY: checked Occupied above.
            unsafe { Some((self.body.key.assume_init_ref(), self.body.value.assume_init_ref())) }
        } else {
            None
        }
    }

    /// Key and mutable value of an Occupied slot, `None` otherwise.
    #[inline]
    pub(crate) fn pair_mut(&mut self) -> Option<(&K, &mut V)> {
        if self.state().is_occupied() {
            // SAFETY: checked Occupied above.
            unsafe { Some((self.body.key.assume_init_ref(), self.body.value.assume_init_mut())) }
        } else {
            None
        }
    }
}

impl<K, V> Drop for InlineSlot<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}
