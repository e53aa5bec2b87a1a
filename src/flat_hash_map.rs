//! FlatHashMap: open addressing with keys and values stored inline.
//!
//! Each slot is one cache line holding the stored hash and uninitialized
//! room for a key and a value (`InlineSlot`). Pairs are constructed in place
//! on insert, moved between arrays on rehash, and destroyed in place on
//! erase and clear.
//!
//! References handed out by `insert`, `find_mut` or `get_or_default` point
//! into the slot array and are invalidated by the next rehash; the borrow
//! checker enforces this since every mutation takes `&mut self`.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::mem;
use core::ops::Index;
use std::collections::hash_map::RandomState;

use log::{debug, trace};

use crate::error::{Result, TryReserveError};
use crate::inline_slot::InlineSlot;
use crate::policy::{self, INITIAL_CAPACITY};
use crate::probe::{self, Locate, SlotState, StoredHash};
use crate::reentrancy::DebugReentrancy;
use crate::select;

pub struct FlatHashMap<K, V, S = RandomState> {
    hasher: S,
    slots: Box<[InlineSlot<K, V>]>,
    len: usize,
    tombstones: usize,
    reentrancy: DebugReentrancy,
}

impl<K, V> FlatHashMap<K, V, RandomState> {
    /// Creates an empty map with `INITIAL_CAPACITY` slots.
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    /// Creates an empty map sized to hold `expected` entries before its
    /// first rehash.
    pub fn with_capacity(expected: usize) -> Self {
        Self::with_capacity_and_hasher(expected, RandomState::new())
    }

    pub fn try_with_capacity(expected: usize) -> Result<Self> {
        Self::try_with_capacity_and_hasher(expected, RandomState::new())
    }
}

impl<K, V> Default for FlatHashMap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> FlatHashMap<K, V, S> {
    // Evaluated per monomorphization of the public constructors.
    const LAYOUT_CHECK: () = assert!(
        select::fits_inline::<K, V>(),
        "key/value pair does not fit a cache-line slot; use NodeHashMap"
    );

    pub fn with_hasher(hasher: S) -> Self {
        let () = Self::LAYOUT_CHECK;
        Self::build(INITIAL_CAPACITY, hasher)
    }

    pub fn with_capacity_and_hasher(expected: usize, hasher: S) -> Self {
        let () = Self::LAYOUT_CHECK;
        let capacity =
            policy::capacity_for(expected).unwrap_or_else(|_| policy::capacity_overflow());
        Self::build(capacity, hasher)
    }

    pub fn try_with_capacity_and_hasher(expected: usize, hasher: S) -> Result<Self> {
        let () = Self::LAYOUT_CHECK;
        Self::try_build(policy::capacity_for(expected)?, hasher)
    }

    /// Builds a table of exactly `capacity` slots without the layout check;
    /// the façade only reaches this for eligible pairs.
    pub(crate) fn build(capacity: usize, hasher: S) -> Self {
        Self::from_slots(probe::alloc_slots(capacity, InlineSlot::empty), hasher)
    }

    pub(crate) fn try_build(capacity: usize, hasher: S) -> Result<Self> {
        Ok(Self::from_slots(
            probe::try_alloc_slots(capacity, InlineSlot::empty)?,
            hasher,
        ))
    }

    fn from_slots(slots: Box<[InlineSlot<K, V>]>, hasher: S) -> Self {
        debug_assert!(slots.len().is_power_of_two());
        Self {
            hasher,
            slots,
            len: 0,
            tombstones: 0,
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots; always a power of two.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently holding a tombstone.
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.capacity() as f64
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Destroys every entry and tombstone; the capacity is kept.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            match slot.state() {
                SlotState::Empty => continue,
                SlotState::Tombstone => self.tombstones -= 1,
                SlotState::Occupied(_) => self.len -= 1,
            }
            slot.clear();
        }
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.len,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            slots: self.slots.iter_mut(),
            remaining: self.len,
        }
    }

    fn rehash(&mut self, capacity: usize, reason: &'static str) {
        let fresh = probe::alloc_slots(capacity, InlineSlot::empty);
        self.move_into(fresh, reason);
    }

    /// Moves every live pair into `fresh` and makes it the slot array.
    /// Stored hashes are reused, so no user code runs.
    fn move_into(&mut self, fresh: Box<[InlineSlot<K, V>]>, reason: &'static str) {
        trace!(
            "flat table rehash ({}): {} -> {} slots, {} entries, {} tombstones dropped",
            reason,
            self.slots.len(),
            fresh.len(),
            self.len,
            self.tombstones
        );
        let mut old = mem::replace(&mut self.slots, fresh);
        let capacity = self.slots.len();
        for slot in old.iter_mut() {
            if let SlotState::Occupied(hash) = slot.state() {
                let slots = &self.slots;
                let index = probe::vacant_for_move(hash, capacity, |i| slots[i].state());
                // SAFETY: `slot` is Occupied and the target slot is vacant.
                unsafe {
                    let (key, value) = slot.take(SlotState::Empty);
                    self.slots[index].construct(hash, key, value);
                }
            }
        }
        self.tombstones = 0;
    }

    /// Restores the tombstone bound after an erase.
    fn compact_after_erase(&mut self) {
        let capacity = self.capacity();
        if !policy::over_tombstones(self.tombstones, capacity) {
            return;
        }
        if self.len == 0 {
            debug!(
                "flat table: resetting {} tombstones in an empty table of {} slots",
                self.tombstones, capacity
            );
            for slot in self.slots.iter_mut() {
                slot.clear();
            }
            self.tombstones = 0;
        } else {
            debug!(
                "flat table: compacting {} tombstones at {} slots",
                self.tombstones, capacity
            );
            self.rehash(capacity, "erase compaction");
        }
    }
}

impl<K, V, S> FlatHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Inserts or updates. Returns the stored value and `true` when the key
    /// was absent. An update overwrites the value in place; the slot and the
    /// original key are kept.
    pub fn insert(&mut self, key: K, value: V) -> (&mut V, bool) {
        self.reserve_one();
        let (hash, at) = self.locate(&key);
        match at {
            Locate::Found(index) => {
                // SAFETY: `locate` only reports Occupied slots as found.
                let slot = unsafe { self.slots[index].value_mut() };
                *slot = value;
                (slot, false)
            }
            Locate::Vacant { index, reclaims } => {
                (self.occupy(index, reclaims, hash, key, value), true)
            }
        }
    }

    pub fn find<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(q)?;
        // SAFETY: `find_index` only returns Occupied slots.
        Some(unsafe { self.slots[index].value() })
    }

    pub fn find_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(q)?;
        // SAFETY: `find_index` only returns Occupied slots.
        Some(unsafe { self.slots[index].value_mut() })
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(q)?;
        self.slots[index].pair()
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_index(q).is_some()
    }

    /// Returns the value for `key`, inserting `V::default()` first if the
    /// key is absent.
    pub fn get_or_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        if let Some(index) = self.find_index(&key) {
            // SAFETY: `find_index` only returns Occupied slots.
            return unsafe { self.slots[index].value_mut() };
        }
        self.insert(key, V::default()).0
    }

    /// Removes `q`, returning whether it was present.
    pub fn erase<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).is_some()
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    /// Removes `q` and hands back the owned pair. The slot becomes a
    /// tombstone; if that breaks the tombstone bound the table is compacted
    /// at its current capacity before the pair is returned.
    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(q)?;
        // SAFETY: `find_index` only returns Occupied slots.
        let pair = unsafe { self.slots[index].take(SlotState::Tombstone) };
        self.len -= 1;
        self.tombstones += 1;
        self.compact_after_erase();
        Some(pair)
    }

    /// Makes room for `additional` more entries without a rehash.
    pub fn reserve(&mut self, additional: usize) {
        if let Err(e) = self.try_reserve(additional) {
            match e {
                TryReserveError::CapacityOverflow => policy::capacity_overflow(),
                TryReserveError::AllocError { layout } => std::alloc::handle_alloc_error(layout),
            }
        }
    }

    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .len
            .checked_add(additional)
            .ok_or(TryReserveError::CapacityOverflow)?;
        if !policy::over_load(needed, self.capacity()) {
            return Ok(());
        }
        let capacity = policy::capacity_for(needed)?;
        let fresh = probe::try_alloc_slots(capacity, InlineSlot::empty)?;
        self.move_into(fresh, "reserve");
        Ok(())
    }

    fn reserve_one(&mut self) {
        let current = self.capacity();
        match policy::rehash_target(self.len, self.tombstones, current) {
            Some(capacity) if capacity > current => self.rehash(capacity, "grow"),
            Some(capacity) => self.rehash(capacity, "insert compaction"),
            None => {}
        }
    }

    fn locate(&self, key: &K) -> (StoredHash, Locate) {
        let _g = self.reentrancy.enter();
        let hash = StoredHash::new(self.hasher.hash_one(key));
        let slots = &self.slots;
        let at = probe::locate(
            hash,
            slots.len(),
            |i| slots[i].state(),
            // SAFETY: the probe only asks about Occupied slots.
            |i| unsafe { slots[i].key() == key },
        );
        (hash, at)
    }

    fn find_index<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = StoredHash::new(self.hasher.hash_one(q));
        let slots = &self.slots;
        probe::lookup(
            hash,
            slots.len(),
            |i| slots[i].state(),
            // SAFETY: the probe only asks about Occupied slots.
            |i| unsafe { <K as Borrow<Q>>::borrow(slots[i].key()) == q },
        )
    }

    fn occupy(&mut self, index: usize, reclaims: bool, hash: StoredHash, key: K, value: V) -> &mut V {
        if reclaims {
            self.tombstones -= 1;
        }
        self.len += 1;
        // SAFETY: `locate` reported the slot as Empty or Tombstone.
        unsafe { self.slots[index].construct(hash, key, value) }
    }
}

impl<K, V, S> fmt::Debug for FlatHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, Q, V, S> Index<&Q> for FlatHashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    type Output = V;

    /// Panics if the key is absent.
    fn index(&self, key: &Q) -> &V {
        match self.find(key) {
            Some(v) => v,
            None => panic!("key not found in FlatHashMap"),
        }
    }
}

impl<K, V, S> Extend<(K, V)> for FlatHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for FlatHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a FlatHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut FlatHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

/// Iterator over the entries of a `FlatHashMap`, in slot order.
pub struct Iter<'a, K, V> {
    slots: core::slice::Iter<'a, InlineSlot<K, V>>,
    remaining: usize,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            slots: self.slots.clone(),
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        for slot in self.slots.by_ref() {
            if let Some(pair) = slot.pair() {
                self.remaining -= 1;
                return Some(pair);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Mutable iterator over the entries of a `FlatHashMap`, in slot order.
pub struct IterMut<'a, K, V> {
    slots: core::slice::IterMut<'a, InlineSlot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        for slot in self.slots.by_ref() {
            if let Some(pair) = slot.pair_mut() {
                self.remaining -= 1;
                return Some(pair);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}
