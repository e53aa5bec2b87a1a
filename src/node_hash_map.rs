//! NodeHashMap: open addressing over a compact slot array whose occupied
//! slots own a separately allocated entry.
//!
//! A slot is a stored hash plus a `Box<Entry>`. Rehashing moves only the
//! `(hash, Box)` pair, so an entry's key and value keep their address for as
//! long as the entry stays in the map, across any number of rehashes. Erase
//! frees the entry.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::mem;
use core::ops::Index;
use std::collections::hash_map::RandomState;

use log::{debug, trace};

use crate::error::{Result, TryReserveError};
use crate::policy::{self, INITIAL_CAPACITY};
use crate::probe::{self, Locate, SlotState, StoredHash};
use crate::reentrancy::DebugReentrancy;

struct Entry<K, V> {
    key: K,
    value: V,
}

enum Bucket<K, V> {
    Empty,
    Tombstone,
    Occupied {
        hash: StoredHash,
        entry: Box<Entry<K, V>>,
    },
}

impl<K, V> Bucket<K, V> {
    #[inline]
    fn state(&self) -> SlotState {
        match self {
            Bucket::Empty => SlotState::Empty,
            Bucket::Tombstone => SlotState::Tombstone,
            Bucket::Occupied { hash, .. } => SlotState::Occupied(*hash),
        }
    }

    #[inline]
    fn entry(&self) -> Option<&Entry<K, V>> {
        match self {
            Bucket::Occupied { entry, .. } => Some(entry.as_ref()),
            _ => None,
        }
    }

    #[inline]
    fn entry_mut(&mut self) -> Option<&mut Entry<K, V>> {
        match self {
            Bucket::Occupied { entry, .. } => Some(entry.as_mut()),
            _ => None,
        }
    }

    /// Stores `entry` in a vacant bucket and returns it.
    fn fill(&mut self, hash: StoredHash, entry: Box<Entry<K, V>>) -> &mut Entry<K, V> {
        debug_assert!(!self.state().is_occupied());
        *self = Bucket::Occupied { hash, entry };
        match self {
            Bucket::Occupied { entry, .. } => &mut **entry,
            _ => unreachable!("bucket was just filled"),
        }
    }
}

pub struct NodeHashMap<K, V, S = RandomState> {
    hasher: S,
    buckets: Box<[Bucket<K, V>]>,
    len: usize,
    tombstones: usize,
    reentrancy: DebugReentrancy,
}

impl<K, V> NodeHashMap<K, V, RandomState> {
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

impl<K, V> Default for NodeHashMap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> NodeHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::build(INITIAL_CAPACITY, hasher)
    }

    pub fn with_capacity_and_hasher(expected: usize, hasher: S) -> Self {
        let capacity =
            policy::capacity_for(expected).unwrap_or_else(|_| policy::capacity_overflow());
        Self::build(capacity, hasher)
    }

    pub fn try_with_capacity_and_hasher(expected: usize, hasher: S) -> Result<Self> {
        Self::try_build(policy::capacity_for(expected)?, hasher)
    }

    pub(crate) fn build(capacity: usize, hasher: S) -> Self {
        Self::from_buckets(probe::alloc_slots(capacity, || Bucket::Empty), hasher)
    }

    pub(crate) fn try_build(capacity: usize, hasher: S) -> Result<Self> {
        Ok(Self::from_buckets(
            probe::try_alloc_slots(capacity, || Bucket::Empty)?,
            hasher,
        ))
    }

    fn from_buckets(buckets: Box<[Bucket<K, V>]>, hasher: S) -> Self {
        debug_assert!(buckets.len().is_power_of_two());
        Self {
            hasher,
            buckets,
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

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.capacity() as f64
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Frees every entry and forgets every tombstone; the capacity is kept.
    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            match mem::replace(bucket, Bucket::Empty) {
                Bucket::Empty => {}
                Bucket::Tombstone => self.tombstones -= 1,
                Bucket::Occupied { entry, .. } => {
                    self.len -= 1;
                    drop(entry);
                }
            }
        }
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.buckets.iter(),
            remaining: self.len,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            buckets: self.buckets.iter_mut(),
            remaining: self.len,
        }
    }

    fn rehash(&mut self, capacity: usize, reason: &'static str) {
        let fresh = probe::alloc_slots(capacity, || Bucket::Empty);
        self.move_into(fresh, reason);
    }

    /// Relinks every entry into `fresh`. Entries themselves stay where they
    /// are on the heap; only the owning pointers move.
    fn move_into(&mut self, fresh: Box<[Bucket<K, V>]>, reason: &'static str) {
        trace!(
            "node table rehash ({}): {} -> {} slots, {} entries, {} tombstones dropped",
            reason,
            self.buckets.len(),
            fresh.len(),
            self.len,
            self.tombstones
        );
        let old = mem::replace(&mut self.buckets, fresh);
        let capacity = self.buckets.len();
        for bucket in old.into_vec() {
            if let Bucket::Occupied { hash, entry } = bucket {
                let buckets = &self.buckets;
                let index = probe::vacant_for_move(hash, capacity, |i| buckets[i].state());
                self.buckets[index].fill(hash, entry);
            }
        }
        self.tombstones = 0;
    }

    fn compact_after_erase(&mut self) {
        let capacity = self.capacity();
        if !policy::over_tombstones(self.tombstones, capacity) {
            return;
        }
        if self.len == 0 {
            debug!(
                "node table: resetting {} tombstones in an empty table of {} slots",
                self.tombstones, capacity
            );
            for bucket in self.buckets.iter_mut() {
                *bucket = Bucket::Empty;
            }
            self.tombstones = 0;
        } else {
            debug!(
                "node table: compacting {} tombstones at {} slots",
                self.tombstones, capacity
            );
            self.rehash(capacity, "erase compaction");
        }
    }
}

impl<K, V, S> NodeHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Inserts or updates. Returns the stored value and `true` when the key
    /// was absent. An update assigns through the existing entry, which keeps
    /// its address and its original key.
    pub fn insert(&mut self, key: K, value: V) -> (&mut V, bool) {
        self.reserve_one();
        let (hash, at) = self.locate(&key);
        match at {
            Locate::Found(index) => {
                let entry = self.entry_at(index);
                entry.value = value;
                (&mut entry.value, false)
            }
            Locate::Vacant { index, reclaims } => {
                if reclaims {
                    self.tombstones -= 1;
                }
                self.len += 1;
                let entry = self.buckets[index].fill(hash, Box::new(Entry { key, value }));
                (&mut entry.value, true)
            }
        }
    }

    pub fn find<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(q)?;
        self.buckets[index].entry().map(|e| &e.value)
    }

    pub fn find_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(q)?;
        self.buckets[index].entry_mut().map(|e| &mut e.value)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(q)?;
        self.buckets[index].entry().map(|e| (&e.key, &e.value))
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
        match self.find_index(&key) {
            Some(index) => &mut self.entry_at(index).value,
            None => self.insert(key, V::default()).0,
        }
    }

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

    /// Unlinks `q` and hands back the owned pair; its entry allocation is
    /// freed. The slot becomes a tombstone, compacted away if the tombstone
    /// bound is broken.
    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(q)?;
        let vacated = mem::replace(&mut self.buckets[index], Bucket::Tombstone);
        let Bucket::Occupied { entry, .. } = vacated else {
            unreachable!("lookup returned a vacant slot")
        };
        self.len -= 1;
        self.tombstones += 1;
        self.compact_after_erase();
        let Entry { key, value } = *entry;
        Some((key, value))
    }

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
        let fresh = probe::try_alloc_slots(capacity, || Bucket::Empty)?;
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

    fn entry_at(&mut self, index: usize) -> &mut Entry<K, V> {
        match self.buckets[index].entry_mut() {
            Some(entry) => entry,
            None => unreachable!("lookup returned a vacant slot"),
        }
    }

    fn locate(&self, key: &K) -> (StoredHash, Locate) {
        let _g = self.reentrancy.enter();
        let hash = StoredHash::new(self.hasher.hash_one(key));
        let buckets = &self.buckets;
        let at = probe::locate(
            hash,
            buckets.len(),
            |i| buckets[i].state(),
            |i| buckets[i].entry().is_some_and(|e| e.key == *key),
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
        let buckets = &self.buckets;
        probe::lookup(
            hash,
            buckets.len(),
            |i| buckets[i].state(),
            |i| {
                buckets[i]
                    .entry()
                    .is_some_and(|e| <K as Borrow<Q>>::borrow(&e.key) == q)
            },
        )
    }
}

impl<K, V, S> fmt::Debug for NodeHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, Q, V, S> Index<&Q> for NodeHashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        match self.find(key) {
            Some(v) => v,
            None => panic!("key not found in NodeHashMap"),
        }
    }
}

impl<K, V, S> Extend<(K, V)> for NodeHashMap<K, V, S>
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

impl<K, V, S> FromIterator<(K, V)> for NodeHashMap<K, V, S>
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

impl<'a, K, V, S> IntoIterator for &'a NodeHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut NodeHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

pub struct Iter<'a, K, V> {
    buckets: core::slice::Iter<'a, Bucket<K, V>>,
    remaining: usize,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            buckets: self.buckets.clone(),
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
        let entry = self.buckets.by_ref().find_map(Bucket::entry)?;
        self.remaining -= 1;
        Some((&entry.key, &entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

pub struct IterMut<'a, K, V> {
    buckets: core::slice::IterMut<'a, Bucket<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let entry = self.buckets.by_ref().find_map(Bucket::entry_mut)?;
        self.remaining -= 1;
        Some((&entry.key, &mut entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}
