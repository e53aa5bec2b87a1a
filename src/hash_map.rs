//! `HashMap`: one operation set over whichever backend fits the pair.
//!
//! The backend is fixed per `(K, V)` instantiation by `select::fits_inline`.
//! Both backends share a union; the associated `INLINE` constant names the
//! initialized field, so every forwarded call is a constant-folded branch
//! and no tag is stored.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::mem::ManuallyDrop;
use core::ops::Index;
use std::collections::hash_map::RandomState;

use crate::error::Result;
use crate::flat_hash_map::{self, FlatHashMap};
use crate::node_hash_map::{self, NodeHashMap};
use crate::policy::{self, INITIAL_CAPACITY};
use crate::select::{self, Storage};

// Forwards `$body` to the live field of `$repr`, bound as `$m`.
macro_rules! dispatch {
    ($repr:expr, |$m:ident| $body:expr) => {
        if Self::INLINE {
            // SAFETY: `INLINE` is fixed for this instantiation and names the
            // field written at construction.
            let $m = unsafe { &*$repr.flat };
            $body
        } else {
            // SAFETY: as above.
            let $m = unsafe { &*$repr.node };
            $body
        }
    };
}

macro_rules! dispatch_mut {
    ($repr:expr, |$m:ident| $body:expr) => {
        if Self::INLINE {
            // SAFETY: `INLINE` is fixed for this instantiation and names the
            // field written at construction.
            let $m = unsafe { &mut *$repr.flat };
            $body
        } else {
            // SAFETY: as above.
            let $m = unsafe { &mut *$repr.node };
            $body
        }
    };
}

union Repr<K, V, S> {
    flat: ManuallyDrop<FlatHashMap<K, V, S>>,
    node: ManuallyDrop<NodeHashMap<K, V, S>>,
}

/// Open-addressing hash map that stores small pairs inline and large pairs
/// out of line.
///
/// ```
/// use hybrid_hashmap::{HashMap, Storage};
///
/// let mut m: HashMap<u32, &str> = HashMap::new();
/// assert_eq!(HashMap::<u32, &str>::STORAGE, Storage::Embedded);
/// let (_, inserted) = m.insert(1, "one");
/// assert!(inserted);
/// assert_eq!(m[&1], "one");
/// assert!(m.erase(&1));
/// assert!(!m.contains(&1));
/// ```
pub struct HashMap<K, V, S = RandomState> {
    repr: Repr<K, V, S>,
}

impl<K, V> HashMap<K, V, RandomState> {
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

impl<K, V> Default for HashMap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashMap<K, V, S> {
    const INLINE: bool = select::fits_inline::<K, V>();

    /// The backend this key/value pair binds to.
    pub const STORAGE: Storage = select::storage_for::<K, V>();

    pub fn with_hasher(hasher: S) -> Self {
        Self::build(INITIAL_CAPACITY, hasher)
    }

    pub fn with_capacity_and_hasher(expected: usize, hasher: S) -> Self {
        let capacity =
            policy::capacity_for(expected).unwrap_or_else(|_| policy::capacity_overflow());
        Self::build(capacity, hasher)
    }

    pub fn try_with_capacity_and_hasher(expected: usize, hasher: S) -> Result<Self> {
        let capacity = policy::capacity_for(expected)?;
        let repr = if Self::INLINE {
            Repr {
                flat: ManuallyDrop::new(FlatHashMap::try_build(capacity, hasher)?),
            }
        } else {
            Repr {
                node: ManuallyDrop::new(NodeHashMap::try_build(capacity, hasher)?),
            }
        };
        Ok(Self { repr })
    }

    fn build(capacity: usize, hasher: S) -> Self {
        let repr = if Self::INLINE {
            Repr {
                flat: ManuallyDrop::new(FlatHashMap::build(capacity, hasher)),
            }
        } else {
            Repr {
                node: ManuallyDrop::new(NodeHashMap::build(capacity, hasher)),
            }
        };
        Self { repr }
    }

    pub fn storage(&self) -> Storage {
        Self::STORAGE
    }

    pub fn len(&self) -> usize {
        dispatch!(self.repr, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots; always a power of two.
    pub fn capacity(&self) -> usize {
        dispatch!(self.repr, |m| m.capacity())
    }

    pub fn tombstones(&self) -> usize {
        dispatch!(self.repr, |m| m.tombstones())
    }

    pub fn load_factor(&self) -> f64 {
        dispatch!(self.repr, |m| m.load_factor())
    }

    pub fn hasher(&self) -> &S {
        dispatch!(self.repr, |m| m.hasher())
    }

    /// Destroys every entry; the capacity is kept.
    pub fn clear(&mut self) {
        dispatch_mut!(self.repr, |m| m.clear())
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        let repr = if Self::INLINE {
            IterRepr {
                // SAFETY: `INLINE` names the live field.
                flat: ManuallyDrop::new(unsafe { &*self.repr.flat }.iter()),
            }
        } else {
            IterRepr {
                // SAFETY: `INLINE` names the live field.
                node: ManuallyDrop::new(unsafe { &*self.repr.node }.iter()),
            }
        };
        Iter { repr }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let repr = if Self::INLINE {
            IterMutRepr {
                // SAFETY: `INLINE` names the live field.
                flat: ManuallyDrop::new(unsafe { &mut *self.repr.flat }.iter_mut()),
            }
        } else {
            IterMutRepr {
                // SAFETY: `INLINE` names the live field.
                node: ManuallyDrop::new(unsafe { &mut *self.repr.node }.iter_mut()),
            }
        };
        IterMut { repr }
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Inserts or updates. Returns the stored value and `true` when the key
    /// was absent. The reference is valid until the next mutation.
    pub fn insert(&mut self, key: K, value: V) -> (&mut V, bool) {
        dispatch_mut!(self.repr, |m| m.insert(key, value))
    }

    pub fn find<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        dispatch!(self.repr, |m| m.find(q))
    }

    pub fn find_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        dispatch_mut!(self.repr, |m| m.find_mut(q))
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        dispatch!(self.repr, |m| m.get_key_value(q))
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        dispatch!(self.repr, |m| m.contains(q))
    }

    /// Returns the value for `key`, inserting `V::default()` first if the
    /// key is absent.
    pub fn get_or_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        dispatch_mut!(self.repr, |m| m.get_or_default(key))
    }

    pub fn erase<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        dispatch_mut!(self.repr, |m| m.erase(q))
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        dispatch_mut!(self.repr, |m| m.remove(q))
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        dispatch_mut!(self.repr, |m| m.remove_entry(q))
    }

    pub fn reserve(&mut self, additional: usize) {
        dispatch_mut!(self.repr, |m| m.reserve(additional))
    }

    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        dispatch_mut!(self.repr, |m| m.try_reserve(additional))
    }
}

impl<K, V, S> Drop for HashMap<K, V, S> {
    fn drop(&mut self) {
        // SAFETY: `INLINE` names the live field; it is dropped exactly once.
        unsafe {
            if Self::INLINE {
                ManuallyDrop::drop(&mut self.repr.flat)
            } else {
                ManuallyDrop::drop(&mut self.repr.node)
            }
        }
    }
}

impl<K, V, S> fmt::Debug for HashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, Q, V, S> Index<&Q> for HashMap<K, V, S>
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
            None => panic!("key not found in HashMap"),
        }
    }
}

impl<K, V, S> Extend<(K, V)> for HashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        dispatch_mut!(self.repr, |m| m.extend(iter))
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
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

impl<'a, K, V, S> IntoIterator for &'a HashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut HashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

union IterRepr<'a, K, V> {
    flat: ManuallyDrop<flat_hash_map::Iter<'a, K, V>>,
    node: ManuallyDrop<node_hash_map::Iter<'a, K, V>>,
}

/// Iterator over the entries of a `HashMap`, in slot order.
pub struct Iter<'a, K, V> {
    repr: IterRepr<'a, K, V>,
}

impl<K, V> Iter<'_, K, V> {
    const INLINE: bool = select::fits_inline::<K, V>();
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        let repr = if Self::INLINE {
            IterRepr {
                // SAFETY: `INLINE` names the live field.
                flat: unsafe { self.repr.flat.clone() },
            }
        } else {
            IterRepr {
                // SAFETY: `INLINE` names the live field.
                node: unsafe { self.repr.node.clone() },
            }
        };
        Iter { repr }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        dispatch_mut!(self.repr, |it| it.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        dispatch!(self.repr, |it| it.size_hint())
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

union IterMutRepr<'a, K, V> {
    flat: ManuallyDrop<flat_hash_map::IterMut<'a, K, V>>,
    node: ManuallyDrop<node_hash_map::IterMut<'a, K, V>>,
}

/// Mutable iterator over the entries of a `HashMap`, in slot order.
pub struct IterMut<'a, K, V> {
    repr: IterMutRepr<'a, K, V>,
}

impl<K, V> IterMut<'_, K, V> {
    const INLINE: bool = select::fits_inline::<K, V>();
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        dispatch_mut!(self.repr, |it| it.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        dispatch!(self.repr, |it| it.size_hint())
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}
