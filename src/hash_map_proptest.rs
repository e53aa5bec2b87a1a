#![cfg(test)]

// Property tests for both backends and the façade, kept inside the crate so
// they can use the shared test hashers.

use crate::test_util::ConstBuildHasher;
use crate::{FlatHashMap, HashMap, NodeHashMap, Storage};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Values are either a bare i32 (stored inline) or padded past a cache line
// (stored out of line) so one state machine covers both layouts.
trait Val: Default {
    fn new(v: i32) -> Self;
    fn get(&self) -> i32;
    fn get_mut(&mut self) -> &mut i32;
}

impl Val for i32 {
    fn new(v: i32) -> Self {
        v
    }
    fn get(&self) -> i32 {
        *self
    }
    fn get_mut(&mut self) -> &mut i32 {
        self
    }
}

struct Padded(i32, #[allow(dead_code)] [u8; 64]);

impl Default for Padded {
    fn default() -> Self {
        Padded::new(0)
    }
}

impl Val for Padded {
    fn new(v: i32) -> Self {
        Padded(v, [0; 64])
    }
    fn get(&self) -> i32 {
        self.0
    }
    fn get_mut(&mut self) -> &mut i32 {
        &mut self.0
    }
}

// Pool-indexed operations to improve shrinking.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    GetOrDefault(usize),
    Erase(usize),
    Remove(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Reserve(usize),
    Clear,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=40).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            1 => idx.clone().prop_map(OpI::GetOrDefault),
            3 => idx.clone().prop_map(OpI::Erase),
            2 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Find),
            1 => prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => (0usize..64).prop_map(OpI::Reserve),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..200).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Runs `ops` against `$sut` and a BTreeMap model. After each op checks:
// - `len`/`is_empty` parity with the model;
// - `len / capacity <= 3/4` and `tombstones / capacity <= 1/4`;
// - capacity is a power of two.
macro_rules! run_state_machine {
    ($sut:expr, $v:ty, $pool:expr, $ops:expr) => {{
        let mut sut = $sut;
        let mut model: BTreeMap<Key, i32> = BTreeMap::new();
        for op in $ops {
            match op {
                OpI::Insert(i, v) => {
                    let k = key_from(&$pool, i);
                    let (slot, inserted) = sut.insert(k.clone(), <$v as Val>::new(v));
                    prop_assert_eq!(slot.get(), v);
                    let prev = model.insert(k, v);
                    prop_assert_eq!(inserted, prev.is_none());
                }
                OpI::GetOrDefault(i) => {
                    let k = key_from(&$pool, i);
                    let got = sut.get_or_default(k.clone()).get();
                    let want = *model.entry(k).or_insert(0);
                    prop_assert_eq!(got, want);
                }
                OpI::Erase(i) => {
                    let k = key_from(&$pool, i);
                    let erased = sut.erase(k.0.as_str());
                    prop_assert_eq!(erased, model.remove(&k).is_some());
                    prop_assert!(!sut.contains(&k));
                }
                OpI::Remove(i) => {
                    let k = key_from(&$pool, i);
                    let got = sut.remove(&k).map(|v| v.get());
                    prop_assert_eq!(got, model.remove(&k));
                }
                OpI::Find(i) => {
                    let k = key_from(&$pool, i);
                    prop_assert_eq!(sut.find(&k).map(|v| v.get()), model.get(&k).copied());
                }
                OpI::Contains(s) => {
                    let has_model = model.keys().any(|k| k.0 == s);
                    prop_assert_eq!(sut.contains(s.as_str()), has_model);
                }
                OpI::Mutate(i, d) => {
                    let k = key_from(&$pool, i);
                    match (sut.find_mut(&k), model.get_mut(&k)) {
                        (Some(v), Some(mv)) => {
                            let v = v.get_mut();
                            *v = v.saturating_add(d);
                            *mv = mv.saturating_add(d);
                        }
                        (None, None) => {}
                        _ => prop_assert!(false, "find_mut disagrees with model"),
                    }
                }
                OpI::Reserve(n) => {
                    let cap = sut.capacity();
                    sut.reserve(n);
                    prop_assert!(sut.capacity() >= cap);
                    prop_assert!((sut.len() + n) * 4 <= sut.capacity() * 3);
                }
                OpI::Clear => {
                    let cap = sut.capacity();
                    sut.clear();
                    model.clear();
                    prop_assert_eq!(sut.capacity(), cap);
                    prop_assert_eq!(sut.tombstones(), 0);
                }
                OpI::Iterate => {
                    let it = sut.iter();
                    prop_assert_eq!(it.len(), model.len());
                    let s: BTreeMap<Key, i32> = it.map(|(k, v)| (k.clone(), v.get())).collect();
                    prop_assert_eq!(&s, &model);
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            prop_assert!(sut.capacity().is_power_of_two());
            prop_assert!(sut.len() * 4 <= sut.capacity() * 3, "load bound broken");
            prop_assert!(sut.tombstones() * 4 <= sut.capacity(), "tombstone bound broken");
        }
        let keys: BTreeSet<Key> = sut.iter().map(|(k, _)| k.clone()).collect();
        prop_assert_eq!(keys, model.keys().cloned().collect::<BTreeSet<_>>());
    }};
}

// Property: state-machine equivalence against an ordered model for each
// map type, with a random hasher.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_flat_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine!(FlatHashMap::<Key, i32>::new(), i32, pool, ops);
    }

    #[test]
    fn prop_node_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine!(NodeHashMap::<Key, Padded>::new(), Padded, pool, ops);
    }

    #[test]
    fn prop_facade_inline_state_machine((pool, ops) in arb_scenario()) {
        let sut = HashMap::<Key, i32>::new();
        prop_assert_eq!(sut.storage(), Storage::Embedded);
        run_state_machine!(sut, i32, pool, ops);
    }

    #[test]
    fn prop_facade_indirect_state_machine((pool, ops) in arb_scenario()) {
        let sut = HashMap::<Key, Padded>::new();
        prop_assert_eq!(sut.storage(), Storage::Indirect);
        run_state_machine!(sut, Padded, pool, ops);
    }
}

// Property: same invariants under worst-case collisions (constant hasher),
// which stresses equality probing and tombstone reuse on one long chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]

    #[test]
    fn prop_flat_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut: FlatHashMap<Key, i32, ConstBuildHasher> = FlatHashMap::with_hasher(ConstBuildHasher);
        run_state_machine!(sut, i32, pool, ops);
    }

    #[test]
    fn prop_node_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut: NodeHashMap<Key, Padded, ConstBuildHasher> = NodeHashMap::with_hasher(ConstBuildHasher);
        run_state_machine!(sut, Padded, pool, ops);
    }
}
