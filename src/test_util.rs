#![cfg(test)]

// Hashers and drop probes shared by the unit tests of both backends.

use std::cell::Cell;
use std::hash::{BuildHasher, Hasher};
use std::rc::Rc;

/// Hashes integers to themselves so tests can place keys on chosen slots.
#[derive(Clone, Copy, Default)]
pub(crate) struct IdentityBuildHasher;

#[derive(Default)]
pub(crate) struct IdentityHasher(u64);

impl BuildHasher for IdentityBuildHasher {
    type Hasher = IdentityHasher;
    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher(0)
    }
}

impl Hasher for IdentityHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes.iter().rev() {
            self.0 = (self.0 << 8) | u64::from(b);
        }
    }
    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
    fn write_usize(&mut self, n: usize) {
        self.0 = n as u64;
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

/// Sends every key to the same hash, forcing full collision chains.
#[derive(Clone, Copy, Default)]
pub(crate) struct ConstBuildHasher;

pub(crate) struct ConstHasher;

impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> ConstHasher {
        ConstHasher
    }
}

impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

/// Counts how many times values minted from it are dropped.
#[derive(Clone, Default)]
pub(crate) struct DropCounter(Rc<Cell<usize>>);

impl DropCounter {
    pub(crate) fn token(&self) -> DropToken {
        DropToken(self.0.clone())
    }
    pub(crate) fn drops(&self) -> usize {
        self.0.get()
    }
}

pub(crate) struct DropToken(Rc<Cell<usize>>);

impl Drop for DropToken {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}
