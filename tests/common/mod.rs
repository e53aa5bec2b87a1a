// Hashers shared by the integration tests.

use std::hash::{BuildHasher, Hasher};

/// Hashes integers to themselves so a test can choose which slot a key
/// probes from.
#[derive(Clone, Copy, Default)]
pub struct IdentityBuildHasher;

#[derive(Default)]
pub struct IdentityHasher(u64);

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
    fn write_i64(&mut self, n: i64) {
        self.0 = n as u64;
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

/// A small multiplicative hasher, standing in for a user-supplied hasher.
#[derive(Clone, Copy, Default)]
pub struct FnvBuildHasher;

pub struct FnvHasher(u64);

impl BuildHasher for FnvBuildHasher {
    type Hasher = FnvHasher;
    fn build_hasher(&self) -> FnvHasher {
        FnvHasher(0xcbf2_9ce4_8422_2325)
    }
}

impl Hasher for FnvHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= u64::from(b);
            self.0 = self.0.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    fn finish(&self) -> u64 {
        self.0
    }
}
