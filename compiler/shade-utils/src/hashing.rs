//! Stable content hashing. Hashes produced here are persisted in the
//! shader cache file, so they must not depend on the process, the platform
//! or the standard library's randomly seeded hashers.

use std::{hash::Hasher, path::Path};

use fxhash::FxHasher64;

/// A deterministic 64-bit hasher. Every variable-length value is written with
/// its length first, so that adjacent fields can never be confused for one
/// another (`"ab", "c"` and `"a", "bc"` hash differently).
#[derive(Default, Clone)]
pub struct StableHasher {
    inner: FxHasher64,
}

impl StableHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a field tag. Tags separate logically distinct sections of a
    /// hashed value.
    pub fn write_tag(&mut self, tag: u8) {
        self.inner.write_u8(tag);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.inner.write_u32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.inner.write_u64(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.inner.write_u8(value as u8);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.inner.write_u64(bytes.len() as u64);
        self.inner.write(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Paths are hashed by their lossy UTF-8 representation.
    pub fn write_path(&mut self, path: &Path) {
        self.write_str(&path.to_string_lossy());
    }

    pub fn finish(&self) -> u64 {
        self.inner.finish()
    }
}

/// Values that can be fed into a [StableHasher].
pub trait StableHash {
    fn stable_hash(&self, hasher: &mut StableHasher);
}

impl StableHash for str {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.write_str(self);
    }
}

impl StableHash for String {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.write_str(self);
    }
}

impl StableHash for u32 {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.write_u32(*self);
    }
}

impl StableHash for bool {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.write_bool(*self);
    }
}

impl StableHash for std::path::PathBuf {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.write_path(self);
    }
}

impl<A: StableHash, B: StableHash> StableHash for (A, B) {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        self.0.stable_hash(hasher);
        self.1.stable_hash(hasher);
    }
}

impl<T: StableHash> StableHash for [T] {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.write_u64(self.len() as u64);
        for item in self {
            item.stable_hash(hasher);
        }
    }
}

impl<T: StableHash> StableHash for Vec<T> {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        self.as_slice().stable_hash(hasher);
    }
}

/// Compute the stable hash of a single value.
pub fn stable_hash<T: StableHash + ?Sized>(value: &T) -> u64 {
    let mut hasher = StableHasher::new();
    value.stable_hash(&mut hasher);
    hasher.finish()
}
