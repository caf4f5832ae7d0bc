//! Bounded set of already-seen message fingerprints.

use std::collections::HashSet;

/// Default number of fingerprints kept before the set is wiped.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Set of processed fingerprints.
///
/// When it grows past `capacity` the whole set is cleared instead of
/// evicting single entries. Messages seen before a reset can be emitted
/// again afterwards.
#[derive(Debug)]
pub struct FingerprintCache {
    seen: HashSet<String>,
    capacity: usize,
    resets: u64,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            capacity,
            resets: 0,
        }
    }

    /// Record a fingerprint. Returns false if it was already present.
    pub fn insert(&mut self, fingerprint: String) -> bool {
        if !self.seen.insert(fingerprint) {
            return false;
        }
        if self.seen.len() > self.capacity {
            self.seen.clear();
            self.resets += 1;
        }
        true
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// How many times the set overflowed and was wiped.
    pub fn resets(&self) -> u64 {
        self.resets
    }
}

impl Default for FingerprintCache {
    fn default() -> Self {
        Self::new()
    }
}
