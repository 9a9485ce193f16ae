//! Faster (but not DoS-resistant) hashmap
use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasherDefault, Hasher};

/// Act like a farmhash
///
/// Farmhash isn't a streaming hash, so every write is hashed with the previous state as its
/// seed. `str` keys are written in two pieces (bytes and a terminator) and tuples in more, so
/// every piece has to contribute.
pub struct FarmHashChain(u64);

impl Default for FarmHashChain {
    #[inline]
    fn default() -> FarmHashChain { FarmHashChain(0) }
}

impl Hasher for FarmHashChain {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.0 = farmhash::hash64_with_seed(bytes, self.0);
    }
}

pub type Farm = BuildHasherDefault<FarmHashChain>;
pub type FarmMap<X, Y> = HashMap<X, Y, Farm>;
pub type FarmSet<X> = HashSet<X, Farm>;

pub fn new_farm<X: ::std::hash::Hash + Eq, Y>() -> FarmMap<X, Y> {
    Default::default()
}

/// Stable 64-bit fingerprint, safe to persist in file names between runs.
pub fn fingerprint<S: AsRef<[u8]>>(parts: &[S]) -> u64 {
    let mut joined = Vec::new();
    for part in parts {
        joined.extend_from_slice(part.as_ref());
        joined.push(0xff);
    }
    farmhash::fingerprint64(&joined)
}
