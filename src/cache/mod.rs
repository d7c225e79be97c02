//! Cache Module
//!
//! Bounded in-memory stores with byte-accounted capacity, TTL expiration and
//! pluggable LRU or LFU eviction.

mod byteview;
mod entry;
mod lfu;
mod lru;
mod store;


use std::time::Duration;

// Re-export public types
pub use byteview::ByteView;
pub use entry::{CacheEntry, Jitter, NoJitter, RandomJitter, DEFAULT_MAX_JITTER};
pub use lfu::LfuEngine;
pub use lru::LruEngine;
pub use store::{CacheOptions, CacheStore, EvictionPolicy};

// == Value ==
/// Anything storable in an eviction engine. Only the size is needed for
/// capacity accounting.
pub trait Value {
    /// Size of the value in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Value for String {
    fn len(&self) -> usize {
        String::len(self)
    }
}

impl Value for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// Callback invoked once for every entry an engine removes.
///
/// It runs while the engine is mutably borrowed, so it cannot call back into
/// the same engine. When the engine sits behind a [`CacheStore`], the callback
/// must not touch that store either: its lock is held.
pub type OnEvicted<V> = Box<dyn FnMut(&str, &V) + Send + Sync>;

// == Eviction Engine ==
/// Shared contract of the LRU and LFU engines.
///
/// Capacity is counted as `key.len() + value.len()` per entry; a `max_bytes`
/// of zero means unbounded.
pub trait EvictionEngine<V>: Send + Sync {
    /// Inserts or updates `key`, then evicts until back under capacity.
    fn add(&mut self, key: &str, value: V, ttl: Duration);

    /// Looks up `key`. Expired entries are removed and reported as missing.
    fn get(&mut self, key: &str) -> Option<&V>;

    /// Removes `key` if present.
    fn remove(&mut self, key: &str) -> bool;

    /// Removes exactly one entry chosen by the policy and returns its key.
    fn remove_oldest(&mut self) -> Option<String>;

    /// Number of live entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently accounted.
    fn bytes(&self) -> u64;

    /// Configured capacity, zero when unbounded.
    fn max_bytes(&self) -> u64;

    /// TTL the engine was configured with.
    fn default_ttl(&self) -> Duration;
}

/// Bytes an entry occupies towards the capacity.
pub(crate) fn entry_size<V: Value>(key: &str, value: &V) -> u64 {
    (key.len() + value.len()) as u64
}
