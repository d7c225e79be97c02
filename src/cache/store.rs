//! Cache Store Module
//!
//! Lock-synchronised façade over one eviction engine, built lazily on the
//! first insert.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::cache::{
    ByteView, EvictionEngine, LfuEngine, LruEngine, OnEvicted, RandomJitter, Value,
    DEFAULT_MAX_JITTER,
};
use crate::error::CacheError;

// == Eviction Policy ==
/// Which engine backs a [`CacheStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    #[default]
    Lru,
    Lfu,
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "lfu" => Ok(Self::Lfu),
            other => Err(CacheError::InvalidRequest(format!(
                "unknown eviction policy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lru => f.write_str("lru"),
            Self::Lfu => f.write_str("lfu"),
        }
    }
}

// == Cache Options ==
/// Parameters captured when the engine is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    pub policy: EvictionPolicy,
    /// Capacity in bytes, 0 = unbounded
    pub max_bytes: u64,
    pub default_ttl: Duration,
    /// Upper bound of the LRU expiry jitter
    pub max_jitter: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            policy: EvictionPolicy::Lru,
            max_bytes: 0,
            default_ttl: Duration::from_secs(300),
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl CacheOptions {
    fn build_engine<V>(&self, evictions: Arc<AtomicU64>) -> Box<dyn EvictionEngine<V>>
    where
        V: Value + Send + Sync + 'static,
    {
        let on_evicted: OnEvicted<V> = Box::new(move |key: &str, _value: &V| {
            evictions.fetch_add(1, Ordering::Relaxed);
            trace!("Evicted cache entry '{}'", key);
        });

        match self.policy {
            EvictionPolicy::Lru => Box::new(
                LruEngine::new(self.max_bytes, Some(on_evicted), self.default_ttl)
                    .with_jitter(Box::new(RandomJitter::new(self.max_jitter))),
            ),
            EvictionPolicy::Lfu => Box::new(LfuEngine::new(
                self.max_bytes,
                Some(on_evicted),
                self.default_ttl,
            )),
        }
    }
}

// == Cache Store ==
/// Thread-safe cache façade.
///
/// One `RwLock` guards the engine for every operation. The engine itself is
/// built under that lock on the first insert.
pub struct CacheStore<V = ByteView> {
    options: CacheOptions,
    engine: RwLock<Option<Box<dyn EvictionEngine<V>>>>,
    /// Removals reported by the engine callback (evictions and expiries)
    evictions: Arc<AtomicU64>,
}

impl<V> CacheStore<V>
where
    V: Value + Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty store; nothing is allocated until the first add.
    pub fn new(options: CacheOptions) -> Self {
        Self {
            options,
            engine: RwLock::new(None),
            evictions: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    // == Add ==
    /// Stores `value` under `key` with the configured default TTL.
    pub fn add(&self, key: &str, value: V) {
        let mut guard = self.engine.write();
        let engine = guard.get_or_insert_with(|| self.options.build_engine(self.evictions.clone()));
        let ttl = engine.default_ttl();
        engine.add(key, value, ttl);
    }

    // == Get ==
    /// Returns a clone of the cached value, if present and unexpired.
    ///
    /// Lookups update recency or frequency, so the shared guard is only used
    /// to see whether the engine exists before upgrading.
    pub fn get(&self, key: &str) -> Option<V> {
        let guard = self.engine.upgradable_read();
        if guard.is_none() {
            return None;
        }
        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        guard.as_mut()?.get(key).cloned()
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        match self.engine.write().as_mut() {
            Some(engine) => engine.remove(key),
            None => false,
        }
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.engine.read().as_ref().map_or(0, |engine| engine.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently accounted by the engine.
    pub fn bytes(&self) -> u64 {
        self.engine.read().as_ref().map_or(0, |engine| engine.bytes())
    }

    /// Entries removed by the engine so far.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Whether the backing engine has been built yet.
    pub fn is_initialized(&self) -> bool {
        self.engine.read().is_some()
    }
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("options", &self.options)
            .field("initialized", &self.engine.read().is_some())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn options(policy: EvictionPolicy, max_bytes: u64) -> CacheOptions {
        CacheOptions {
            policy,
            max_bytes,
            default_ttl: Duration::from_secs(300),
            max_jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_store_lazy_initialization() {
        let store: CacheStore = CacheStore::new(options(EvictionPolicy::Lru, 0));

        assert!(store.get("missing").is_none());
        assert!(!store.is_initialized(), "get must not build the engine");
        assert_eq!(store.len(), 0);

        store.add("key", ByteView::from("value"));

        assert!(store.is_initialized());
        assert_eq!(store.get("key"), Some(ByteView::from("value")));
    }

    #[test]
    fn test_store_remove() {
        let store: CacheStore = CacheStore::new(options(EvictionPolicy::Lfu, 0));

        assert!(!store.remove("key"));
        store.add("key", ByteView::from("value"));
        assert!(store.remove("key"));
        assert!(store.get("key").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_lru_eviction_counts() {
        let cap = ("key1value1key2value2").len() as u64;
        let store: CacheStore = CacheStore::new(options(EvictionPolicy::Lru, cap));

        store.add("key1", ByteView::from("value1"));
        store.add("key2", ByteView::from("value2"));
        store.add("key3", ByteView::from("value3"));

        assert!(store.get("key1").is_none());
        assert_eq!(store.len(), 2);
        assert_eq!(store.evictions(), 1);
        assert!(store.bytes() <= cap);
    }

    #[test]
    fn test_store_lfu_policy() {
        let cap = ("k1v1").len() as u64 * 2;
        let store: CacheStore = CacheStore::new(options(EvictionPolicy::Lfu, cap));

        store.add("k1", ByteView::from("v1"));
        store.add("k2", ByteView::from("v2"));
        store.get("k1");
        store.add("k3", ByteView::from("v3"));

        assert!(store.get("k1").is_some());
        assert!(store.get("k2").is_none());
    }

    #[test]
    fn test_store_concurrent_adds_respect_capacity() {
        let cap = 200;
        let store: Arc<CacheStore> = Arc::new(CacheStore::new(options(EvictionPolicy::Lru, cap)));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("t{}-k{}", t, i);
                        store.add(&key, ByteView::from("payload"));
                        store.get(&key);
                        assert!(store.bytes() <= cap);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(store.bytes() <= cap);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("LRU".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Lru);
        assert_eq!(" lfu ".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Lfu);
        assert!("arc".parse::<EvictionPolicy>().is_err());
        assert_eq!(EvictionPolicy::Lfu.to_string(), "lfu");
    }
}
