//! Group Module
//!
//! A group is a named cache namespace: a local store, a getter for values this
//! node owns, and optionally a peer picker for values other nodes own.
//!
//! # Read path
//! 1. Probe the local cache; a hit returns immediately.
//! 2. On a miss, coalesce concurrent loads of the key.
//! 3. The one load asks the picker for the owner. A remote owner is fetched
//!    over the wire; otherwise the getter runs. Either way the value is added
//!    to the local cache.

pub mod registry;
pub mod stats;

use std::future::Future;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::{ByteView, CacheOptions, CacheStore};
use crate::error::{CacheError, Result};
use crate::peers::{PeerFetcher, PeerPicker};
use crate::singleflight::SingleflightGroup;

pub use registry::GroupRegistry;
pub use stats::{GroupStats, StatsSnapshot};

// == Getter ==
/// Loads a value from the source of truth when this node owns a missing key.
#[async_trait]
pub trait Getter: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>>;
}

/// Adapts an async closure into a [`Getter`].
///
/// ```ignore
/// let getter = GetterFn(|key: String| async move { Ok(key.into_bytes()) });
/// ```
pub struct GetterFn<F>(pub F);

#[async_trait]
impl<F, Fut> Getter for GetterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send + 'static,
{
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        (self.0)(key.to_owned()).await
    }
}

// == Group ==
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    main_cache: CacheStore,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    loader: SingleflightGroup<ByteView>,
    stats: GroupStats,
}

impl Group {
    // == Constructor ==
    pub fn new(
        name: impl Into<String>,
        options: CacheOptions,
        getter: impl Getter + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            getter: Arc::new(getter),
            main_cache: CacheStore::new(options),
            peers: OnceLock::new(),
            loader: SingleflightGroup::new(),
            stats: GroupStats::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The local cache backing this group.
    pub fn cache(&self) -> &CacheStore {
        &self.main_cache
    }

    // == Register Peers ==
    /// Installs the picker used to route misses. Allowed once per group.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers.set(picker).map_err(|_| {
            CacheError::InvalidRequest(format!(
                "Peers already registered for group '{}'",
                self.name
            ))
        })
    }

    pub fn has_peers(&self) -> bool {
        self.peers.get().is_some()
    }

    // == Get ==
    /// Returns the value for `key`, loading it on a miss.
    ///
    /// Load errors reach every coalesced caller unchanged. A failed peer fetch
    /// is not retried locally.
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
        }
        self.stats.record_get();

        if let Some(value) = self.main_cache.get(key) {
            self.stats.record_hit();
            debug!("Cache hit for '{}' in group '{}'", key, self.name);
            return Ok(value);
        }

        debug!("Cache miss for '{}' in group '{}'", key, self.name);
        self.loader.run(key, || self.load(key)).await
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        let peer = self.peers.get().and_then(|picker| picker.pick_peer(key));
        match peer {
            Some(peer) => self.load_from_peer(peer.as_ref(), key).await,
            None => self.load_locally(key).await,
        }
    }

    async fn load_from_peer(&self, peer: &dyn PeerFetcher, key: &str) -> Result<ByteView> {
        match peer.fetch(&self.name, key).await {
            Ok(bytes) => {
                self.stats.record_peer_load();
                Ok(self.populate(key, bytes))
            }
            Err(err) => {
                self.stats.record_peer_error();
                warn!("Peer {} failed to serve '{}': {}", peer.addr(), key, err);
                Err(err)
            }
        }
    }

    async fn load_locally(&self, key: &str) -> Result<ByteView> {
        match self.getter.get(key).await {
            Ok(bytes) => {
                self.stats.record_local_load();
                Ok(self.populate(key, bytes))
            }
            Err(err) => {
                self.stats.record_local_load_error();
                let err = CacheError::Load {
                    key: key.to_string(),
                    message: format!("{:#}", err),
                };
                warn!("{}", err);
                Err(err)
            }
        }
    }

    fn populate(&self, key: &str, bytes: Vec<u8>) -> ByteView {
        let value = ByteView::from(bytes);
        self.main_cache.add(key, value.clone());
        value
    }

    // == Stats ==
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            entries: self.main_cache.len(),
            bytes: self.main_cache.bytes(),
            evictions: self.main_cache.evictions(),
            ..self.stats.snapshot()
        }
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("cache", &self.main_cache)
            .field("has_peers", &self.has_peers())
            .finish()
    }
}
