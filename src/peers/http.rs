//! HTTP Peer Transport
//!
//! Peers serve each other's misses over plain HTTP:
//! `GET {peer}/_peercache/{group}/{key}` returns the raw value bytes.
//!
//! [`HttpPool`] keeps the current membership as a hash ring plus one
//! [`HttpFetcher`] per remote peer, published through an `ArcSwap` so lookups
//! never take a lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::models::ErrorResponse;
use crate::peers::{PeerFetcher, PeerPicker};
use crate::ring::HashRing;

/// First path segment of the peer-to-peer endpoint.
pub const PEER_PATH: &str = "_peercache";

fn normalize_addr(addr: &str) -> String {
    addr.trim().trim_end_matches('/').to_string()
}

// == Http Fetcher ==
/// Fetches values from one peer.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    addr: String,
    base: Url,
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher for the peer at `addr`, e.g. `http://10.0.0.2:3000`.
    pub fn new(addr: impl Into<String>, client: reqwest::Client) -> Result<Self> {
        let addr = normalize_addr(&addr.into());
        let base = Url::parse(&addr).map_err(|e| {
            CacheError::InvalidRequest(format!("Invalid peer address '{}': {}", addr, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(CacheError::InvalidRequest(format!(
                "Invalid peer address '{}': not a base URL",
                addr
            )));
        }
        Ok(Self { addr, base, client })
    }

    /// URL of `key` in `group` on this peer, with both segments percent-encoded.
    pub fn url_for(&self, group: &str, key: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                CacheError::Internal(format!("Peer address '{}' has no path", self.addr))
            })?
            .pop_if_empty()
            .extend([PEER_PATH, group, key]);
        Ok(url)
    }

    fn remote_error(&self, message: impl fmt::Display) -> CacheError {
        CacheError::Remote {
            peer: self.addr.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl PeerFetcher for HttpFetcher {
    async fn fetch(&self, group: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.url_for(group, key)?;
        debug!("Fetching '{}/{}' from peer {}", group, key, self.addr);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.remote_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(self.remote_error(format!("{}: {}", status, detail.trim())));
        }

        let bytes = response.bytes().await.map_err(|e| self.remote_error(e))?;
        Ok(bytes.to_vec())
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

// == Peer Set ==
/// One published membership.
struct PeerSet {
    ring: HashRing,
    fetchers: HashMap<String, Arc<HttpFetcher>>,
}

// == Http Pool ==
/// Membership of the cluster as seen from this node, and the [`PeerPicker`]
/// groups use to route misses.
pub struct HttpPool {
    self_addr: String,
    replicas: usize,
    client: reqwest::Client,
    state: ArcSwap<PeerSet>,
}

impl HttpPool {
    // == Constructor ==
    /// Creates a pool with an empty membership. Every request made through it
    /// is bounded by `timeout` and goes straight to the peer, bypassing any
    /// system proxy.
    pub fn new(self_addr: impl Into<String>, replicas: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| CacheError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            self_addr: normalize_addr(&self_addr.into()),
            replicas,
            client,
            state: ArcSwap::from_pointee(PeerSet {
                ring: HashRing::new(replicas, None),
                fetchers: HashMap::new(),
            }),
        })
    }

    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    // == Set Peers ==
    /// Replaces the membership. The new ring is built aside and swapped in
    /// whole, so concurrent lookups see either the old or the new set.
    ///
    /// On error the current membership is kept.
    pub fn set_peers<I, S>(&self, peers: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut addrs: Vec<String> = peers
            .into_iter()
            .map(|peer| normalize_addr(peer.as_ref()))
            .collect();
        if addrs.iter().any(String::is_empty) {
            return Err(CacheError::InvalidRequest(
                "Peer address cannot be empty".to_string(),
            ));
        }
        addrs.sort();
        addrs.dedup();

        let mut fetchers = HashMap::new();
        for addr in addrs.iter().filter(|addr| **addr != self.self_addr) {
            let fetcher = HttpFetcher::new(addr.as_str(), self.client.clone())?;
            fetchers.insert(addr.clone(), Arc::new(fetcher));
        }

        let mut ring = HashRing::new(self.replicas, None);
        ring.add(&addrs);

        self.state.store(Arc::new(PeerSet { ring, fetchers }));
        info!("Peer set updated: {} peers [{}]", addrs.len(), addrs.join(", "));
        if !addrs.contains(&self.self_addr) {
            warn!("Peer set does not include this node ({})", self.self_addr);
        }
        Ok(())
    }

    /// Current peers, sorted.
    pub fn peers(&self) -> Vec<String> {
        self.state.load().ring.peers()
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>> {
        let set = self.state.load();
        let owner = set.ring.get(key).ok()?;
        if owner == self.self_addr {
            return None;
        }
        let fetcher: Arc<dyn PeerFetcher> = set.fetchers.get(owner)?.clone();
        debug!("Picked peer {} for key '{}'", owner, key);
        Some(fetcher)
    }
}

impl fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_addr", &self.self_addr)
            .field("replicas", &self.replicas)
            .field("peers", &self.peers())
            .finish()
    }
}
