//! Configuration Module
//!
//! Handles loading and managing node configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CacheOptions, EvictionPolicy};
use crate::ring::DEFAULT_REPLICAS;

/// Node configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the group this node serves
    pub group_name: String,
    /// Local cache capacity in bytes, 0 for unbounded
    pub cache_bytes: u64,
    /// TTL in seconds for cached entries
    pub default_ttl: u64,
    /// Upper bound in seconds of the random extra TTL on LRU entries
    pub ttl_jitter: u64,
    /// Eviction policy of the local cache
    pub eviction_policy: EvictionPolicy,
    /// HTTP server port
    pub server_port: u16,
    /// Address other peers reach this node at
    pub self_addr: String,
    /// Initial cluster membership; empty means this node alone
    pub peers: Vec<String>,
    /// Virtual nodes per peer on the hash ring
    pub replicas: usize,
    /// Timeout in seconds of a peer fetch
    pub peer_timeout: u64,
    /// Directory the group loads values from
    pub source_dir: PathBuf,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_peers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|peer| !peer.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_GROUP` - Group served by this node (default: default)
    /// - `CACHE_BYTES` - Cache capacity in bytes (default: 67108864)
    /// - `DEFAULT_TTL` - Entry TTL in seconds (default: 300)
    /// - `TTL_JITTER` - Maximum LRU TTL jitter in seconds (default: 60)
    /// - `EVICTION_POLICY` - `lru` or `lfu` (default: lru)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SELF_ADDR` - This node's peer address (default: http://127.0.0.1:{port})
    /// - `PEERS` - Comma-separated peer addresses (default: this node only)
    /// - `REPLICAS` - Virtual nodes per peer (default: 50)
    /// - `PEER_TIMEOUT` - Peer fetch timeout in seconds (default: 5)
    /// - `SOURCE_DIR` - Back-end directory (default: ./data)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let server_port = env_or("SERVER_PORT", defaults.server_port);

        Self {
            group_name: env::var("CACHE_GROUP")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.group_name),
            cache_bytes: env_or("CACHE_BYTES", defaults.cache_bytes),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            ttl_jitter: env_or("TTL_JITTER", defaults.ttl_jitter),
            eviction_policy: env_or("EVICTION_POLICY", defaults.eviction_policy),
            server_port,
            self_addr: env::var("SELF_ADDR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", server_port)),
            peers: env::var("PEERS")
                .map(|v| parse_peers(&v))
                .unwrap_or_default(),
            replicas: env_or("REPLICAS", defaults.replicas),
            peer_timeout: env_or("PEER_TIMEOUT", defaults.peer_timeout),
            source_dir: env::var("SOURCE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.source_dir),
        }
    }

    /// Options for the group's local cache.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            policy: self.eviction_policy,
            max_bytes: self.cache_bytes,
            default_ttl: Duration::from_secs(self.default_ttl),
            max_jitter: Duration::from_secs(self.ttl_jitter),
        }
    }

    /// Membership to start with: the configured peers, or this node alone.
    pub fn initial_peers(&self) -> Vec<String> {
        if self.peers.is_empty() {
            vec![self.self_addr.clone()]
        } else {
            self.peers.clone()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group_name: "default".to_string(),
            cache_bytes: 64 * 1024 * 1024,
            default_ttl: 300,
            ttl_jitter: 60,
            eviction_policy: EvictionPolicy::Lru,
            server_port: 3000,
            self_addr: "http://127.0.0.1:3000".to_string(),
            peers: Vec::new(),
            replicas: DEFAULT_REPLICAS,
            peer_timeout: 5,
            source_dir: PathBuf::from("./data"),
        }
    }
}
