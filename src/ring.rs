//! Consistent Hash Ring
//!
//! Maps keys to peers so that a membership change only moves the keys on the
//! arcs next to the peer that joined or left.
//!
//! Each peer is placed on the ring `replicas` times, at `hash("{i}{peer}")`
//! for `i in 0..replicas`. A key belongs to the first virtual node at or after
//! its own hash, wrapping around to the smallest one.

use std::collections::{BTreeSet, HashMap};

use crate::error::{CacheError, Result};

/// Virtual nodes per peer unless configured otherwise.
pub const DEFAULT_REPLICAS: usize = 50;

/// Hash function placing keys and virtual nodes on the ring.
pub type HashFn = fn(&[u8]) -> u32;

/// CRC32C of the input.
pub fn default_hash(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

// == Hash Ring ==
#[derive(Debug, Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Sorted virtual node hashes
    keys: Vec<u32>,
    /// Virtual node hash -> peer
    owners: HashMap<u32, String>,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS, None)
    }
}

impl HashRing {
    // == Constructor ==
    /// Creates an empty ring. `hash` defaults to [`default_hash`]; a replica
    /// count of zero is raised to one.
    pub fn new(replicas: usize, hash: Option<HashFn>) -> Self {
        Self {
            hash: hash.unwrap_or(default_hash),
            replicas: replicas.max(1),
            keys: Vec::new(),
            owners: HashMap::new(),
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    fn virtual_hashes<'a>(&'a self, peer: &'a str) -> impl Iterator<Item = u32> + 'a {
        (0..self.replicas).map(move |i| (self.hash)(format!("{}{}", i, peer).as_bytes()))
    }

    // == Add ==
    /// Places every peer on the ring.
    ///
    /// On a virtual node collision the peer added last owns the slot.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            let hashes: Vec<u32> = self.virtual_hashes(peer).collect();
            for hash in hashes {
                if self.owners.insert(hash, peer.to_owned()).is_none() {
                    self.keys.push(hash);
                }
            }
        }
        self.keys.sort_unstable();
    }

    // == Remove ==
    /// Takes `peer` off the ring.
    pub fn remove(&mut self, peer: &str) {
        let hashes: Vec<u32> = self.virtual_hashes(peer).collect();
        for hash in hashes {
            if self.owners.get(&hash).is_some_and(|owner| owner == peer) {
                self.owners.remove(&hash);
            }
        }
        let owners = &self.owners;
        self.keys.retain(|hash| owners.contains_key(hash));
    }

    // == Get ==
    /// Returns the peer owning `key`.
    pub fn get(&self, key: &str) -> Result<&str> {
        if self.keys.is_empty() {
            return Err(CacheError::NoPeers);
        }
        let hash = (self.hash)(key.as_bytes());
        let idx = self.keys.partition_point(|&k| k < hash) % self.keys.len();
        self.owners
            .get(&self.keys[idx])
            .map(String::as_str)
            .ok_or(CacheError::NoPeers)
    }

    /// Distinct peers on the ring, sorted.
    pub fn peers(&self) -> Vec<String> {
        self.owners
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
