//! LRU Engine Module
//!
//! Least Recently Used eviction engine with byte capacity and TTL expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::entry::deadline;
use crate::cache::{CacheEntry, EvictionEngine, Jitter, OnEvicted, RandomJitter, Value};

// == List Node ==
/// Slot in the recency list. Links are indices into `LruEngine::nodes`.
#[derive(Debug)]
struct Node<V> {
    entry: CacheEntry<V>,
    prev: Option<usize>,
    next: Option<usize>,
}

// == LRU Engine ==
/// Bounded store evicting the least recently used entry.
///
/// Entries live in a `Vec` threaded into a doubly-linked list:
/// - `head` = Most recently used
/// - `tail` = Least recently used
///
/// Removal swaps the last slot into the hole, so the vector stays dense.
pub struct LruEngine<V> {
    /// Maximum accounted bytes, 0 = unbounded
    max_bytes: u64,
    /// Bytes currently accounted
    used_bytes: u64,
    nodes: Vec<Node<V>>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    on_evicted: Option<OnEvicted<V>>,
    default_ttl: Duration,
    jitter: Box<dyn Jitter>,
}

impl<V: Value> LruEngine<V> {
    // == Constructor ==
    /// Creates an engine with the default random TTL jitter.
    ///
    /// # Arguments
    /// * `max_bytes` - Capacity in bytes, 0 for unbounded
    /// * `on_evicted` - Optional callback fired for each removed entry
    /// * `default_ttl` - TTL used by callers that do not pick one
    pub fn new(max_bytes: u64, on_evicted: Option<OnEvicted<V>>, default_ttl: Duration) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            nodes: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            on_evicted,
            default_ttl,
            jitter: Box::new(RandomJitter::default()),
        }
    }

    /// Replaces the jitter source.
    pub fn with_jitter(mut self, jitter: Box<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            keys.push(self.nodes[idx].entry.key.clone());
            cursor = self.nodes[idx].next;
        }
        keys
    }

    // == List Plumbing ==
    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn attach_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        match self.head {
            Some(h) => self.nodes[h].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.detach(idx);
            self.attach_front(idx);
        }
    }

    /// Unlinks and drops the node at `idx`, keeping index, byte count and
    /// callback in step.
    fn remove_at(&mut self, idx: usize) -> String {
        self.detach(idx);
        let node = self.nodes.swap_remove(idx);

        // The former last node now lives at `idx`; repoint its neighbours.
        if idx < self.nodes.len() {
            let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
            match prev {
                Some(p) => self.nodes[p].next = Some(idx),
                None => self.head = Some(idx),
            }
            match next {
                Some(n) => self.nodes[n].prev = Some(idx),
                None => self.tail = Some(idx),
            }
            if let Some(slot) = self.index.get_mut(&self.nodes[idx].entry.key) {
                *slot = idx;
            }
        }

        self.index.remove(&node.entry.key);
        self.used_bytes -= node.entry.size();
        if let Some(callback) = self.on_evicted.as_mut() {
            callback(&node.entry.key, &node.entry.value);
        }
        node.entry.key
    }

    #[cfg(test)]
    pub(crate) fn recount_bytes(&self) -> u64 {
        self.nodes.iter().map(|n| n.entry.size()).sum()
    }
}

impl<V: Value + Send + Sync> EvictionEngine<V> for LruEngine<V> {
    // == Add ==
    /// Inserts or updates `key`.
    ///
    /// The deadline is `now + ttl + jitter`. An update moves the entry to the
    /// front and replaces the value, but only takes the new deadline if the
    /// old one had already passed.
    fn add(&mut self, key: &str, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires_at = deadline(now, ttl.saturating_add(self.jitter.jitter()));

        if let Some(&idx) = self.index.get(key) {
            self.move_to_front(idx);
            let entry = &mut self.nodes[idx].entry;
            let old_len = entry.value.len() as u64;
            entry.value = value;
            if entry.is_expired_at(now) {
                entry.expires_at = expires_at;
            }
            let new_len = entry.value.len() as u64;
            self.used_bytes = self.used_bytes - old_len + new_len;
        } else {
            let entry = CacheEntry {
                key: key.to_owned(),
                value,
                expires_at,
            };
            self.used_bytes += entry.size();
            self.nodes.push(Node {
                entry,
                prev: None,
                next: None,
            });
            let idx = self.nodes.len() - 1;
            self.attach_front(idx);
            self.index.insert(key.to_owned(), idx);
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if self.remove_oldest().is_none() {
                break;
            }
        }
    }

    // == Get ==
    fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        if self.nodes[idx].entry.is_expired() {
            self.remove_at(idx);
            debug!("LRU entry '{}' expired", key);
            return None;
        }
        self.move_to_front(idx);
        Some(&self.nodes[idx].entry.value)
    }

    fn remove(&mut self, key: &str) -> bool {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        self.remove_at(idx);
        true
    }

    // == Remove Oldest ==
    /// Walks from the least recently used end and removes the first expired
    /// entry it meets; if nothing has expired, removes the tail.
    fn remove_oldest(&mut self) -> Option<String> {
        let now = Instant::now();
        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            if self.nodes[idx].entry.is_expired_at(now) {
                return Some(self.remove_at(idx));
            }
            cursor = self.nodes[idx].prev;
        }
        let tail = self.tail?;
        Some(self.remove_at(tail))
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn bytes(&self) -> u64 {
        self.used_bytes
    }

    fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}
