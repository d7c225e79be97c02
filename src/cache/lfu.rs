//! LFU Engine Module
//!
//! Least Frequently Used eviction engine backed by an indexed binary
//! min-heap on access frequency.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::{CacheEntry, EvictionEngine, OnEvicted, Value};

#[derive(Debug)]
struct HeapEntry<V> {
    entry: CacheEntry<V>,
    freq: u64,
}

// == LFU Engine ==
/// Bounded store evicting the least frequently used entry.
///
/// `index` maps each key to its current heap position and is kept in step
/// by every swap, which lets a hit re-establish heap order in O(log n).
/// Equal frequencies are ordered by heap position only.
pub struct LfuEngine<V> {
    /// Maximum accounted bytes, 0 = unbounded
    max_bytes: u64,
    /// Bytes currently accounted
    used_bytes: u64,
    heap: Vec<HeapEntry<V>>,
    index: HashMap<String, usize>,
    on_evicted: Option<OnEvicted<V>>,
    default_ttl: Duration,
}

impl<V: Value> LfuEngine<V> {
    // == Constructor ==
    pub fn new(max_bytes: u64, on_evicted: Option<OnEvicted<V>>, default_ttl: Duration) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            heap: Vec::new(),
            index: HashMap::new(),
            on_evicted,
            default_ttl,
        }
    }

    /// Access frequency of `key`, if present.
    pub fn frequency(&self, key: &str) -> Option<u64> {
        self.index.get(key).map(|&pos| self.heap[pos].freq)
    }

    // == Heap Plumbing ==
    fn less(&self, i: usize, j: usize) -> bool {
        self.heap[i].freq < self.heap[j].freq
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        if let Some(pos) = self.index.get_mut(&self.heap[i].entry.key) {
            *pos = i;
        }
        if let Some(pos) = self.index.get_mut(&self.heap[j].entry.key) {
            *pos = j;
        }
    }

    fn sift_up(&mut self, mut j: usize) {
        while j > 0 {
            let parent = (j - 1) / 2;
            if !self.less(j, parent) {
                break;
            }
            self.swap(parent, j);
            j = parent;
        }
    }

    /// Returns whether the element moved.
    fn sift_down(&mut self, start: usize) -> bool {
        let n = self.heap.len();
        let mut i = start;
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let mut child = left;
            let right = left + 1;
            if right < n && self.less(right, left) {
                child = right;
            }
            if !self.less(child, i) {
                break;
            }
            self.swap(i, child);
            i = child;
        }
        i > start
    }

    fn fix(&mut self, pos: usize) {
        if !self.sift_down(pos) {
            self.sift_up(pos);
        }
    }

    /// Takes the entry at heap position `pos` out of every structure and
    /// fires the eviction callback.
    fn remove_at(&mut self, pos: usize) -> String {
        let last = self.heap.len() - 1;
        if pos != last {
            self.swap(pos, last);
        }
        let removed = self.heap.swap_remove(last);
        if pos < self.heap.len() {
            self.fix(pos);
        }

        self.index.remove(&removed.entry.key);
        self.used_bytes -= removed.entry.size();
        if let Some(callback) = self.on_evicted.as_mut() {
            callback(&removed.entry.key, &removed.entry.value);
        }
        removed.entry.key
    }

    #[cfg(test)]
    pub(crate) fn recount_bytes(&self) -> u64 {
        self.heap.iter().map(|h| h.entry.size()).sum()
    }
}

impl<V: Value + Send + Sync> EvictionEngine<V> for LfuEngine<V> {
    // == Add ==
    /// Inserts or updates `key`.
    ///
    /// An update bumps the frequency, replaces the value and always takes
    /// the new deadline `now + ttl`.
    fn add(&mut self, key: &str, value: V, ttl: Duration) {
        let now = Instant::now();

        if let Some(&pos) = self.index.get(key) {
            let slot = &mut self.heap[pos];
            let old_len = slot.entry.value.len() as u64;
            slot.entry = CacheEntry::new(key, value, now, ttl);
            slot.freq = slot.freq.saturating_add(1);
            let new_len = slot.entry.value.len() as u64;
            self.used_bytes = self.used_bytes - old_len + new_len;
            self.fix(pos);
        } else {
            let entry = CacheEntry::new(key, value, now, ttl);
            self.used_bytes += entry.size();
            self.heap.push(HeapEntry { entry, freq: 1 });
            let pos = self.heap.len() - 1;
            self.index.insert(key.to_owned(), pos);
            self.sift_up(pos);
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if self.remove_oldest().is_none() {
                break;
            }
        }
    }

    // == Get ==
    fn get(&mut self, key: &str) -> Option<&V> {
        let pos = *self.index.get(key)?;
        if self.heap[pos].entry.is_expired() {
            self.remove_at(pos);
            debug!("LFU entry '{}' expired", key);
            return None;
        }
        self.heap[pos].freq = self.heap[pos].freq.saturating_add(1);
        self.fix(pos);
        let pos = *self.index.get(key)?;
        Some(&self.heap[pos].entry.value)
    }

    fn remove(&mut self, key: &str) -> bool {
        let Some(&pos) = self.index.get(key) else {
            return false;
        };
        self.remove_at(pos);
        true
    }

    // == Remove Oldest ==
    /// Pops the minimum-frequency entry, expired or not.
    fn remove_oldest(&mut self) -> Option<String> {
        if self.heap.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    fn len(&self) -> usize {
        self.heap.len()
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
