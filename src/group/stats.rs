//! Group Statistics Module
//!
//! Tracks how a group's reads were served: local hits, peer loads and local
//! loads, with their failures.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Group Stats ==
/// Live counters, updated lock-free from concurrent `get` calls.
#[derive(Debug, Default)]
pub struct GroupStats {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    local_loads: AtomicU64,
    local_load_errors: AtomicU64,
}

impl GroupStats {
    // == Constructor ==
    /// Creates a GroupStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load_error(&self) {
        self.local_load_errors.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Copies the counters. Cache occupancy fields are left at zero; the group
    /// fills them in.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errors: self.local_load_errors.load(Ordering::Relaxed),
            ..StatsSnapshot::default()
        }
    }
}

// == Stats Snapshot ==
/// Point-in-time view of a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Calls to `get` with a non-empty key
    pub gets: u64,
    /// Gets answered from the local cache
    pub cache_hits: u64,
    /// Values fetched from the owning peer
    pub peer_loads: u64,
    /// Failed peer fetches
    pub peer_errors: u64,
    /// Values loaded through the group's getter
    pub local_loads: u64,
    /// Failed getter calls
    pub local_load_errors: u64,
    /// Entries in the local cache
    pub entries: usize,
    /// Bytes accounted in the local cache
    pub bytes: u64,
    /// Entries evicted from the local cache
    pub evictions: u64,
}

impl StatsSnapshot {
    // == Hit Rate ==
    /// Returns cache_hits / gets, or 0.0 before the first get.
    pub fn hit_rate(&self) -> f64 {
        if self.gets == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.gets as f64
        }
    }
}
