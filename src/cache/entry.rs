//! Cache Entry Module
//!
//! Defines individual cache entries with TTL support, and the jitter source
//! used to spread expiry deadlines.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cache::{entry_size, Value};

/// Upper bound of the default TTL jitter.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_secs(60);

/// Deadline used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

// == Cache Entry ==
/// A single cache entry: key, value and expiry deadline.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The entry key
    pub key: String,
    /// The stored value
    pub value: V,
    /// Instant at which the entry stops being served
    pub expires_at: Instant,
}

impl<V: Value> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry expiring `ttl` after `now`.
    pub fn new(key: impl Into<String>, value: V, now: Instant, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            expires_at: deadline(now, ttl),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its deadline, so a
    /// zero TTL is expired immediately.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Remaining time to live, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Bytes this entry occupies towards the capacity.
    pub fn size(&self) -> u64 {
        entry_size(&self.key, &self.value)
    }
}

/// Returns `now + ttl`, saturating to a far-future deadline on overflow.
pub(crate) fn deadline(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

// == Jitter ==
/// Source of the random offset added to LRU expiry deadlines.
///
/// Injectable so tests can make expiry deterministic.
pub trait Jitter: Send + Sync {
    fn jitter(&mut self) -> Duration;
}

/// Uniform jitter in whole seconds over `[0, max)`.
#[derive(Debug)]
pub struct RandomJitter {
    max_secs: u64,
    rng: StdRng,
}

impl RandomJitter {
    pub fn new(max: Duration) -> Self {
        Self {
            max_secs: max.as_secs(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic jitter for reproducible runs.
    pub fn seeded(max: Duration, seed: u64) -> Self {
        Self {
            max_secs: max.as_secs(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_JITTER)
    }
}

impl Jitter for RandomJitter {
    fn jitter(&mut self) -> Duration {
        if self.max_secs == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs(self.rng.gen_range(0..self.max_secs))
    }
}

/// Jitter that always returns zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJitter;

impl Jitter for NoJitter {
    fn jitter(&mut self) -> Duration {
        Duration::ZERO
    }
}
