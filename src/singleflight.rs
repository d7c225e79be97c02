//! Singleflight Module
//!
//! Coalesces concurrent loads of the same key into one execution.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

use crate::error::{CacheError, Result};

type Outcome<T> = Option<Result<T>>;

enum Role<T> {
    Leader(watch::Sender<Outcome<T>>),
    Waiter(watch::Receiver<Outcome<T>>),
}

// == Singleflight Group ==
/// Per-key deduplication of in-flight calls.
///
/// While a call for a key is running, every other caller for that key waits
/// for it and receives a clone of the same result. The record is dropped as
/// soon as the call finishes, so nothing is cached across time.
pub struct SingleflightGroup<T> {
    calls: Mutex<HashMap<String, watch::Receiver<Outcome<T>>>>,
}

impl<T> Default for SingleflightGroup<T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> SingleflightGroup<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // == Run ==
    /// Runs `work` for `key` unless a call for `key` is already in flight, in
    /// which case this waits for that call's result instead.
    ///
    /// The table lock is only held to look up, insert or remove the record,
    /// never while `work` runs. If the leading caller is dropped before
    /// finishing, waiters get [`CacheError::Abandoned`].
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let role = {
            let mut calls = self.calls.lock();
            match calls.get(key) {
                Some(rx) => Role::Waiter(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    calls.insert(key.to_owned(), rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Waiter(mut rx) => {
                trace!("Joining in-flight load for '{}'", key);
                let outcome = rx.wait_for(Option::is_some).await.map(|v| (*v).clone());
                match outcome {
                    Ok(Some(result)) => result,
                    _ => Err(CacheError::Abandoned(key.to_owned())),
                }
            }
            Role::Leader(tx) => {
                let _record = CallRecord { group: self, key };
                let result = work().await;
                // Publish before the record goes, so every waiter that joined sees it.
                let _ = tx.send(Some(result.clone()));
                result
            }
        }
    }

    /// Number of keys with a call in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Removes the in-flight record when the leading call ends, including when
/// its future is dropped part way.
struct CallRecord<'a, T> {
    group: &'a SingleflightGroup<T>,
    key: &'a str,
}

impl<T> Drop for CallRecord<'_, T> {
    fn drop(&mut self) {
        self.group.calls.lock().remove(self.key);
    }
}
