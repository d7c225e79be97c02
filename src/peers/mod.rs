//! Peers Module
//!
//! Seams between a group and the rest of the cluster: picking the node that
//! owns a key and fetching a value from it.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use http::{HttpFetcher, HttpPool, PEER_PATH};

// == Peer Fetcher ==
/// Client bound to one remote peer.
#[async_trait]
pub trait PeerFetcher: Send + Sync {
    /// Fetches `key` of `group` from the peer.
    async fn fetch(&self, group: &str, key: &str) -> Result<Vec<u8>>;

    /// Address of the peer this fetcher talks to.
    fn addr(&self) -> &str;
}

// == Peer Picker ==
/// Chooses the owner of a key.
pub trait PeerPicker: Send + Sync {
    /// Returns the fetcher for the remote owner of `key`, or `None` when this
    /// node owns it (or no membership is known) and the value must be loaded
    /// locally.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>>;
}
