//! Request DTOs for the node's HTTP API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Longest accepted peer address.
const MAX_PEER_ADDR_LEN: usize = 256;

/// Request body for publishing a membership (PUT /peers)
#[derive(Debug, Clone, Deserialize)]
pub struct SetPeersRequest {
    /// Base addresses of every node in the cluster, e.g. `http://10.0.0.2:3000`
    pub peers: Vec<String>,
}

impl SetPeersRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.peers.is_empty() {
            return Some("Peer list cannot be empty".to_string());
        }
        for peer in &self.peers {
            let peer = peer.trim();
            if peer.is_empty() {
                return Some("Peer address cannot be empty".to_string());
            }
            if peer.len() > MAX_PEER_ADDR_LEN {
                return Some(format!(
                    "Peer address exceeds maximum length of {} characters",
                    MAX_PEER_ADDR_LEN
                ));
            }
            if !peer.starts_with("http://") && !peer.starts_with("https://") {
                return Some(format!("Peer address '{}' must be an http(s) URL", peer));
            }
        }
        None
    }
}
