//! Response DTOs for the node's HTTP API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::{Deserialize, Serialize};

use crate::group::StatsSnapshot;

/// Response body for the membership endpoints (GET/PUT /peers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeersResponse {
    /// This node's own address
    pub self_addr: String,
    /// Current members, sorted
    pub peers: Vec<String>,
}

impl PeersResponse {
    pub fn new(self_addr: impl Into<String>, peers: Vec<String>) -> Self {
        Self {
            self_addr: self_addr.into(),
            peers,
        }
    }
}

/// Statistics of one group
#[derive(Debug, Clone, Serialize)]
pub struct GroupStatsResponse {
    /// Group name
    pub name: String,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    /// Hit rate (cache_hits / gets)
    pub hit_rate: f64,
}

impl GroupStatsResponse {
    /// Creates a new GroupStatsResponse from a stats snapshot
    pub fn new(name: impl Into<String>, stats: StatsSnapshot) -> Self {
        Self {
            name: name.into(),
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// One entry per registered group, sorted by name
    pub groups: Vec<GroupStatsResponse>,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
///
/// Also parsed by peers to recover the message of a failed remote load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peers_response_serialize() {
        let resp = PeersResponse::new("http://a:1", vec!["http://a:1".to_string()]);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"self_addr\":\"http://a:1\""));
        assert!(json.contains("\"peers\":[\"http://a:1\"]"));
    }

    #[test]
    fn test_group_stats_hit_rate() {
        let stats = StatsSnapshot {
            gets: 100,
            cache_hits: 80,
            ..StatsSnapshot::default()
        };
        let resp = GroupStatsResponse::new("scores", stats);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_group_stats_flattened() {
        let resp = GroupStatsResponse::new("scores", StatsSnapshot::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"name\":\"scores\""));
        assert!(json.contains("\"gets\":0"));
        assert!(json.contains("\"hit_rate\":0.0"));
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_round_trip() {
        let json = serde_json::to_string(&ErrorResponse::new("Something went wrong")).unwrap();
        let parsed: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.error, "Something went wrong");
    }
}
