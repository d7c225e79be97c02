//! API Handlers
//!
//! HTTP request handlers for each node endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::group::{Group, GroupRegistry};
use crate::models::{
    GroupStatsResponse, HealthResponse, PeersResponse, SetPeersRequest, StatsResponse,
};
use crate::peers::{HttpPool, PeerPicker};
use crate::source::DirectorySource;

/// Application state shared across all handlers.
///
/// Groups and membership are internally synchronised, so the state is only
/// reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Groups served by this node
    pub registry: Arc<GroupRegistry>,
    /// Cluster membership and peer clients
    pub pool: Arc<HttpPool>,
}

impl AppState {
    /// Creates a new AppState from a registry and a pool.
    pub fn new(registry: Arc<GroupRegistry>, pool: Arc<HttpPool>) -> Self {
        Self { registry, pool }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Publishes the initial membership and registers one group, backed by
    /// the configured source directory and routed through the pool.
    pub fn from_config(config: &Config) -> Result<Self> {
        let pool = Arc::new(HttpPool::new(
            config.self_addr.as_str(),
            config.replicas,
            std::time::Duration::from_secs(config.peer_timeout),
        )?);
        pool.set_peers(config.initial_peers())?;

        let group = Group::new(
            config.group_name.as_str(),
            config.cache_options(),
            DirectorySource::new(&config.source_dir),
        );
        group.register_peers(pool.clone() as Arc<dyn PeerPicker>)?;

        let registry = Arc::new(GroupRegistry::new());
        registry.register(group)?;

        Ok(Self::new(registry, pool))
    }
}

/// Handler for GET /_peercache/:group/:key
///
/// Serves a value to a peer (or any client) as raw bytes, loading it on a miss.
pub async fn fetch_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Response> {
    let group = state
        .registry
        .get(&group)
        .ok_or_else(|| CacheError::NotFound(format!("group '{}'", group)))?;

    let value = group.get(&key).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        value.byte_slice(),
    )
        .into_response())
}

/// Handler for GET /peers
///
/// Returns the current membership.
pub async fn get_peers_handler(State(state): State<AppState>) -> Json<PeersResponse> {
    Json(PeersResponse::new(state.pool.self_addr(), state.pool.peers()))
}

/// Handler for PUT /peers
///
/// Publishes a new membership.
pub async fn set_peers_handler(
    State(state): State<AppState>,
    Json(req): Json<SetPeersRequest>,
) -> Result<Json<PeersResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.pool.set_peers(&req.peers)?;
    info!("Membership replaced through the API");

    Ok(Json(PeersResponse::new(
        state.pool.self_addr(),
        state.pool.peers(),
    )))
}

/// Handler for GET /stats
///
/// Returns statistics of every registered group.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let groups = state
        .registry
        .groups()
        .iter()
        .map(|group| GroupStatsResponse::new(group.name(), group.stats()))
        .collect();

    Json(StatsResponse { groups })
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
