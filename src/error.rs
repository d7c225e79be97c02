//! Error types for the cache
//!
//! Provides unified error handling using thiserror. The error is `Clone` so a
//! single load outcome can be handed to every coalesced caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Cache misses are not errors: lookups return `Option`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Named resource (group) not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The local getter failed to produce a value
    #[error("Load failed for key '{key}': {message}")]
    Load { key: String, message: String },

    /// A peer could not be reached or answered with an error
    #[error("Remote fetch from {peer} failed: {message}")]
    Remote { peer: String, message: String },

    /// The hash ring has no members
    #[error("No peers available")]
    NoPeers,

    /// The caller running a coalesced load went away before finishing it
    #[error("In-flight load for key '{0}' was abandoned")]
    Abandoned(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Load { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Remote { .. } => StatusCode::BAD_GATEWAY,
            CacheError::NoPeers => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Abandoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
