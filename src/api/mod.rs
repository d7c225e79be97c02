//! API Module
//!
//! HTTP handlers and routing for the node: the peer-to-peer fetch endpoint
//! plus membership, stats and health.
//!
//! # Endpoints
//! - `GET /_peercache/:group/:key` - Fetch a value as raw bytes
//! - `GET /peers` / `PUT /peers` - Read or replace the membership
//! - `GET /stats` - Per-group statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
