//! peercache - a distributed in-process cache
//!
//! Each node keeps a bounded local cache (LRU or LFU, with TTL) per group.
//! Keys are owned by nodes through a consistent hash ring; a miss is loaded
//! once, either from the owning peer over HTTP or from the group's getter.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod group;
pub mod models;
pub mod peers;
pub mod ring;
pub mod singleflight;
pub mod source;

pub use api::{create_router, AppState};
pub use cache::{ByteView, CacheOptions, CacheStore, EvictionPolicy};
pub use config::Config;
pub use error::{CacheError, Result};
pub use group::{Getter, GetterFn, Group, GroupRegistry, StatsSnapshot};
pub use peers::{HttpPool, PeerFetcher, PeerPicker};
pub use ring::HashRing;
pub use singleflight::SingleflightGroup;
pub use source::DirectorySource;
