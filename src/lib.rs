//! Calibre Cache - read-only Calibre catalog API with a persistent response cache
//!
//! Query results are memoized in a size-bounded, TTL-expiring store that is
//! snapshotted to disk and survives restarts.

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod memo;
pub mod models;

pub use api::AppState;
pub use cache::{CacheBackend, CacheStore, SharedCache};
pub use config::Config;
pub use memo::{CacheKey, Memoizer};
