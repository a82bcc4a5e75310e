//! Cache Module
//!
//! Persistent, size-bounded, TTL-expiring key/value cache.

mod entry;
mod shared;
pub mod snapshot;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use shared::{CacheBackend, SharedCache};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Default maximum number of live entries
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default TTL in seconds
pub const DEFAULT_TTL: u64 = 3600;
