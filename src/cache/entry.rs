//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// A single memoized result with its creation and expiry instants.
///
/// `expires_at` is always `created_at + ttl`; it is only ever set by
/// [`CacheEntry::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored value
    pub value: Value,
    /// Insertion time
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Instant after which the entry is logically absent
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry inserted at `now` and living `ttl_seconds`.
    pub fn new(value: Value, ttl_seconds: u64, now: DateTime<Utc>) -> Self {
        // Out-of-range TTLs saturate instead of wrapping.
        let expires_at = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            value,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// An entry is expired once `now` reaches `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
