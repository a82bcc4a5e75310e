//! Cache Store Module
//!
//! Main cache engine: bounded HashMap storage with TTL expiration,
//! oldest-insertion eviction and a write-through JSON snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cache::{snapshot, CacheEntry, CacheStats};
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Bounded, TTL-aware key/value cache with optional disk durability.
///
/// The store is synchronous and not internally locked; share it through
/// [`SharedCache`](crate::cache::SharedCache), which serializes every
/// operation.
///
/// Expiry is lazy: expired entries are swept at the start of every `get`
/// and `set`, never by a timer. An idle store may therefore hold expired
/// entries in memory, still bounded by `max_size`.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of live entries
    max_size: usize,
    /// TTL in seconds for entries stored without an explicit TTL
    default_ttl: u64,
    /// Snapshot location, None for a memory-only store
    snapshot_path: Option<PathBuf>,
}

impl CacheStore {
    // == Constructors ==
    /// Opens a persistent store bound to `snapshot_path`.
    ///
    /// Live entries found in the snapshot are loaded; expired ones are
    /// dropped. An unreadable or corrupt snapshot is logged and the store
    /// starts empty. Only invalid capacity/TTL values fail.
    pub fn open(
        snapshot_path: impl Into<PathBuf>,
        max_size: usize,
        default_ttl: u64,
    ) -> Result<Self> {
        let mut store = Self::build(Some(snapshot_path.into()), max_size, default_ttl)?;
        store.load(Utc::now());
        Ok(store)
    }

    /// Creates a store that never touches the filesystem.
    pub fn in_memory(max_size: usize, default_ttl: u64) -> Result<Self> {
        Self::build(None, max_size, default_ttl)
    }

    fn build(snapshot_path: Option<PathBuf>, max_size: usize, default_ttl: u64) -> Result<Self> {
        if max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size must be greater than zero".to_string(),
            ));
        }
        if default_ttl == 0 {
            return Err(CacheError::InvalidConfig(
                "default_ttl must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            max_size,
            default_ttl,
            snapshot_path,
        })
    }

    // == Load ==
    fn load(&mut self, now: DateTime<Utc>) {
        let Some(path) = self.snapshot_path.as_deref() else {
            return;
        };

        match snapshot::load(path) {
            Ok(loaded) => {
                let total = loaded.len();
                self.entries = loaded
                    .into_iter()
                    .filter(|(_, entry)| !entry.is_expired_at(now))
                    .collect();
                info!(
                    "Loaded {} live cache entries from {} ({} expired dropped)",
                    self.entries.len(),
                    path.display(),
                    total - self.entries.len()
                );
            }
            Err(e) => {
                warn!("Ignoring unusable cache snapshot, starting empty: {}", e);
                self.entries.clear();
            }
        }

        self.enforce_capacity();
        self.stats.set_total_entries(self.entries.len());
    }

    /// Trims a snapshot written under a larger `max_size`.
    fn enforce_capacity(&mut self) {
        while self.entries.len() > self.max_size {
            if self.evict_oldest().is_none() {
                break;
            }
        }
    }

    // == Get ==
    /// Returns the live value stored under `key`, if any.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.get_at(key, Utc::now())
    }

    /// [`get`](Self::get) evaluated at `now`.
    pub fn get_at(&mut self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        self.cleanup_at(now);

        match self.entries.get(key) {
            Some(entry) => {
                debug!("Cache hit for key: {}", key);
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                debug!("Cache miss for key: {}", key);
                self.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any existing entry.
    ///
    /// `ttl` is in seconds; `None` or `Some(0)` uses the default TTL. When
    /// the store is full the entry with the oldest insertion time is
    /// evicted first. The snapshot is rewritten before returning.
    pub fn set(&mut self, key: impl Into<String>, value: Value, ttl: Option<u64>) {
        self.set_at(key, value, ttl, Utc::now());
    }

    /// [`set`](Self::set) evaluated at `now`.
    pub fn set_at(
        &mut self,
        key: impl Into<String>,
        value: Value,
        ttl: Option<u64>,
        now: DateTime<Utc>,
    ) {
        let key = key.into();
        self.cleanup_at(now);

        // Overwrites keep the live count unchanged, so only new keys evict.
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict_oldest();
        }

        let ttl = ttl.filter(|t| *t > 0).unwrap_or(self.default_ttl);
        self.entries
            .insert(key.clone(), CacheEntry::new(value, ttl, now));
        self.stats.set_total_entries(self.entries.len());
        debug!("Cache entry set for key: {} (ttl {}s)", key, ttl);

        self.persist();
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self
            .entries
            .iter()
            .min_by(|(ka, a), (kb, b)| a.created_at.cmp(&b.created_at).then_with(|| ka.cmp(kb)))
            .map(|(key, _)| key.clone())?;

        self.entries.remove(&oldest);
        self.stats.record_eviction();
        info!("Evicted oldest cache entry: {}", oldest);
        Some(oldest)
    }

    // == Clear ==
    /// Removes `key`, or every entry when `key` is `None`.
    ///
    /// Clearing an absent key is not an error.
    pub fn clear(&mut self, key: Option<&str>) {
        match key {
            Some(key) => {
                if self.entries.remove(key).is_some() {
                    info!("Cleared cache entry: {}", key);
                }
            }
            None => {
                info!("Clearing all {} cache entries", self.entries.len());
                self.entries.clear();
            }
        }

        self.stats.set_total_entries(self.entries.len());
        self.persist();
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, persisting once if any were removed.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        self.cleanup_at(Utc::now())
    }

    fn cleanup_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let expired = entry.is_expired_at(now);
            if expired {
                debug!("Expired cache entry removed: {}", key);
            }
            !expired
        });

        let removed = before - self.entries.len();
        if removed > 0 {
            self.stats.record_expirations(removed);
            self.stats.set_total_entries(self.entries.len());
            self.persist();
        }
        removed
    }

    // == Persist ==
    /// Write-through to the snapshot. Failures are logged, never returned:
    /// the in-memory state stays authoritative.
    fn persist(&self) {
        if let Some(path) = self.snapshot_path.as_deref() {
            if let Err(e) = snapshot::save(path, &self.entries) {
                error!("Failed to persist cache snapshot: {}", e);
            }
        }
    }

    // == Accessors ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Number of entries currently held, including expired-but-unswept ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is held, without sweeping or touching statistics.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }
}
