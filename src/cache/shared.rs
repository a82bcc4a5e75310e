//! Shared Cache Handle
//!
//! Async, clonable handle around a [`CacheStore`] and the narrow backend
//! contract the memoizer depends on.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task;
use tracing::error;

use crate::cache::{CacheStats, CacheStore};

// == Backend Contract ==
/// The get/set/clear surface a memoizer needs from a cache.
///
/// Implementations must serialize their own mutations; callers may share
/// one backend across any number of tasks.
pub trait CacheBackend: Send + Sync {
    /// Returns the live value under `key`, if any.
    fn get(&self, key: &str) -> impl Future<Output = Option<Value>> + Send;

    /// Stores `value` under `key` for `ttl` seconds (`None` = backend default).
    fn set(&self, key: &str, value: Value, ttl: Option<u64>) -> impl Future<Output = ()> + Send;

    /// Removes `key`, or everything when `key` is `None`.
    fn clear(&self, key: Option<&str>) -> impl Future<Output = ()> + Send;
}

// == Shared Cache ==
/// A [`CacheStore`] behind a single async mutex.
///
/// Every operation, including its snapshot write, runs to completion
/// before the next one starts. Operations that may touch the snapshot run
/// on the blocking pool while holding the lock, so a slow disk never
/// stalls a runtime worker.
#[derive(Clone, Debug)]
pub struct SharedCache {
    inner: Arc<Mutex<CacheStore>>,
}

impl SharedCache {
    pub fn new(store: CacheStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.inner.lock().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Runs `op` on the blocking pool with exclusive access to the store.
    ///
    /// The lock travels with the task, so a caller that stops waiting does
    /// not cut the operation short. Returns `None` only if `op` panicked.
    async fn with_store<R, F>(&self, op: F) -> Option<R>
    where
        F: FnOnce(&mut CacheStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        let mut store = Arc::clone(&self.inner).lock_owned().await;
        match task::spawn_blocking(move || op(&mut store)).await {
            Ok(result) => Some(result),
            Err(e) => {
                error!("Cache operation aborted: {}", e);
                None
            }
        }
    }
}

impl CacheBackend for SharedCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let key = key.to_string();
        self.with_store(move |store| store.get(&key)).await.flatten()
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<u64>) {
        let key = key.to_string();
        self.with_store(move |store| store.set(key, value, ttl)).await;
    }

    async fn clear(&self, key: Option<&str>) {
        let key = key.map(str::to_string);
        self.with_store(move |store| store.clear(key.as_deref())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn memory_cache(max_size: usize) -> SharedCache {
        SharedCache::new(CacheStore::in_memory(max_size, 3600).unwrap())
    }

    #[tokio::test]
    async fn test_shared_set_get_clear() {
        let cache = memory_cache(10);

        cache.set("k", json!("v"), None).await;
        assert_eq!(cache.get("k").await, Some(json!("v")));

        cache.clear(Some("k")).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cache = memory_cache(10);
        let other = cache.clone();

        cache.set("k", json!(1), None).await;
        assert_eq!(other.get("k").await, Some(json!(1)));
        assert_eq!(other.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_work_runs_off_the_runtime_thread() {
        let cache = memory_cache(10);
        let runtime_thread = std::thread::current().id();

        let store_thread = cache
            .with_store(|_| std::thread::current().id())
            .await
            .unwrap();

        assert_ne!(store_thread, runtime_thread);
    }

    #[tokio::test]
    async fn test_abandoned_set_still_completes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.json");
        let cache = SharedCache::new(CacheStore::open(&path, 8, 3600).unwrap());

        let _ = tokio::time::timeout(
            std::time::Duration::ZERO,
            cache.set("k", json!(1), None),
        )
        .await;

        // The next operation waits for the write to release the lock.
        assert_eq!(cache.get("k").await, Some(json!(1)));
        assert!(CacheStore::open(&path, 8, 3600).unwrap().contains("k"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sets_respect_capacity() {
        let dir = TempDir::new().unwrap();
        let cache = SharedCache::new(CacheStore::open(dir.path().join("c.json"), 8, 3600).unwrap());

        let mut handles = Vec::new();
        for task in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    cache.set(&format!("t{}-{}", task, i), json!(i), None).await;
                    assert!(cache.len().await <= 8);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len().await, 8);
        assert_eq!(cache.stats().await.evictions, 8 * 25 - 8);

        // The snapshot agrees with memory after the last write.
        let reopened = CacheStore::open(dir.path().join("c.json"), 8, 3600).unwrap();
        assert_eq!(reopened.len(), 8);
    }
}
