//! Memoization Module
//!
//! Wraps async producers so that repeated calls with the same [`CacheKey`]
//! are answered from a [`CacheBackend`] until the entry expires.
//!
//! Concurrent callers that miss on the same key are deduplicated: the first
//! one computes, the others wait and then read its result from the cache.
//! Failures are never cached and never shared; a waiter that finds nothing
//! after a failed computation runs the producer itself.

mod key;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::CacheBackend;

pub use key::CacheKey;

type Slot = Arc<tokio::sync::Mutex<()>>;

// == Memoizer ==
/// Turns producers into cached producers over a shared backend.
#[derive(Debug)]
pub struct Memoizer<B> {
    backend: B,
    in_flight: Arc<Mutex<HashMap<String, Slot>>>,
}

impl<B: Clone> Clone for Memoizer<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<B: CacheBackend> Memoizer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The backend used for lookups and writes, e.g. for invalidation.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // == Wrap ==
    /// Binds `producer` to `key` and `ttl` (seconds, `None` = store default).
    ///
    /// Nothing runs until [`Memoized::call`] is awaited.
    pub fn wrap<F, Fut, T, E>(&self, key: CacheKey, ttl: Option<u64>, producer: F) -> Memoized<'_, B, F>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
    {
        Memoized {
            memoizer: self,
            key,
            ttl,
            producer,
        }
    }

    /// Shorthand for `wrap(key, ttl, producer).call().await`.
    pub async fn get_or_compute<F, Fut, T, E>(
        &self,
        key: CacheKey,
        ttl: Option<u64>,
        producer: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
    {
        self.wrap(key, ttl, producer).call().await
    }

    /// Cached value under `key`, if present and still of type `T`.
    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let value = self.backend.get(key.as_str()).await?;
        match serde_json::from_value(value) {
            Ok(hit) => Some(hit),
            Err(e) => {
                warn!("Cached value for {} has an unexpected shape, recomputing: {}", key, e);
                None
            }
        }
    }

    fn acquire_slot(&self, key: &CacheKey) -> SlotGuard {
        let slot = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(in_flight.entry(key.as_str().to_string()).or_default())
        };
        SlotGuard {
            in_flight: Arc::clone(&self.in_flight),
            key: key.as_str().to_string(),
            slot,
        }
    }

    /// Number of keys with a computation in progress or waiting callers.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// == Memoized ==
/// A producer bound to its cache key, ready to be called once.
pub struct Memoized<'a, B, F> {
    memoizer: &'a Memoizer<B>,
    key: CacheKey,
    ttl: Option<u64>,
    producer: F,
}

impl<'a, B, F> Memoized<'a, B, F> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl<'a, B, F, Fut, T, E> Memoized<'a, B, F>
where
    B: CacheBackend,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize + DeserializeOwned,
{
    /// Returns the cached value, or runs the producer once and caches its
    /// success. Producer errors are returned unchanged.
    pub async fn call(self) -> Result<T, E> {
        let Memoized {
            memoizer,
            key,
            ttl,
            producer,
        } = self;

        let guard = memoizer.acquire_slot(&key);
        let _computing = guard.slot.lock().await;

        if let Some(hit) = memoizer.lookup::<T>(&key).await {
            debug!("Memoized hit for {}", key);
            return Ok(hit);
        }

        debug!("Memoized miss for {}, computing", key);
        let result = producer().await;

        match &result {
            Ok(value) => match serde_json::to_value(value) {
                Ok(encoded) => memoizer.backend.set(key.as_str(), encoded, ttl).await,
                Err(e) => warn!("Result for {} is not cacheable, returning uncached: {}", key, e),
            },
            Err(_) => warn!("Producer for {} failed, nothing cached", key),
        }

        result
    }
}

// == Slot Guard ==
/// Holds a per-key slot; the slot is dropped from the map once its last
/// holder goes away, including when a call is cancelled mid-flight.
struct SlotGuard {
    in_flight: Arc<Mutex<HashMap<String, Slot>>>,
    key: String,
    slot: Slot,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only handed out under this lock: map + us means we are last.
        if Arc::strong_count(&self.slot) == 2 {
            in_flight.remove(&self.key);
        }
    }
}
