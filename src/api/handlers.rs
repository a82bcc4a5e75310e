//! API Handlers
//!
//! HTTP request handlers for each catalog endpoint.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};

use crate::cache::{CacheBackend, CacheStore, SharedCache};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::memo::{CacheKey, Memoizer};
use crate::models::{
    Book, BookSearchParams, CacheStatsResponse, ClearEntryQuery, ClearResponse, HealthResponse,
    LibraryStats,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Memoizer over the shared persistent cache
    pub memo: Memoizer<SharedCache>,
    /// Calibre library queries
    pub catalog: Catalog,
    /// Token required on protected routes
    pub api_token: Option<Arc<str>>,
    /// TTL in seconds for /statistics
    pub statistics_ttl: u64,
    /// TTL in seconds for /books/search
    pub search_ttl: u64,
}

impl AppState {
    /// Creates a new AppState with default TTLs.
    pub fn new(cache: SharedCache, catalog: Catalog, api_token: Option<&str>) -> Self {
        let defaults = Config::default();
        Self {
            memo: Memoizer::new(cache),
            catalog,
            api_token: api_token.map(Arc::from),
            statistics_ttl: defaults.statistics_ttl,
            search_ttl: defaults.search_ttl,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Opens the snapshot-backed cache and the Calibre database.
    pub fn from_config(config: &Config) -> Result<Self> {
        if let Some(parent) = config.cache_file.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!("Could not create cache directory {}: {}", parent.display(), e);
                }
            }
        }

        let store = CacheStore::open(&config.cache_file, config.max_size, config.default_ttl)?;
        let catalog = Catalog::open(config.database_path())?;

        Ok(Self {
            statistics_ttl: config.statistics_ttl,
            search_ttl: config.search_ttl,
            ..Self::new(SharedCache::new(store), catalog, config.api_token.as_deref())
        })
    }

    pub fn cache(&self) -> &SharedCache {
        self.memo.backend()
    }
}

/// Handler for GET /statistics
///
/// Library counts, memoized for `statistics_ttl` seconds.
pub async fn statistics_handler(State(state): State<AppState>) -> Result<Json<LibraryStats>> {
    let key = CacheKey::unit("statistics")?;
    let stats = state
        .memo
        .get_or_compute(key, Some(state.statistics_ttl), || state.catalog.statistics())
        .await?;

    Ok(Json(stats))
}

/// Handler for GET /books/search
///
/// Title/author search, memoized per distinct parameter set.
pub async fn search_handler(
    State(state): State<AppState>,
    params: std::result::Result<Query<BookSearchParams>, QueryRejection>,
) -> Result<Json<Vec<Book>>> {
    let Query(params) = params?;
    if let Some(error_msg) = params.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let params = params.normalized();
    let key = CacheKey::new("search_books", &params)?;
    let books = state
        .memo
        .get_or_compute(key, Some(state.search_ttl), || {
            state.catalog.search_books(params.clone())
        })
        .await?;

    Ok(Json(books))
}

/// Handler for GET /cache/stats
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(state.cache().stats().await.into())
}

/// Handler for DELETE /cache
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache().clear(None).await;
    Json(ClearResponse::all())
}

/// Handler for DELETE /cache/entry?key=...
pub async fn clear_entry_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<ClearEntryQuery>, QueryRejection>,
) -> Result<Json<ClearResponse>> {
    let Query(query) = query?;
    state.cache().clear(Some(&query.key)).await;
    Ok(Json(ClearResponse::key(query.key)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures;
    use tempfile::TempDir;

    fn test_state() -> (TempDir, AppState) {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("metadata.db");
        fixtures::write_library(&db);

        let store = CacheStore::open(dir.path().join("cache.json"), 100, 3600).unwrap();
        let state = AppState::new(
            SharedCache::new(store),
            Catalog::open(&db).unwrap(),
            Some("t".repeat(32).as_str()),
        );
        (dir, state)
    }

    #[tokio::test]
    async fn test_statistics_is_memoized() {
        let (_dir, state) = test_state();

        let first = statistics_handler(State(state.clone())).await.unwrap();
        let second = statistics_handler(State(state.clone())).await.unwrap();

        assert_eq!(first.total_books, 4);
        // Same timestamp: the second response came from the cache.
        assert_eq!(first.last_updated, second.last_updated);
        assert_eq!(state.cache().stats().await.hits, 1);
    }

    #[tokio::test]
    async fn test_search_caches_per_parameters() {
        let (_dir, state) = test_state();

        let dune = BookSearchParams {
            title: Some("Dune".to_string()),
            author: None,
            limit: 100,
        };
        let foundation = BookSearchParams {
            title: Some("Foundation".to_string()),
            ..dune.clone()
        };

        let books = search_handler(State(state.clone()), Ok(Query(dune))).await.unwrap();
        assert_eq!(books.len(), 2);
        let books = search_handler(State(state.clone()), Ok(Query(foundation)))
            .await
            .unwrap();
        assert_eq!(books.len(), 1);

        assert_eq!(state.cache().len().await, 2);
    }

    #[tokio::test]
    async fn test_search_rejects_bad_limit() {
        let (_dir, state) = test_state();

        let params = BookSearchParams {
            title: None,
            author: None,
            limit: 0,
        };
        let result = search_handler(State(state.clone()), Ok(Query(params))).await;

        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
        assert!(state.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_entry_and_clear_all() {
        let (_dir, state) = test_state();
        statistics_handler(State(state.clone())).await.unwrap();

        let key = CacheKey::unit("statistics").unwrap().to_string();
        let response = clear_entry_handler(
            State(state.clone()),
            Ok(Query(ClearEntryQuery { key: key.clone() })),
        )
        .await
        .unwrap();
        assert_eq!(response.key.as_deref(), Some(key.as_str()));
        assert!(state.cache().is_empty().await);

        statistics_handler(State(state.clone())).await.unwrap();
        clear_cache_handler(State(state.clone())).await;
        clear_cache_handler(State(state.clone())).await;
        assert!(state.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
