//! API Routes
//!
//! Configures the Axum router with all catalog endpoints.

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::auth::require_token;
use super::handlers::{
    cache_stats_handler, clear_cache_handler, clear_entry_handler, health_handler,
    search_handler, statistics_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /statistics` - Library counts (token required)
/// - `GET /books/search` - Title/author search (token required)
/// - `GET /cache/stats` - Cache statistics (token required)
/// - `DELETE /cache` - Clear the whole cache (token required)
/// - `DELETE /cache/entry?key=` - Clear one cache entry (token required)
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - Token guard on every route except `/health`
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/statistics", get(statistics_handler))
        .route("/books/search", get(search_handler))
        .route("/cache/stats", get(cache_stats_handler))
        .route("/cache", delete(clear_cache_handler))
        .route("/cache/entry", delete(clear_entry_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
