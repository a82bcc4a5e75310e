//! Error types for the catalog cache service
//!
//! Provides unified error handling using thiserror.

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the catalog cache service.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or wrong API token
    #[error("Invalid API token")]
    Unauthorized,

    /// No API token configured on the server side
    #[error("API token not configured")]
    TokenNotConfigured,

    /// Catalog database failure
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Snapshot file could not be read or written
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Catalog(err.to_string())
    }
}

impl From<QueryRejection> for CacheError {
    fn from(rejection: QueryRejection) -> Self {
        CacheError::InvalidRequest(rejection.body_text())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Unauthorized => StatusCode::FORBIDDEN,
            CacheError::InvalidConfig(_)
            | CacheError::TokenNotConfigured
            | CacheError::Catalog(_)
            | CacheError::Snapshot(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the catalog cache service.
pub type Result<T> = std::result::Result<T, CacheError>;
