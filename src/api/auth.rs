//! Static token guard
//!
//! Every protected route requires the configured token, sent either in the
//! `X-API-Token` header or the `api_token` query parameter.

use axum::{
    extract::{Query, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tracing::warn;

use super::AppState;
use crate::error::{CacheError, Result};

/// Header carrying the API token.
pub const TOKEN_HEADER: &str = "x-api-token";

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    api_token: Option<String>,
}

/// Rejects requests without the configured token.
pub async fn require_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response> {
    let Some(expected) = state.api_token.as_deref() else {
        warn!("Rejecting request: no API token configured");
        return Err(CacheError::TokenNotConfigured);
    };

    let presented = headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .or(query.api_token.as_deref());

    match presented {
        Some(token) if tokens_match(token, expected) => Ok(next.run(request).await),
        Some(_) => {
            warn!("Rejecting request to {}: invalid API token", request.uri().path());
            Err(CacheError::Unauthorized)
        }
        None => {
            warn!("Rejecting request to {}: missing API token", request.uri().path());
            Err(CacheError::Unauthorized)
        }
    }
}

/// Compares tokens in time independent of where they first differ.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (presented, expected) = (presented.as_bytes(), expected.as_bytes());
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
