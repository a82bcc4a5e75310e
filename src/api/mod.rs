//! API Module
//!
//! HTTP handlers and routing for the catalog REST API.
//!
//! # Endpoints
//! - `GET /statistics` - Library counts
//! - `GET /books/search` - Book search
//! - `GET /cache/stats`, `DELETE /cache`, `DELETE /cache/entry` - Cache administration
//! - `GET /health` - Health check endpoint

pub mod auth;
pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
