//! Request DTOs for the catalog API
//!
//! Defines the query parameters accepted by the HTTP endpoints.

use serde::{Deserialize, Serialize};

/// Largest page a search may request.
pub const MAX_SEARCH_LIMIT: u32 = 1000;

fn default_limit() -> u32 {
    100
}

/// Query parameters for GET /books/search
///
/// # Fields
/// - `title`: Optional fragment of the book title
/// - `author`: Optional fragment of an author name
/// - `limit`: Maximum rows returned, 1..=1000 (default 100)
///
/// Also serialized as the memoization key for the search.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BookSearchParams {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl BookSearchParams {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.limit == 0 || self.limit > MAX_SEARCH_LIMIT {
            return Some(format!(
                "limit must be between 1 and {}",
                MAX_SEARCH_LIMIT
            ));
        }
        None
    }

    /// Treats empty fragments as absent, so `?title=` and no title share
    /// one cache entry.
    pub fn normalized(self) -> Self {
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        Self {
            title: non_empty(self.title),
            author: non_empty(self.author),
            limit: self.limit,
        }
    }
}

/// Query parameters for DELETE /cache/entry
#[derive(Debug, Clone, Deserialize)]
pub struct ClearEntryQuery {
    /// Exact cache key to remove
    pub key: String,
}
