//! Cache key derivation for memoized producers.

use std::fmt;

use serde::Serialize;

use crate::error::{CacheError, Result};

/// Separates the producer name from the encoded arguments.
const SEPARATOR: char = ':';

// == Cache Key ==
/// Deterministic key for one producer invocation.
///
/// Built from an explicit producer name plus the canonical JSON encoding of
/// its arguments (object keys sorted). The name may not contain `:`, so the
/// name/argument boundary is unambiguous and distinct inputs never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for `name` called with `args`.
    pub fn new<A>(name: &str, args: &A) -> Result<Self>
    where
        A: Serialize + ?Sized,
    {
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(CacheError::InvalidRequest(format!(
                "producer name must be non-empty and must not contain '{}': {:?}",
                SEPARATOR, name
            )));
        }

        // Going through Value sorts map keys, whatever the source map type.
        let canonical = serde_json::to_value(args)
            .and_then(|value| serde_json::to_string(&value))
            .map_err(|e| {
                CacheError::InvalidRequest(format!("arguments for {} are not encodable: {}", name, e))
            })?;

        Ok(Self(format!("{}{}{}", name, SEPARATOR, canonical)))
    }

    /// Key for a producer that takes no arguments.
    pub fn unit(name: &str) -> Result<Self> {
        Self::new(name, &())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
