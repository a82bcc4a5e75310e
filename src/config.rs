//! Configuration Module
//!
//! Handles loading and validating service configuration from environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::{DEFAULT_MAX_SIZE, DEFAULT_TTL};
use crate::error::{CacheError, Result};

/// Required length of the static API token.
pub const API_TOKEN_LENGTH: usize = 32;

/// Service configuration parameters.
///
/// All values except the API token have sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Location of the cache snapshot file
    pub cache_file: PathBuf,
    /// Maximum number of live cache entries
    pub max_size: usize,
    /// Default TTL in seconds for entries stored without an explicit TTL
    pub default_ttl: u64,
    /// TTL in seconds for memoized library statistics
    pub statistics_ttl: u64,
    /// TTL in seconds for memoized search results
    pub search_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Directory containing the Calibre `metadata.db`
    pub library_path: PathBuf,
    /// Static token required on every protected route
    pub api_token: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_FILE` - Snapshot path (default: calibre_cache.json)
    /// - `CACHE_MAX_SIZE` - Maximum cache entries (default: 100)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 3600)
    /// - `STATISTICS_TTL` - TTL for /statistics (default: 3600)
    /// - `SEARCH_TTL` - TTL for /books/search (default: 1800)
    /// - `SERVER_PORT` - HTTP server port (default: 8000)
    /// - `CALIBRE_LIBRARY_PATH` - Calibre library directory (default: /calibre-library)
    /// - `API_TOKEN` - 32 character access token (required)
    ///
    /// Unset variables take their default; a variable that is set but does
    /// not parse is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            cache_file: lookup("CACHE_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_file),
            max_size: parse_var(&lookup, "CACHE_MAX_SIZE")?.unwrap_or(defaults.max_size),
            default_ttl: parse_var(&lookup, "CACHE_DEFAULT_TTL")?.unwrap_or(defaults.default_ttl),
            statistics_ttl: parse_var(&lookup, "STATISTICS_TTL")?
                .unwrap_or(defaults.statistics_ttl),
            search_ttl: parse_var(&lookup, "SEARCH_TTL")?.unwrap_or(defaults.search_ttl),
            server_port: parse_var(&lookup, "SERVER_PORT")?.unwrap_or(defaults.server_port),
            library_path: lookup("CALIBRE_LIBRARY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.library_path),
            api_token: lookup("API_TOKEN"),
        })
    }

    /// Rejects configurations that would only fail later, at first use.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size must be greater than zero".to_string(),
            ));
        }
        if self.default_ttl == 0 {
            return Err(CacheError::InvalidConfig(
                "default_ttl must be greater than zero".to_string(),
            ));
        }
        match &self.api_token {
            Some(token) if token.chars().count() == API_TOKEN_LENGTH => Ok(()),
            Some(_) => Err(CacheError::InvalidConfig(format!(
                "API_TOKEN must be exactly {} characters",
                API_TOKEN_LENGTH
            ))),
            None => Err(CacheError::TokenNotConfigured),
        }
    }

    /// Path of the Calibre metadata database inside the library.
    pub fn database_path(&self) -> PathBuf {
        self.library_path.join("metadata.db")
    }
}

fn parse_var<T>(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    raw.trim().parse().map(Some).map_err(|e| {
        CacheError::InvalidConfig(format!("{} has invalid value {:?}: {}", name, raw, e))
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from("calibre_cache.json"),
            max_size: DEFAULT_MAX_SIZE,
            default_ttl: DEFAULT_TTL,
            statistics_ttl: 3600,
            search_ttl: 1800,
            server_port: 8000,
            library_path: PathBuf::from("/calibre-library"),
            api_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    fn valid_config() -> Config {
        Config {
            api_token: Some("a".repeat(API_TOKEN_LENGTH)),
            ..Config::default()
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_size, 100);
        assert_eq!(config.default_ttl, 3600);
        assert_eq!(config.search_ttl, 1800);
        assert_eq!(config.server_port, 8000);
        assert_eq!(
            config.database_path(),
            PathBuf::from("/calibre-library/metadata.db")
        );
    }

    #[test]
    fn test_validate_accepts_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = Config {
            max_size: 0,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let config = Config {
            default_ttl: 0,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_token_length() {
        let short = Config {
            api_token: Some("short".to_string()),
            ..valid_config()
        };
        assert!(matches!(short.validate(), Err(CacheError::InvalidConfig(_))));

        let missing = Config {
            api_token: None,
            ..valid_config()
        };
        assert!(matches!(
            missing.validate(),
            Err(CacheError::TokenNotConfigured)
        ));
    }

    #[test]
    fn test_unset_vars_use_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.max_size, 100);
        assert_eq!(config.default_ttl, 3600);
        assert_eq!(config.server_port, 8000);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_set_vars_override_defaults() {
        let config = from_vars(&[
            ("CACHE_MAX_SIZE", "25"),
            ("CACHE_DEFAULT_TTL", "60"),
            ("SEARCH_TTL", "30"),
            ("SERVER_PORT", "9000"),
            ("CALIBRE_LIBRARY_PATH", "/books"),
        ])
        .unwrap();
        assert_eq!(config.max_size, 25);
        assert_eq!(config.default_ttl, 60);
        assert_eq!(config.search_ttl, 30);
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.database_path(), PathBuf::from("/books/metadata.db"));
    }

    #[test]
    fn test_negative_max_size_is_rejected() {
        let err = from_vars(&[("CACHE_MAX_SIZE", "-5")]).unwrap_err();
        assert!(matches!(&err, CacheError::InvalidConfig(msg) if msg.contains("CACHE_MAX_SIZE")));
    }

    #[test]
    fn test_unparseable_ttl_is_rejected() {
        let err = from_vars(&[("CACHE_DEFAULT_TTL", "one hour")]).unwrap_err();
        assert!(matches!(&err, CacheError::InvalidConfig(msg) if msg.contains("CACHE_DEFAULT_TTL")));
    }

    #[test]
    fn test_out_of_range_port_is_rejected() {
        assert!(matches!(
            from_vars(&[("SERVER_PORT", "70000")]),
            Err(CacheError::InvalidConfig(_))
        ));
    }
}
