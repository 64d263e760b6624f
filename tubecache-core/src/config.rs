//! Configuration types
//!
//! Configuration is loaded from environment variables with defaults suitable
//! for development. Call [`CacheConfig::validate`] before handing a config to
//! the cache-aside layer.

use crate::{ConfigError, TubeResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the cache-aside layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on any single cache store call. A call that exceeds it is
    /// treated exactly like a miss or a failed write.
    pub cache_timeout: Duration,
    /// Upper bound on any single primary store call. Must exceed
    /// `cache_timeout`.
    pub primary_timeout: Duration,
    /// Lifetime of owner-scoped listings.
    pub scoped_ttl: Duration,
    /// Overwrite the cached record after an update instead of deleting it.
    pub write_through_on_update: bool,
    /// Drop the owner's cached listing after any create/update/delete.
    pub invalidate_scope_on_write: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_timeout: Duration::from_millis(50),
            primary_timeout: Duration::from_secs(2),
            scoped_ttl: Duration::from_secs(60),
            write_through_on_update: false,
            invalidate_scope_on_write: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TUBECACHE_CACHE_TIMEOUT_MS`: per-call cache timeout (default: 50)
    /// - `TUBECACHE_PRIMARY_TIMEOUT_MS`: per-call primary store timeout (default: 2000)
    /// - `TUBECACHE_SCOPED_TTL_SECS`: lifetime of cached listings (default: 60)
    /// - `TUBECACHE_WRITE_THROUGH`: "true" or "false" (default: false)
    /// - `TUBECACHE_INVALIDATE_SCOPE_ON_WRITE`: "true" or "false" (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    ///
    /// Unparseable values fall back to the default for that field.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let millis = |name: &str, fallback: Duration| {
            lookup(name)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };
        let flag = |name: &str, fallback: bool| {
            lookup(name)
                .map(|s| match s.trim().to_lowercase().as_str() {
                    "true" | "1" => true,
                    "false" | "0" => false,
                    _ => fallback,
                })
                .unwrap_or(fallback)
        };

        let scoped_ttl = lookup("TUBECACHE_SCOPED_TTL_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.scoped_ttl);

        Self {
            cache_timeout: millis("TUBECACHE_CACHE_TIMEOUT_MS", defaults.cache_timeout),
            primary_timeout: millis("TUBECACHE_PRIMARY_TIMEOUT_MS", defaults.primary_timeout),
            scoped_ttl,
            write_through_on_update: flag("TUBECACHE_WRITE_THROUGH", defaults.write_through_on_update),
            invalidate_scope_on_write: flag(
                "TUBECACHE_INVALIDATE_SCOPE_ON_WRITE",
                defaults.invalidate_scope_on_write,
            ),
        }
    }

    /// Set the cache call timeout.
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    /// Set the primary store call timeout.
    pub fn with_primary_timeout(mut self, timeout: Duration) -> Self {
        self.primary_timeout = timeout;
        self
    }

    /// Set the lifetime of cached listings.
    pub fn with_scoped_ttl(mut self, ttl: Duration) -> Self {
        self.scoped_ttl = ttl;
        self
    }

    /// Enable or disable write-through after updates.
    pub fn with_write_through(mut self, enabled: bool) -> Self {
        self.write_through_on_update = enabled;
        self
    }

    /// Enable or disable listing invalidation on writes.
    pub fn with_scope_invalidation(mut self, enabled: bool) -> Self {
        self.invalidate_scope_on_write = enabled;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - every duration is positive
    /// - `cache_timeout` is strictly shorter than `primary_timeout`
    pub fn validate(&self) -> TubeResult<()> {
        for (field, value) in [
            ("cache_timeout", self.cache_timeout),
            ("primary_timeout", self.primary_timeout),
            ("scoped_ttl", self.scoped_ttl),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: format!("{:?}", value),
                    reason: "must be positive".to_string(),
                }
                .into());
            }
        }

        if self.cache_timeout >= self.primary_timeout {
            return Err(ConfigError::IncompatibleOptions {
                option_a: format!("cache_timeout={:?}", self.cache_timeout),
                option_b: format!("primary_timeout={:?}", self.primary_timeout),
            }
            .into());
        }

        Ok(())
    }
}

/// Settings for the embedded LMDB cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmdbCacheConfig {
    /// Directory holding the LMDB environment.
    pub path: PathBuf,
    /// Maximum map size in megabytes.
    pub max_size_mb: usize,
}

impl LmdbCacheConfig {
    /// Create LmdbCacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TUBECACHE_LMDB_PATH`: directory for the environment (required)
    /// - `TUBECACHE_LMDB_MAX_SIZE_MB`: map size (default: 256)
    pub fn from_env() -> TubeResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> TubeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup("TUBECACHE_LMDB_PATH")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "TUBECACHE_LMDB_PATH".to_string(),
            })?;

        let max_size_mb = match lookup("TUBECACHE_LMDB_MAX_SIZE_MB") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|mb| *mb > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "TUBECACHE_LMDB_MAX_SIZE_MB".to_string(),
                    value: raw.clone(),
                    reason: "must be a positive integer".to_string(),
                })?,
            None => 256,
        };

        Ok(Self {
            path: PathBuf::from(path),
            max_size_mb,
        })
    }
}
