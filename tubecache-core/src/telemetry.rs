//! Tracing initialisation
//!
//! Sets up a `tracing-subscriber` registry with an env filter and either
//! human-readable or JSON output. Library code only emits events; binaries
//! and test harnesses call [`init_tracing`] once at startup.

use crate::{ConfigError, TubeResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter directives, e.g. `"info,tubecache_storage=debug"`.
    pub filter: String,
    /// Emit JSON lines instead of formatted text.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Read `TUBECACHE_LOG` and `TUBECACHE_LOG_JSON`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            filter: std::env::var("TUBECACHE_LOG").unwrap_or(defaults.filter),
            json: std::env::var("TUBECACHE_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.json),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Fails if the filter directives do not parse or a global subscriber has
/// already been installed.
pub fn init_tracing(config: &TelemetryConfig) -> TubeResult<()> {
    let filter = EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::InvalidValue {
        field: "TUBECACHE_LOG".to_string(),
        value: config.filter.clone(),
        reason: e.to_string(),
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| ConfigError::InvalidValue {
        field: "tracing subscriber".to_string(),
        value: "global".to_string(),
        reason: e.to_string(),
    })?;

    tracing::debug!(filter = %config.filter, json = config.json, "Tracing initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.filter, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = TelemetryConfig {
            filter: "tubecache=notalevel".to_string(),
            json: false,
        };
        let err = init_tracing(&config).expect_err("bad directive should fail");
        assert!(format!("{}", err).contains("TUBECACHE_LOG"));
    }
}
