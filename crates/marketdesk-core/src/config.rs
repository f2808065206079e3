//! Configuration for marketdesk
//!
//! Read from `~/.config/marketdesk/config.toml` (or an explicit path). A missing
//! file yields defaults; an unreadable or malformed one is an error.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Refresh scheduling and cache lifetime settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Period of the recurring refresh (4 hours)
    pub refresh_interval_secs: u64,

    /// Delay before the single retry after a failed refresh (5 minutes)
    pub retry_delay_secs: u64,

    /// Age after which the cached snapshot counts as stale
    pub ttl_secs: u64,

    /// Upper bound on one run of the aggregation query
    pub query_timeout_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 4 * 60 * 60,
            retry_delay_secs: 5 * 60,
            ttl_secs: 4 * 60 * 60,
            query_timeout_secs: 30,
        }
    }
}

impl MetricsConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Reject zero durations (a zero interval would spin the scheduler)
    pub fn validate(&self) -> Result<(), CoreError> {
        let fields = [
            ("refresh_interval_secs", self.refresh_interval_secs),
            ("retry_delay_secs", self.retry_delay_secs),
            ("ttl_secs", self.ttl_secs),
            ("query_timeout_secs", self.query_timeout_secs),
        ];

        for (name, value) in fields {
            if value == 0 {
                return Err(CoreError::InvalidConfig {
                    message: format!("{} must be greater than zero", name),
                });
            }
        }

        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database holding the `businesses` table
    pub database: Option<PathBuf>,

    /// Cache refresh settings
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// Default config location: `<config_dir>/marketdesk/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("marketdesk").join("config.toml"))
    }

    /// Load and validate config from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(CoreError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = Self::from_toml(&content).map_err(|source| CoreError::ConfigParse {
            path: path.to_path_buf(),
            message: source.message().to_string(),
            source,
        })?;

        config.metrics.validate()?;

        tracing::debug!(
            path = %path.display(),
            refresh_interval_secs = config.metrics.refresh_interval_secs,
            retry_delay_secs = config.metrics.retry_delay_secs,
            "Config loaded"
        );

        Ok(config)
    }

    /// Parse config from a TOML string without validation
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
