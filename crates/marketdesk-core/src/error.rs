//! Error types for marketdesk-core
//!
//! Provides the error hierarchy with thiserror. None of these ever reach a
//! reader of the metrics cache: refresh failures are logged, counted and
//! published as events, and the last good snapshot keeps being served.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for marketdesk operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // Database Errors
    // ===================
    #[error("Failed to open database: {path}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Metrics query failed: {message}")]
    Query {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Required table missing: {table}")]
    MissingTable { table: String },

    #[error("Database connection lock poisoned")]
    LockPoisoned,

    #[error("Background query task failed")]
    TaskJoin {
        #[source]
        source: tokio::task::JoinError,
    },

    // ===================
    // Refresh Errors
    // ===================
    #[error("Operation timed out after {timeout_secs}s: {operation}")]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    #[error("Metrics source unavailable: {message}")]
    SourceUnavailable { message: String },

    // ===================
    // Config Errors
    // ===================
    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        message: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl CoreError {
    /// Wrap a rusqlite error raised while running the metrics query
    pub fn query(message: impl Into<String>, source: rusqlite::Error) -> Self {
        CoreError::Query {
            message: message.into(),
            source,
        }
    }

    /// Whether a later attempt could plausibly succeed
    ///
    /// Config errors and a missing table need operator action; everything
    /// else (busy database, timeout, dropped connection) is worth retrying.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            CoreError::ConfigRead { .. }
                | CoreError::ConfigParse { .. }
                | CoreError::InvalidConfig { .. }
                | CoreError::MissingTable { .. }
        )
    }
}

/// Health of the metrics cache as seen by readers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedState {
    /// Fresh data within its time-to-live
    Healthy,
    /// Serving an older snapshot (expired, or the last refresh failed)
    Stale { reason: String },
    /// Nothing has ever been loaded
    Empty { reason: String },
}

impl DegradedState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, DegradedState::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        !self.is_healthy()
    }

    /// Whether readers still get data
    pub fn has_data(&self) -> bool {
        !matches!(self, DegradedState::Empty { .. })
    }
}
