//! marketdesk-core - Core library for marketdesk
//!
//! Provides the industry metrics model, the SQLite metrics source, and the
//! periodically refreshed stale-but-available metrics cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod models;
pub mod scheduler;
pub mod service;
pub mod source;

pub use config::{AppConfig, MetricsConfig};
pub use error::{CoreError, DegradedState};
pub use event::{EventBus, MetricsEvent};
pub use models::IndustryMetric;
pub use scheduler::RefreshScheduler;
pub use service::{CacheState, MetricsService, RefreshOutcome, RefreshStats};
pub use source::{MetricsSource, SqliteMetricsSource};
