//! Caching layer for marketdesk-core
//!
//! Provides the single-entry in-memory industry metrics cache.

pub mod metrics_cache;

pub use metrics_cache::{CacheEntry, MetricsCache, INDUSTRY_METRICS_KEY};
