//! In-memory cache for the industry metrics snapshot
//!
//! Holds a single entry under [`INDUSTRY_METRICS_KEY`]. The snapshot is an
//! `Arc<Vec<_>>` swapped under a `parking_lot::RwLock`, so readers clone a
//! pointer and never see a half-written collection.
//!
//! Expiry:
//! - Every entry carries an expiry derived from the TTL
//! - An expired entry is still returned (stale-but-available)
//! - Only a successful refresh replaces the entry; nothing clears it

use crate::models::IndustryMetric;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Name of the single cached key
pub const INDUSTRY_METRICS_KEY: &str = "industryMetrics";

/// A cached snapshot with its expiry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    metrics: Arc<Vec<IndustryMetric>>,
    stored_at: Instant,
    expires_at: Instant,
    refreshed_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(metrics: Vec<IndustryMetric>, ttl: Duration) -> Self {
        let stored_at = Instant::now();
        Self {
            metrics: Arc::new(metrics),
            stored_at,
            expires_at: stored_at + ttl,
            refreshed_at: Utc::now(),
        }
    }

    pub fn metrics(&self) -> Arc<Vec<IndustryMetric>> {
        Arc::clone(&self.metrics)
    }

    /// Wall-clock time of the refresh that produced this entry
    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// Time since the entry was stored
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Single-entry metrics cache with a fixed TTL
pub struct MetricsCache {
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
    empty: Arc<Vec<IndustryMetric>>,
}

impl MetricsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
            empty: Arc::new(Vec::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace the whole snapshot
    pub fn replace(&self, metrics: Vec<IndustryMetric>) {
        let entry = CacheEntry::new(metrics, self.ttl);
        let industries = entry.metrics.len();

        *self.entry.write() = Some(entry);

        tracing::debug!(key = INDUSTRY_METRICS_KEY, industries, "Cache entry replaced");
    }

    /// Current snapshot, or an empty collection if nothing was ever stored
    pub fn get(&self) -> Arc<Vec<IndustryMetric>> {
        match self.entry.read().as_ref() {
            Some(entry) => entry.metrics(),
            None => Arc::clone(&self.empty),
        }
    }

    /// Clone of the current entry with its timestamps
    pub fn entry(&self) -> Option<CacheEntry> {
        self.entry.read().clone()
    }

    pub fn is_populated(&self) -> bool {
        self.entry.read().is_some()
    }
}
