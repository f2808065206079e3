//! Industry metrics service
//!
//! Owns the cache, runs refreshes against a [`MetricsSource`] and exposes the
//! non-blocking accessor used by request handlers and the chat assistant.
//!
//! Refresh policy:
//! - one refresh at a time (in-flight flag); overlapping calls are skipped
//! - on success the snapshot is replaced wholesale
//! - on failure the old snapshot stays and exactly one retry is scheduled
//!   after `retry_delay`; a failed retry waits for the next interval

use crate::cache::{CacheEntry, MetricsCache};
use crate::config::MetricsConfig;
use crate::error::{CoreError, DegradedState};
use crate::event::{EventBus, MetricsEvent};
use crate::models::{find_industry, IndustryMetric};
use crate::scheduler::RefreshScheduler;
use crate::source::MetricsSource;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Result of one refresh attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cache replaced with this many industries
    Refreshed { industries: usize },
    /// Query failed; previous snapshot kept
    Failed {
        error: String,
        retry_scheduled: bool,
    },
    /// Another refresh was already running
    Skipped,
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed { .. })
    }
}

/// Externally visible lifecycle of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing loaded yet; readers get an empty collection
    Uninitialized,
    /// Serving the last successful snapshot
    Populated,
    /// A query is in flight
    Refreshing,
    /// Last refresh failed, serving the old snapshot until the retry runs
    StaleRetryPending,
    /// The retry failed too; serving the old snapshot until the next interval
    Stale,
}

/// Refresh counters for alerting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Scheduled,
    Retry,
}

/// Resets the in-flight flag even if the refresh future is dropped
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodically refreshed, stale-but-available industry metrics cache
pub struct MetricsService<S: MetricsSource> {
    source: S,
    config: MetricsConfig,
    cache: MetricsCache,
    event_bus: EventBus,
    refreshing: AtomicBool,
    retry_pending: AtomicBool,
    retry_task: Mutex<Option<JoinHandle<()>>>,
    stats: RwLock<RefreshStats>,
}

impl<S: MetricsSource> MetricsService<S> {
    /// Create a service; fails on a config with zero durations
    pub fn new(source: S, config: MetricsConfig) -> Result<Self, CoreError> {
        Self::with_event_bus(source, config, EventBus::default_capacity())
    }

    /// Create with a caller-owned event bus
    pub fn with_event_bus(
        source: S,
        config: MetricsConfig,
        event_bus: EventBus,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        Ok(Self {
            cache: MetricsCache::new(config.ttl()),
            source,
            config,
            event_bus,
            refreshing: AtomicBool::new(false),
            retry_pending: AtomicBool::new(false),
            retry_task: Mutex::new(None),
            stats: RwLock::new(RefreshStats::default()),
        })
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get the event bus for subscribing to refresh outcomes
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Run the startup refresh, then arm the recurring timer
    ///
    /// A failed startup refresh is logged and leaves the cache empty; the
    /// scheduler starts regardless.
    pub async fn initialize(self: &Arc<Self>) -> Result<RefreshScheduler, CoreError> {
        info!(
            refresh_interval_secs = self.config.refresh_interval_secs,
            retry_delay_secs = self.config.retry_delay_secs,
            ttl_secs = self.config.ttl_secs,
            "Initializing industry metrics cache"
        );

        let outcome = self.refresh().await;
        if !outcome.is_success() {
            warn!(?outcome, "Initial metrics refresh failed, starting with empty cache");
        }

        RefreshScheduler::start(Arc::clone(self), self.config.refresh_interval())
    }

    /// Re-run the metrics query and replace the cache on success
    pub async fn refresh(self: &Arc<Self>) -> RefreshOutcome {
        self.run_refresh(Trigger::Scheduled).await
    }

    async fn run_refresh(self: &Arc<Self>, trigger: Trigger) -> RefreshOutcome {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(?trigger, "Refresh already in flight, skipping");
            self.event_bus.publish(MetricsEvent::RefreshSkipped);
            return RefreshOutcome::Skipped;
        }
        let _in_flight = InFlight(&self.refreshing);

        let started = Instant::now();
        match self.fetch().await {
            Ok(metrics) => {
                let industries = metrics.len();
                self.cache.replace(metrics);
                self.record_success();

                if trigger == Trigger::Scheduled {
                    self.cancel_pending_retry();
                }

                let elapsed = started.elapsed();
                info!(
                    industries,
                    elapsed_ms = elapsed.as_millis() as u64,
                    ?trigger,
                    "Industry metrics refreshed"
                );
                self.event_bus
                    .publish(MetricsEvent::Refreshed { industries, elapsed });

                RefreshOutcome::Refreshed { industries }
            }
            Err(e) => {
                let consecutive_failures = self.record_failure(&e);
                let retry_scheduled = trigger == Trigger::Scheduled && self.schedule_retry();

                error!(
                    error = %e,
                    transient = e.is_transient(),
                    consecutive_failures,
                    retry_scheduled,
                    serving_stale = self.cache.is_populated(),
                    ?trigger,
                    "Industry metrics refresh failed"
                );
                self.event_bus.publish(MetricsEvent::RefreshFailed {
                    error: e.to_string(),
                    consecutive_failures,
                    retry_scheduled,
                });

                RefreshOutcome::Failed {
                    error: e.to_string(),
                    retry_scheduled,
                }
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<IndustryMetric>, CoreError> {
        let timeout = self.config.query_timeout();

        match tokio::time::timeout(timeout, self.source.fetch_industry_metrics()).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout {
                operation: "industry metrics query".to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    /// Spawn the one-shot retry unless one is already pending
    fn schedule_retry(self: &Arc<Self>) -> bool {
        if self.retry_pending.swap(true, Ordering::AcqRel) {
            debug!("Retry already pending");
            return false;
        }

        let delay = self.config.retry_delay();
        let service = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            service.retry_pending.store(false, Ordering::Release);

            info!("Retrying industry metrics refresh");
            service.event_bus.publish(MetricsEvent::RetryStarted);
            service.run_refresh(Trigger::Retry).await;
        });

        *self.retry_task.lock() = Some(handle);
        warn!(delay_secs = delay.as_secs(), "Scheduled metrics refresh retry");
        true
    }

    /// Drop a pending retry (after a successful refresh, or on shutdown)
    pub fn cancel_pending_retry(&self) {
        if let Some(handle) = self.retry_task.lock().take() {
            if self.retry_pending.swap(false, Ordering::AcqRel) {
                handle.abort();
                debug!("Pending metrics retry cancelled");
            }
        }
    }

    fn record_success(&self) {
        let mut stats = self.stats.write();
        stats.successes += 1;
        stats.consecutive_failures = 0;
        stats.last_success_at = Some(Utc::now());
        stats.last_error = None;
    }

    fn record_failure(&self, error: &CoreError) -> u32 {
        let mut stats = self.stats.write();
        stats.failures += 1;
        stats.consecutive_failures += 1;
        stats.last_failure_at = Some(Utc::now());
        stats.last_error = Some(error.to_string());
        stats.consecutive_failures
    }

    // ===================
    // Read accessors
    // ===================

    /// Last successful snapshot, or empty if none was ever loaded
    ///
    /// Never blocks on a refresh and never triggers one.
    pub fn get_all_industry_metrics(&self) -> Arc<Vec<IndustryMetric>> {
        self.cache.get()
    }

    /// Metrics for a single industry (case-insensitive)
    pub fn get_industry(&self, industry: &str) -> Option<IndustryMetric> {
        find_industry(&self.cache.get(), industry).cloned()
    }

    /// Current cache entry with timestamps
    pub fn cache_entry(&self) -> Option<CacheEntry> {
        self.cache.entry()
    }

    pub fn state(&self) -> CacheState {
        if self.refreshing.load(Ordering::Acquire) {
            CacheState::Refreshing
        } else if !self.cache.is_populated() {
            CacheState::Uninitialized
        } else if self.retry_pending.load(Ordering::Acquire) {
            CacheState::StaleRetryPending
        } else if self.stats.read().consecutive_failures > 0 {
            CacheState::Stale
        } else {
            CacheState::Populated
        }
    }

    pub fn stats(&self) -> RefreshStats {
        self.stats.read().clone()
    }

    /// Health summary for monitoring
    pub fn health(&self) -> DegradedState {
        let stats = self.stats.read();

        let Some(entry) = self.cache.entry() else {
            return DegradedState::Empty {
                reason: stats
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "metrics not loaded yet".to_string()),
            };
        };

        if stats.consecutive_failures > 0 {
            return DegradedState::Stale {
                reason: format!(
                    "{} consecutive refresh failures, last: {}",
                    stats.consecutive_failures,
                    stats.last_error.as_deref().unwrap_or("unknown error")
                ),
            };
        }

        if entry.is_expired() {
            return DegradedState::Stale {
                reason: format!(
                    "snapshot is {}s old (ttl {}s)",
                    entry.age().as_secs(),
                    self.cache.ttl().as_secs()
                ),
            };
        }

        DegradedState::Healthy
    }
}
