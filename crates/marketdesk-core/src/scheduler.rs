//! Recurring refresh task for the metrics cache
//!
//! Ticks every `refresh_interval` and asks the service to refresh. The first
//! tick fires one full period after start, since `initialize` already ran the
//! startup refresh.

use crate::error::CoreError;
use crate::event::MetricsEvent;
use crate::service::MetricsService;
use crate::source::MetricsSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Handle to the running refresh loop
///
/// Dropping the handle also stops the loop (the shutdown channel closes).
pub struct RefreshScheduler {
    /// Shutdown signal
    shutdown_tx: mpsc::Sender<()>,

    /// Background loop
    handle: JoinHandle<()>,

    period: Duration,
}

impl RefreshScheduler {
    /// Spawn the refresh loop
    ///
    /// A zero period is rejected here since `interval_at` would panic inside
    /// the spawned task.
    pub fn start<S: MetricsSource>(
        service: Arc<MetricsService<S>>,
        period: Duration,
    ) -> Result<Self, CoreError> {
        if period.is_zero() {
            return Err(CoreError::InvalidConfig {
                message: "refresh period must be greater than zero".to_string(),
            });
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Scheduled metrics refresh");
                        let outcome = service.refresh().await;
                        debug!(?outcome, "Scheduled refresh finished");
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Metrics refresh scheduler shutting down");
                        break;
                    }
                }
            }

            service.event_bus().publish(MetricsEvent::SchedulerStopped);
        });

        info!(period_secs = period.as_secs(), "Metrics refresh scheduler started");

        Ok(Self {
            shutdown_tx,
            handle,
            period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the loop to stop and wait for it to exit
    ///
    /// An in-flight refresh is allowed to finish first.
    pub async fn stop(self) {
        // Closed channel means the loop already exited
        let _ = self.shutdown_tx.send(()).await;

        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "Metrics refresh scheduler panicked");
            }
        }
    }
}
