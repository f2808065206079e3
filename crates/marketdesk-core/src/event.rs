//! Event bus for marketdesk using tokio::broadcast
//!
//! Publishes refresh outcomes so the host process can alert on repeated
//! failures instead of relying on log lines alone.

use std::time::Duration;
use tokio::sync::broadcast;

/// Events emitted by the metrics service
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsEvent {
    /// The cache was replaced with a fresh snapshot
    Refreshed { industries: usize, elapsed: Duration },
    /// A refresh failed; the previous snapshot is still served
    RefreshFailed {
        error: String,
        consecutive_failures: u32,
        retry_scheduled: bool,
    },
    /// A refresh was requested while another was still running
    RefreshSkipped,
    /// The one-shot retry fired
    RetryStarted,
    /// The scheduler task stopped
    SchedulerStopped,
}

/// Event bus for broadcasting metrics events
///
/// Uses tokio::broadcast for multi-consumer support.
pub struct EventBus {
    sender: broadcast::Sender<MetricsEvent>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create with default capacity (64 events)
    pub fn default_capacity() -> Self {
        Self::new(64)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: MetricsEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<MetricsEvent> {
        self.sender.subscribe()
    }

    /// Get current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::default_capacity();
        let mut rx = bus.subscribe();

        bus.publish(MetricsEvent::Refreshed {
            industries: 3,
            elapsed: Duration::from_millis(12),
        });
        bus.publish(MetricsEvent::RefreshSkipped);

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(event1, MetricsEvent::Refreshed { industries: 3, .. }));

        let event2 = rx.recv().await.unwrap();
        assert_eq!(event2, MetricsEvent::RefreshSkipped);
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::default_capacity();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.clone().subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(MetricsEvent::SchedulerStopped);

        assert_eq!(rx1.recv().await.unwrap(), MetricsEvent::SchedulerStopped);
        assert_eq!(rx2.recv().await.unwrap(), MetricsEvent::SchedulerStopped);
    }

    #[test]
    fn test_event_bus_no_subscribers_ok() {
        let bus = EventBus::default_capacity();
        bus.publish(MetricsEvent::RetryStarted);
    }
}
