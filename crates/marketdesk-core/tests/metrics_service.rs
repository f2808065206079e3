//! Refresh and accessor behaviour of the metrics service
//!
//! Uses tokio's paused clock so retry delays and intervals run instantly.

mod common;

use common::{metric, retail, ScriptedSource, Step};
use marketdesk_core::{
    CacheState, MetricsConfig, MetricsEvent, MetricsService, RefreshOutcome,
};
use std::sync::Arc;
use std::time::Duration;

fn service_with(source: &Arc<ScriptedSource>) -> Arc<MetricsService<Arc<ScriptedSource>>> {
    Arc::new(MetricsService::new(Arc::clone(source), MetricsConfig::default()).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_get_all_returns_exact_rows_from_refresh() {
    let source = Arc::new(ScriptedSource::new(vec![], Step::Rows(vec![retail()])));
    let service = service_with(&source);

    let scheduler = service.initialize().await.unwrap();

    let metrics = service.get_all_industry_metrics();
    assert_eq!(*metrics, vec![retail()]);
    assert_eq!(metrics[0].avg_sales_multiple, 3.5);
    assert_eq!(metrics[0].avg_profit_margin, 0.15);
    assert_eq!(service.state(), CacheState::Populated);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_initial_failure_leaves_cache_empty_and_retries_after_delay() {
    let source = Arc::new(ScriptedSource::new(
        vec![Step::Fail("connection refused")],
        Step::Rows(vec![retail()]),
    ));
    let service = service_with(&source);

    let scheduler = service.initialize().await.unwrap();

    assert!(service.get_all_industry_metrics().is_empty());
    assert_eq!(service.state(), CacheState::Uninitialized);
    assert_eq!(source.calls(), 1);

    // Nothing happens before the retry delay
    tokio::time::sleep(Duration::from_secs(299)).await;
    assert_eq!(source.calls(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(*service.get_all_industry_metrics(), vec![retail()]);
    assert_eq!(service.state(), CacheState::Populated);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_latest_refresh_replaces_previous_set() {
    let source = Arc::new(ScriptedSource::new(
        vec![
            Step::Rows(vec![retail(), metric("Hospitality", 7)]),
            Step::Rows(vec![metric("Technology", 12)]),
        ],
        Step::Fail("script exhausted"),
    ));
    let service = service_with(&source);

    assert!(service.refresh().await.is_success());
    assert_eq!(service.get_all_industry_metrics().len(), 2);

    assert!(service.refresh().await.is_success());
    assert_eq!(
        *service.get_all_industry_metrics(),
        vec![metric("Technology", 12)]
    );
    assert!(service.get_industry("Retail").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let source = Arc::new(ScriptedSource::new(
        vec![Step::Rows(vec![retail()]), Step::Fail("server closed the connection")],
        Step::Rows(vec![metric("Technology", 3)]),
    ));
    let service = service_with(&source);

    service.refresh().await;
    let outcome = service.refresh().await;

    match outcome {
        RefreshOutcome::Failed {
            error,
            retry_scheduled,
        } => {
            assert!(error.contains("server closed the connection"));
            assert!(retry_scheduled);
        }
        other => panic!("Expected failure, got {:?}", other),
    }

    assert_eq!(*service.get_all_industry_metrics(), vec![retail()]);
    assert_eq!(service.state(), CacheState::StaleRetryPending);
}

#[tokio::test(start_paused = true)]
async fn test_get_all_is_idempotent() {
    let source = Arc::new(ScriptedSource::new(
        vec![],
        Step::Rows(vec![retail(), metric("Construction", 5)]),
    ));
    let service = service_with(&source);
    service.refresh().await;

    let first = service.get_all_industry_metrics();
    let second = service.get_all_industry_metrics();
    let third = service.get_all_industry_metrics();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_retry_waits_for_next_interval() {
    let source = Arc::new(ScriptedSource::new(
        vec![Step::Fail("timeout"), Step::Fail("timeout again")],
        Step::Rows(vec![retail()]),
    ));
    let service = service_with(&source);

    let scheduler = service.initialize().await.unwrap();

    // Startup failure, then the single retry also fails
    tokio::time::sleep(Duration::from_secs(301)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(service.stats().consecutive_failures, 2);

    // No further retry is chained
    tokio::time::sleep(Duration::from_secs(3_600)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(service.state(), CacheState::Uninitialized);

    // The regular interval picks it up
    tokio::time::sleep(Duration::from_secs(4 * 3_600)).await;
    assert_eq!(source.calls(), 3);
    assert_eq!(*service.get_all_industry_metrics(), vec![retail()]);
    assert_eq!(service.stats().consecutive_failures, 0);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_refresh_is_skipped() {
    let source = Arc::new(
        ScriptedSource::new(vec![], Step::Rows(vec![retail()]))
            .with_delay(Duration::from_secs(10)),
    );
    let service = service_with(&source);

    let first = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.refresh().await }
    });

    while service.state() != CacheState::Refreshing {
        tokio::task::yield_now().await;
    }

    assert_eq!(service.refresh().await, RefreshOutcome::Skipped);
    assert_eq!(
        first.await.unwrap(),
        RefreshOutcome::Refreshed { industries: 1 }
    );
    assert_eq!(source.calls(), 1);
    assert_eq!(service.state(), CacheState::Populated);
}

#[tokio::test(start_paused = true)]
async fn test_slow_query_times_out_and_keeps_snapshot() {
    let source = Arc::new(
        ScriptedSource::new(vec![], Step::Rows(vec![metric("Technology", 1)]))
            .with_delay(Duration::from_secs(60)),
    );
    let config = MetricsConfig {
        query_timeout_secs: 5,
        ..MetricsConfig::default()
    };
    let service = Arc::new(MetricsService::new(Arc::clone(&source), config).unwrap());

    let outcome = service.refresh().await;

    assert!(matches!(
        outcome,
        RefreshOutcome::Failed { ref error, .. } if error.contains("timed out after 5s")
    ));
    assert!(service.get_all_industry_metrics().is_empty());
    assert_ne!(service.state(), CacheState::Refreshing);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_outcomes_are_published() {
    let source = Arc::new(ScriptedSource::new(
        vec![Step::Rows(vec![retail()]), Step::Fail("connection reset")],
        Step::Rows(vec![retail()]),
    ));
    let service = service_with(&source);
    let mut events = service.event_bus().subscribe();

    service.refresh().await;
    service.refresh().await;

    let first = events.recv().await.unwrap();
    assert!(matches!(first, MetricsEvent::Refreshed { industries: 1, .. }));

    let second = events.recv().await.unwrap();
    assert!(matches!(
        second,
        MetricsEvent::RefreshFailed {
            consecutive_failures: 1,
            retry_scheduled: true,
            ..
        }
    ));

    tokio::time::sleep(Duration::from_secs(301)).await;
    assert_eq!(events.recv().await.unwrap(), MetricsEvent::RetryStarted);
    assert!(matches!(
        events.recv().await.unwrap(),
        MetricsEvent::Refreshed { .. }
    ));
}
