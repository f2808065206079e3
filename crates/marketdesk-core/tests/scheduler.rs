//! Recurring refresh loop lifecycle

mod common;

use common::{metric, ScriptedSource, Step};
use marketdesk_core::{
    CoreError, MetricsConfig, MetricsEvent, MetricsService, RefreshScheduler,
};
use std::sync::Arc;
use std::time::Duration;

fn one_minute_config() -> MetricsConfig {
    MetricsConfig {
        refresh_interval_secs: 60,
        ..MetricsConfig::default()
    }
}

fn one_minute_service(source: &Arc<ScriptedSource>) -> Arc<MetricsService<Arc<ScriptedSource>>> {
    Arc::new(MetricsService::new(Arc::clone(source), one_minute_config()).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_interval_refreshes_each_period_until_stopped() {
    let source = Arc::new(ScriptedSource::new(
        vec![],
        Step::Rows(vec![metric("Retail", 10)]),
    ));
    let service = one_minute_service(&source);
    let mut events = service.event_bus().subscribe();

    let scheduler = service.initialize().await.unwrap();
    assert_eq!(scheduler.period(), Duration::from_secs(60));
    assert!(scheduler.is_running());
    assert_eq!(source.calls(), 1);

    tokio::time::sleep(Duration::from_secs(181)).await;
    assert_eq!(source.calls(), 4);

    scheduler.stop().await;

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(source.calls(), 4);

    let mut saw_stop = false;
    while let Ok(event) = events.try_recv() {
        if event == MetricsEvent::SchedulerStopped {
            saw_stop = true;
        }
    }
    assert!(saw_stop);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_stops_loop() {
    let source = Arc::new(ScriptedSource::new(
        vec![],
        Step::Rows(vec![metric("Retail", 10)]),
    ));
    let service = one_minute_service(&source);

    let scheduler =
        RefreshScheduler::start(Arc::clone(&service), Duration::from_secs(60)).unwrap();
    drop(scheduler);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_interval_keeps_serving_stale_data_through_failures() {
    let source = Arc::new(ScriptedSource::new(
        vec![Step::Rows(vec![metric("Retail", 10)])],
        Step::Fail("database is locked"),
    ));
    let service = one_minute_service(&source);

    let scheduler = service.initialize().await.unwrap();

    tokio::time::sleep(Duration::from_secs(30 * 60)).await;

    assert!(source.calls() > 2);
    assert_eq!(
        *service.get_all_industry_metrics(),
        vec![metric("Retail", 10)]
    );
    assert!(service.health().has_data());
    assert!(service.health().is_degraded());

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_zero_period_is_rejected_before_spawning() {
    let source = Arc::new(ScriptedSource::new(
        vec![],
        Step::Rows(vec![metric("Retail", 10)]),
    ));
    let service = one_minute_service(&source);

    let result = RefreshScheduler::start(Arc::clone(&service), Duration::ZERO);
    assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_zero_refresh_interval_config_is_rejected() {
    let source = Arc::new(ScriptedSource::new(
        vec![],
        Step::Rows(vec![metric("Retail", 10)]),
    ));
    let config = MetricsConfig {
        refresh_interval_secs: 0,
        ..MetricsConfig::default()
    };

    let result = MetricsService::new(Arc::clone(&source), config);
    assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    assert_eq!(source.calls(), 0);
}
