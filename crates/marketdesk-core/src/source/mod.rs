//! Metrics sources
//!
//! A source runs the industry aggregation against whatever store holds the
//! marketplace listings. The caller owns the connection lifecycle; the cache
//! only ever calls [`MetricsSource::fetch_industry_metrics`].

pub mod sqlite;

use crate::error::CoreError;
use crate::models::IndustryMetric;
use std::future::Future;
use std::sync::Arc;

pub use sqlite::{SqliteMetricsSource, INDUSTRY_METRICS_QUERY};

/// Something that can produce a full industry metrics snapshot
pub trait MetricsSource: Send + Sync + 'static {
    /// Run the aggregation and return every industry row
    fn fetch_industry_metrics(
        &self,
    ) -> impl Future<Output = Result<Vec<IndustryMetric>, CoreError>> + Send;
}

impl<T: MetricsSource> MetricsSource for Arc<T> {
    fn fetch_industry_metrics(
        &self,
    ) -> impl Future<Output = Result<Vec<IndustryMetric>, CoreError>> + Send {
        (**self).fetch_industry_metrics()
    }
}
