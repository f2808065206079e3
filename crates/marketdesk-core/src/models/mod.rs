//! Data models for marketdesk

pub mod industry_metric;

pub use industry_metric::{find_industry, total_businesses, IndustryMetric};
