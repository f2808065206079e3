//! Industry-level aggregate metrics computed from marketplace listings

use serde::{Deserialize, Serialize};

/// Aggregate statistics for one business-industry category
///
/// Field names match the columns of the aggregation query and the JSON the
/// chat assistant receives as grounding context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryMetric {
    pub industry: String,
    pub avg_cash_flow: f64,
    pub avg_ebitda: f64,
    pub avg_sales_multiple: f64,
    pub avg_profit_margin: f64,
    pub business_count: i64,
}

impl IndustryMetric {
    /// Case-insensitive industry match, ignoring surrounding whitespace
    pub fn matches_industry(&self, industry: &str) -> bool {
        self.industry.trim().eq_ignore_ascii_case(industry.trim())
    }

    /// Profit margin as a percentage (0.15 → 15.0)
    pub fn profit_margin_percent(&self) -> f64 {
        self.avg_profit_margin * 100.0
    }
}

/// Find an industry in a snapshot
pub fn find_industry<'a>(metrics: &'a [IndustryMetric], industry: &str) -> Option<&'a IndustryMetric> {
    metrics.iter().find(|m| m.matches_industry(industry))
}

/// Total listings across all industries in a snapshot
pub fn total_businesses(metrics: &[IndustryMetric]) -> i64 {
    metrics.iter().map(|m| m.business_count).sum()
}
