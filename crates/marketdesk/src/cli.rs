//! Output formatting for the marketdesk CLI
//!
//! Renders industry metrics as tables (human) or JSON, and watch-mode event lines.

use chrono::{DateTime, Utc};
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Row, Table};
use marketdesk_core::models::total_businesses;
use marketdesk_core::{DegradedState, IndustryMetric, MetricsEvent};

// ============================================================================
// Formatters
// ============================================================================

/// Format metrics as a table (human) or JSON
///
/// Rows are ordered by listing count, largest industry first.
pub fn format_metrics_table(metrics: &[IndustryMetric], json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(metrics).unwrap_or_else(|_| "[]".to_string());
    }

    if metrics.is_empty() {
        return "No industry metrics available.".to_string();
    }

    let headers = [
        "Industry",
        "Listings",
        "Avg Cash Flow",
        "Avg EBITDA",
        "Sales Multiple",
        "Profit Margin",
    ];

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    if no_color {
        table.set_header(headers.to_vec());
    } else {
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }

    let mut sorted: Vec<&IndustryMetric> = metrics.iter().collect();
    sorted.sort_by(|a, b| {
        b.business_count
            .cmp(&a.business_count)
            .then_with(|| a.industry.cmp(&b.industry))
    });

    for metric in sorted {
        table.add_row(Row::from(vec![
            Cell::new(&metric.industry),
            Cell::new(metric.business_count).set_alignment(CellAlignment::Right),
            Cell::new(format_money(metric.avg_cash_flow)).set_alignment(CellAlignment::Right),
            Cell::new(format_money(metric.avg_ebitda)).set_alignment(CellAlignment::Right),
            Cell::new(format_multiple(metric.avg_sales_multiple))
                .set_alignment(CellAlignment::Right),
            Cell::new(format_percent(metric.avg_profit_margin))
                .set_alignment(CellAlignment::Right),
        ]));
    }

    format!(
        "{}\n{} industries, {} listings",
        table,
        metrics.len(),
        total_businesses(metrics)
    )
}

/// Format a single industry (human or JSON)
pub fn format_industry_info(metric: &IndustryMetric, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(metric).unwrap_or_else(|_| "{}".to_string());
    }

    let lines = [
        format!("Industry:         {}", metric.industry),
        format!("Listings:         {}", metric.business_count),
        format!("Avg cash flow:    {}", format_money(metric.avg_cash_flow)),
        format!("Avg EBITDA:       {}", format_money(metric.avg_ebitda)),
        format!("Sales multiple:   {}", format_multiple(metric.avg_sales_multiple)),
        format!("Profit margin:    {}", format_percent(metric.avg_profit_margin)),
    ];

    lines.join("\n")
}

/// One line per watch-mode event
pub fn format_event(event: &MetricsEvent, at: DateTime<Utc>) -> String {
    let stamp = at.format("%Y-%m-%d %H:%M:%S");

    match event {
        MetricsEvent::Refreshed {
            industries,
            elapsed,
        } => format!(
            "[{}] refreshed {} industries in {}ms",
            stamp,
            industries,
            elapsed.as_millis()
        ),
        MetricsEvent::RefreshFailed {
            error,
            consecutive_failures,
            retry_scheduled,
        } => format!(
            "[{}] refresh failed ({} in a row{}): {}",
            stamp,
            consecutive_failures,
            if *retry_scheduled { ", retry scheduled" } else { "" },
            error
        ),
        MetricsEvent::RefreshSkipped => {
            format!("[{}] refresh skipped, previous one still running", stamp)
        }
        MetricsEvent::RetryStarted => format!("[{}] retrying refresh", stamp),
        MetricsEvent::SchedulerStopped => format!("[{}] scheduler stopped", stamp),
    }
}

/// Human summary of cache health
pub fn format_health(state: &DegradedState) -> String {
    match state {
        DegradedState::Healthy => "healthy".to_string(),
        DegradedState::Stale { reason } => format!("stale ({})", reason),
        DegradedState::Empty { reason } => format!("empty ({})", reason),
    }
}

// ============================================================================
// Utilities
// ============================================================================

fn format_money(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();

    if abs >= 1_000_000.0 {
        format!("{}£{:.1}M", sign, abs / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{}£{:.1}K", sign, abs / 1_000.0)
    } else {
        format!("{}£{:.0}", sign, abs)
    }
}

fn format_multiple(value: f64) -> String {
    format!("{:.2}x", value)
}

fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

// ============================================================================
// Tests
// ============================================================================
