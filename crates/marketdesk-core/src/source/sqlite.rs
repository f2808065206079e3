//! SQLite-backed metrics source
//!
//! Aggregates the `businesses` listing table per industry. rusqlite is
//! blocking, so every query runs on tokio's blocking pool.
//!
//! If the caller stops waiting (e.g. the service's query timeout fires), the
//! running statement is interrupted and queued work that has not started is
//! skipped, so the connection lock is released promptly.
//!
//! Expected columns on `businesses`:
//! - industry TEXT
//! - price, gross_revenue, ebitda, cash_flow NUMERIC (nullable)

use super::MetricsSource;
use crate::error::CoreError;
use crate::models::IndustryMetric;
use rusqlite::{Connection, InterruptHandle, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Industry averages over all listed businesses
///
/// Industries are grouped case-insensitively after trimming, matching
/// [`IndustryMetric::matches_industry`]; the row carries the first spelling in
/// sort order (`MIN`). Sales multiple is price / revenue and profit margin is EBITDA / revenue;
/// both skip listings without positive revenue. Null averages (an industry
/// where nobody disclosed a figure) come back as 0.
pub const INDUSTRY_METRICS_QUERY: &str = r#"
    SELECT
        MIN(TRIM(industry)) AS industry,
        COALESCE(AVG(cash_flow), 0.0) AS avg_cash_flow,
        COALESCE(AVG(ebitda), 0.0) AS avg_ebitda,
        COALESCE(AVG(CASE WHEN gross_revenue > 0
                          THEN CAST(price AS REAL) / gross_revenue END), 0.0) AS avg_sales_multiple,
        COALESCE(AVG(CASE WHEN gross_revenue > 0
                          THEN CAST(ebitda AS REAL) / gross_revenue END), 0.0) AS avg_profit_margin,
        COUNT(*) AS business_count
    FROM businesses
    WHERE industry IS NOT NULL AND TRIM(industry) <> ''
    GROUP BY LOWER(TRIM(industry))
    ORDER BY LOWER(TRIM(industry))
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Metrics source over a SQLite database (thread-safe)
pub struct SqliteMetricsSource {
    conn: Arc<Mutex<Connection>>,
    interrupt: InterruptHandle,
    path: Option<PathBuf>,
}

/// Shared between a query future and its blocking task
#[derive(Default)]
struct QueryTicket {
    started: AtomicBool,
    abandoned: AtomicBool,
}

/// Interrupts the blocking query if the awaiting future is dropped first
struct AbandonGuard<'a> {
    interrupt: &'a InterruptHandle,
    ticket: Arc<QueryTicket>,
    finished: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        self.ticket.abandoned.store(true, Ordering::SeqCst);
        if self.ticket.started.load(Ordering::SeqCst) {
            self.interrupt.interrupt();
            debug!("Abandoned metrics query interrupted");
        }
    }
}

impl SqliteMetricsSource {
    /// Open an existing database read-only
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| CoreError::DatabaseOpen {
            path: path.to_path_buf(),
            source,
        })?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|source| CoreError::DatabaseOpen {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), "Metrics database opened");

        Ok(Self {
            interrupt: conn.get_interrupt_handle(),
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Wrap a connection the caller already configured (e.g. in-memory)
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            interrupt: conn.get_interrupt_handle(),
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        }
    }

    /// Database path, if opened from a file
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Verify connectivity and that the listings table exists
    pub async fn check(&self) -> Result<usize, CoreError> {
        self.with_connection(|conn| {
            let present: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'businesses'",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| CoreError::query("Failed to inspect schema", e))?;

            if present == 0 {
                return Err(CoreError::MissingTable {
                    table: "businesses".to_string(),
                });
            }

            let listings: i64 = conn
                .query_row("SELECT COUNT(*) FROM businesses", [], |row| row.get(0))
                .map_err(|e| CoreError::query("Failed to count listings", e))?;

            Ok(listings as usize)
        })
        .await
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let ticket = Arc::new(QueryTicket::default());
        let mut abandon = AbandonGuard {
            interrupt: &self.interrupt,
            ticket: Arc::clone(&ticket),
            finished: false,
        };

        let result = tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| CoreError::LockPoisoned)?;

            ticket.started.store(true, Ordering::SeqCst);
            if ticket.abandoned.load(Ordering::SeqCst) {
                return Err(CoreError::SourceUnavailable {
                    message: "query abandoned before it started".to_string(),
                });
            }

            let result = f(&*guard);
            ticket.started.store(false, Ordering::SeqCst);
            result
        })
        .await;
        abandon.finished = true;

        result.map_err(|source| CoreError::TaskJoin { source })?
    }
}

impl MetricsSource for SqliteMetricsSource {
    async fn fetch_industry_metrics(&self) -> Result<Vec<IndustryMetric>, CoreError> {
        self.with_connection(query_industry_metrics).await
    }
}

fn query_industry_metrics(conn: &Connection) -> Result<Vec<IndustryMetric>, CoreError> {
    let mut stmt = conn
        .prepare_cached(INDUSTRY_METRICS_QUERY)
        .map_err(|e| CoreError::query("Failed to prepare industry metrics query", e))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(IndustryMetric {
                industry: row.get(0)?,
                avg_cash_flow: row.get(1)?,
                avg_ebitda: row.get(2)?,
                avg_sales_multiple: row.get(3)?,
                avg_profit_margin: row.get(4)?,
                business_count: row.get(5)?,
            })
        })
        .map_err(|e| CoreError::query("Failed to run industry metrics query", e))?;

    let mut metrics = Vec::new();
    for row in rows {
        metrics.push(row.map_err(|e| CoreError::query("Failed to read industry row", e))?);
    }

    debug!(industries = metrics.len(), "Industry metrics queried");
    Ok(metrics)
}
