//! Shared test helpers: a scripted metrics source and sample rows

#![allow(dead_code)]

use marketdesk_core::{CoreError, IndustryMetric, MetricsSource};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted response
#[derive(Debug, Clone)]
pub enum Step {
    Rows(Vec<IndustryMetric>),
    Fail(&'static str),
}

/// Metrics source that replays a script and counts calls
///
/// When the script runs out, the `fallback` step is repeated.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Step>, fallback: Step) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call sleeps this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl MetricsSource for ScriptedSource {
    async fn fetch_industry_metrics(&self) -> Result<Vec<IndustryMetric>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_step() {
            Step::Rows(rows) => Ok(rows),
            Step::Fail(message) => Err(CoreError::SourceUnavailable {
                message: message.to_string(),
            }),
        }
    }
}

pub fn retail() -> IndustryMetric {
    IndustryMetric {
        industry: "Retail".to_string(),
        avg_cash_flow: 100_000.0,
        avg_ebitda: 20_000.0,
        avg_sales_multiple: 3.5,
        avg_profit_margin: 0.15,
        business_count: 42,
    }
}

pub fn metric(industry: &str, business_count: i64) -> IndustryMetric {
    IndustryMetric {
        industry: industry.to_string(),
        avg_cash_flow: 75_000.0,
        avg_ebitda: 30_000.0,
        avg_sales_multiple: 2.8,
        avg_profit_margin: 0.22,
        business_count,
    }
}
