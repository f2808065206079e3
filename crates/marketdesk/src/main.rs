//! marketdesk - Industry metrics cache for the business marketplace

mod cli;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use marketdesk_core::{
    AppConfig, MetricsConfig, MetricsService, RefreshOutcome, SqliteMetricsSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "marketdesk",
    version,
    about = "Industry metrics cache for the business marketplace",
    long_about = "Computes industry-level averages (cash flow, EBITDA, sales multiple,\n\
                  profit margin, listing count) from the marketplace listings database and\n\
                  keeps them cached, refreshing on a fixed interval.\n\
                  \n\
                  Examples:\n\
                    marketdesk                           # Print metrics table (default)\n\
                    marketdesk metrics --json            # Metrics as JSON\n\
                    marketdesk metrics --industry Retail # One industry\n\
                    marketdesk watch                     # Run the refresh loop until Ctrl-C\n\
                    marketdesk check                     # Verify database connectivity\n\
                  \n\
                  Environment Variables:\n\
                    MARKETDESK_DATABASE                  # SQLite listings database\n\
                    MARKETDESK_CONFIG                    # Config file (default: ~/.config/marketdesk/config.toml)\n\
                    MARKETDESK_NO_COLOR                  # Disable ANSI colors (log-friendly)\n\
                    RUST_LOG                             # Log filter (default: marketdesk=info)"
)]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,

    /// Path to the SQLite listings database
    #[arg(long, env = "MARKETDESK_DATABASE")]
    database: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, env = "MARKETDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "MARKETDESK_NO_COLOR")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// Refresh once and print industry metrics
    Metrics {
        /// Only show this industry (case-insensitive)
        #[arg(long, short = 'i')]
        industry: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep the cache refreshed and report every refresh until Ctrl-C
    Watch,
    /// Check database connectivity and schema, then exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.no_color);

    let config = load_config(cli.config.as_deref())?;

    let database = cli
        .database
        .or(config.database)
        .context("No database configured (use --database, MARKETDESK_DATABASE or the config file)")?;

    match cli.mode.unwrap_or(Mode::Metrics {
        industry: None,
        json: false,
    }) {
        Mode::Metrics { industry, json } => {
            run_metrics(database, config.metrics, industry, json, cli.no_color).await?;
        }
        Mode::Watch => {
            run_watch(database, config.metrics).await?;
        }
        Mode::Check => {
            run_check(database).await?;
        }
    }

    Ok(())
}

fn init_tracing(no_color: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketdesk=info,marketdesk_core=info".into()),
        )
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&std::path::Path>) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match AppConfig::default_path() {
            Some(path) => path,
            None => return Ok(AppConfig::default()),
        },
    };

    AppConfig::load(&path).with_context(|| format!("Failed to load config from {}", path.display()))
}

fn open_service(
    database: &std::path::Path,
    config: MetricsConfig,
) -> Result<Arc<MetricsService<SqliteMetricsSource>>> {
    let source = SqliteMetricsSource::open(database)
        .with_context(|| format!("Failed to open listings database {}", database.display()))?;

    let service =
        MetricsService::new(source, config).context("Invalid metrics configuration")?;
    Ok(Arc::new(service))
}

async fn run_metrics(
    database: PathBuf,
    config: MetricsConfig,
    industry: Option<String>,
    json: bool,
    no_color: bool,
) -> Result<()> {
    let service = open_service(&database, config)?;

    if let RefreshOutcome::Failed { error, .. } = service.refresh().await {
        bail!("Failed to compute industry metrics: {}", error);
    }

    match industry {
        Some(name) => {
            let metric = service
                .get_industry(&name)
                .with_context(|| format!("No listings found for industry '{}'", name))?;
            println!("{}", cli::format_industry_info(&metric, json));
        }
        None => {
            let metrics = service.get_all_industry_metrics();
            println!("{}", cli::format_metrics_table(&metrics, json, no_color));
        }
    }

    Ok(())
}

async fn run_watch(database: PathBuf, config: MetricsConfig) -> Result<()> {
    let service = open_service(&database, config)?;
    let mut events = service.event_bus().subscribe();

    let scheduler = service
        .initialize()
        .await
        .context("Failed to start the refresh scheduler")?;

    println!(
        "Watching {} (refresh every {}s, cache {})",
        database.display(),
        scheduler.period().as_secs(),
        cli::format_health(&service.health())
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(event) => println!("{}", cli::format_event(&event, chrono::Utc::now())),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event stream lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    scheduler.stop().await;
    service.cancel_pending_retry();

    let stats = service.stats();
    println!(
        "Stopped after {} refreshes ({} failed), cache {}",
        stats.successes + stats.failures,
        stats.failures,
        cli::format_health(&service.health())
    );

    Ok(())
}

async fn run_check(database: PathBuf) -> Result<()> {
    let source = SqliteMetricsSource::open(&database)
        .with_context(|| format!("Failed to open listings database {}", database.display()))?;

    let listings = source
        .check()
        .await
        .with_context(|| format!("Database check failed for {}", database.display()))?;

    println!("Database OK: {} ({} listings)", database.display(), listings);
    Ok(())
}
