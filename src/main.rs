mod config;
mod engine;
mod error;
mod indicator;
mod model;
mod normalize;
mod pipeline;
mod report;
mod scoring;
mod supplier;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use error::AnalysisError;
use pipeline::AnalysisConfig;
use report::{OutputFormat, Reporter};
use supplier::csv_file::CsvSupplier;
use supplier::yahoo::YahooSupplier;
use supplier::{HistoryQuery, PriceSupplier};

const DEFAULT_CONFIG_PATH: &str = "stock-signal.toml";

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("market data error")]
    Supplier,
    #[display("analysis error")]
    Analysis,
    #[display("report error")]
    Report,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(
    name = "stock-signal",
    about = "Technical indicators and a signal score for stock tickers"
)]
struct Cli {
    /// Path to the TOML configuration file [default: stock-signal.toml if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ticker to analyze; repeat for several. Replaces `query.tickers`.
    #[arg(short, long = "ticker")]
    tickers: Vec<String>,

    /// First session to include (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Day after the last session to include (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Bar interval: 1m, 5m, 15m, 30m, 1h, 1d, 1wk, 1mo
    #[arg(short, long)]
    interval: Option<String>,

    /// Read prices from a yfinance CSV export instead of the network
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Output format: text, json, json-compact
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_tracing(&config);

    // ── Supplier ──────────────────────────────────────────────────────────────
    let supplier: Arc<dyn PriceSupplier> = match &config.query.csv {
        Some(path) => Arc::new(CsvSupplier::new(path, config.query.tickers.len())),
        None => Arc::new(
            YahooSupplier::new(config.general.requests_per_second)
                .change_context(AppError::Supplier)?,
        ),
    };
    let analysis_config = Arc::new(config.analysis());
    let required_sessions =
        engine::required_bars(&analysis_config.indicators).change_context(AppError::Config)?;
    info!(
        supplier = supplier.name(),
        tickers = config.query.tickers.len(),
        required_sessions,
        "starting analysis"
    );

    let reporter: Arc<dyn Reporter> = Arc::from(report::reporter_for(cli.format));
    let fetch_profile = config.scoring.fundamentals.enabled;

    // ── Shutdown ──────────────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl+c received, cancelling");
            signal_cancel.cancel();
        }
    });

    // ── Per-ticker analysis ───────────────────────────────────────────────────
    // Every ticker runs concurrently; the supplier's limiter paces requests.
    let mut handles = Vec::new();
    for ticker in &config.query.tickers {
        let query = HistoryQuery {
            ticker: ticker.clone(),
            start: config.query.start,
            end: config.query.end,
            interval: config.interval(),
            auto_adjust: config.query.auto_adjust,
        };
        let supplier = Arc::clone(&supplier);
        let analysis_config = Arc::clone(&analysis_config);
        let reporter = Arc::clone(&reporter);
        let cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                result = analyze_ticker(
                    supplier.as_ref(),
                    &query,
                    fetch_profile,
                    &analysis_config,
                    reporter.as_ref(),
                ) => Some(result),
                _ = cancel.cancelled() => None,
            }
        });
        handles.push((ticker.clone(), handle));
    }

    let total = handles.len();
    let mut failed = 0;
    for (ticker, handle) in handles {
        let outcome = handle
            .await
            .change_context(AppError::Runtime)
            .attach_with(|| format!("ticker: {ticker}"))?;

        match outcome {
            Some(Ok(rendered)) => println!("{rendered}"),
            Some(Err(e)) => {
                failed += 1;
                log_failure(&ticker, &e);
            }
            None => {
                failed += 1;
                warn!(ticker = %ticker, "analysis cancelled");
            }
        }
    }

    info!(total, failed, "analysis complete");
    if total > 0 && failed == total {
        return Err(Report::new(AppError::Analysis).attach("every ticker failed"));
    }
    Ok(())
}

/// Explicit `--config` must exist; the default path is optional.
fn load_config(cli: &Cli) -> Result<AppConfig, Report<AppError>> {
    let mut config = match &cli.config {
        Some(path) => config::load(path).change_context(AppError::Config)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            config::load(Path::new(DEFAULT_CONFIG_PATH)).change_context(AppError::Config)?
        }
        None => AppConfig::default(),
    };

    if !cli.tickers.is_empty() {
        config.query.tickers = cli.tickers.clone();
    }
    if cli.start.is_some() {
        config.query.start = cli.start;
    }
    if cli.end.is_some() {
        config.query.end = cli.end;
    }
    if let Some(interval) = &cli.interval {
        config.query.interval = interval.clone();
    }
    if let Some(csv) = &cli.csv {
        config.query.csv = Some(csv.display().to_string());
    }

    config::validate(&config).change_context(AppError::Config)?;
    if config.query.tickers.is_empty() {
        return Err(Report::new(AppError::Config)
            .attach("no tickers: pass --ticker or set query.tickers"));
    }
    Ok(config)
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

async fn analyze_ticker(
    supplier: &dyn PriceSupplier,
    query: &HistoryQuery,
    fetch_profile: bool,
    config: &AnalysisConfig,
    reporter: &dyn Reporter,
) -> Result<String, Report<AppError>> {
    info!(
        supplier = supplier.name(),
        ticker = %query.ticker,
        interval = %query.interval,
        "fetching price history"
    );
    let table = supplier
        .fetch_history(query)
        .await
        .change_context(AppError::Supplier)?;

    // Fundamentals are optional input; a failed lookup only disables that rule.
    let profile = if fetch_profile {
        match supplier.fetch_profile(&query.ticker).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(ticker = %query.ticker, error = ?e, "profile fetch failed (continuing)");
                None
            }
        }
    } else {
        None
    };

    let analysis = pipeline::analyze(&table, profile.as_ref(), config)
        .change_context(AppError::Analysis)
        .attach_with(|| format!("ticker: {}", query.ticker))?;

    reporter.render(&analysis).change_context(AppError::Report)
}

fn log_failure(ticker: &str, report: &Report<AppError>) {
    let short_history = report
        .downcast_ref::<AnalysisError>()
        .is_some_and(AnalysisError::is_short_history);
    if short_history {
        warn!(
            ticker,
            error = ?report,
            "not enough history; widen the date range or use a shorter interval"
        );
    } else {
        warn!(ticker, error = ?report, "analysis failed");
    }
}
