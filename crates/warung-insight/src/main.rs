//! warung-insight: sales drop analysis for multi-platform food delivery.
//!
//! Usage:
//!   warung-insight [OPTIONS] --data <CSV> --restaurant <ID> --period <START_END>
//!
//! Options:
//!   -c, --config <FILE>      Config file path (default: config/insight.toml)
//!   -d, --data <CSV>         Observation table CSV
//!   -a, --artifacts <DIR>    Model artifact directory (default: ml/artifacts)
//!   -r, --restaurant <ID>    Restaurant to analyze
//!   -p, --period <RANGE>     Date window, e.g. 2025-04-01_2025-05-31
//!       --log-level <LEVEL>  Override the configured log level

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use warung_common::ObservationTable;
use warung_insight::config::InsightConfig;
use warung_insight::error::InsightError;
use warung_insight::report::{generate_report, ReportRequest};
use warung_insight::service::ModelService;

/// CLI arguments for warung-insight.
#[derive(Parser, Debug)]
#[command(name = "warung-insight")]
#[command(about = "Root-cause analysis of food-delivery sales drops")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/insight.toml")]
    config: PathBuf,

    /// Observation table CSV produced by the upstream pipeline
    #[arg(short, long)]
    data: PathBuf,

    /// Model artifact directory
    #[arg(short, long, default_value = "ml/artifacts")]
    artifacts: PathBuf,

    /// Restaurant to analyze
    #[arg(short, long)]
    restaurant: i64,

    /// Date window as START_END (e.g. 2025-04-01_2025-05-31)
    #[arg(short, long)]
    period: String,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = if args.config.exists() {
        InsightConfig::from_file(&args.config)?
    } else {
        InsightConfig::default()
    };
    config.apply_env_overrides();
    config.apply_cli_overrides(args.log_level.clone());
    config.validate()?;

    init_tracing(&config.log_level.0)?;
    if !args.config.exists() {
        warn!(path = %args.config.display(), "config file not found, using defaults");
    }

    let (start, end) = parse_period(&args.period)?;
    let request = ReportRequest {
        restaurant_id: args.restaurant,
        start,
        end,
    };

    let table = ObservationTable::from_csv_path(&args.data)
        .with_context(|| format!("Failed to load observations from {:?}", args.data))?;
    info!(rows = table.len(), "observation table loaded");

    let service = match ModelService::load(&args.artifacts) {
        Ok(service) => Some(service),
        Err(err) => {
            warn!("{err}; continuing with baseline-only analysis");
            None
        }
    };

    match generate_report(service.as_ref(), &config, &table, &request) {
        Ok(report) => {
            println!("{}", report.render());
            Ok(())
        }
        Err(InsightError::InsufficientData { days, min_days }) => {
            println!(
                "Insufficient data: only {days} distinct days in the window, need at least {min_days}."
            );
            Ok(())
        }
        Err(err) => Err(err).context("report generation failed"),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")
}

fn parse_period(raw: &str) -> Result<(NaiveDate, NaiveDate)> {
    let Some((start_str, end_str)) = raw.split_once('_') else {
        bail!("period must be START_END, e.g. 2025-04-01_2025-05-31");
    };
    let start = NaiveDate::parse_from_str(start_str, "%Y-%m-%d")
        .with_context(|| format!("invalid period start date: {start_str}"))?;
    let end = NaiveDate::parse_from_str(end_str, "%Y-%m-%d")
        .with_context(|| format!("invalid period end date: {end_str}"))?;
    if end < start {
        bail!("period end {end} is before start {start}");
    }
    Ok((start, end))
}
