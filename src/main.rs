mod analyzer;
mod api;
mod collector;
mod config;
mod model;
mod normalizer;
mod parser;
mod period;
mod region;
mod storage;
mod utils;

use analyzer::{Analyzer, AnalyzerImpl};
use api::MolitClient;
use chrono::{Local, NaiveDate};
use clap::Parser as _;
use collector::Collector;
use config::{load_config, Overrides};
use model::AppError;
use period::{compute_period_window, window_bounds};
use region::load_region_table;
use std::path::PathBuf;
use std::process::ExitCode;
use storage::{output_path, CsvExporter, Exporter};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Collects MOLIT apartment sale transactions for the recent months and
/// writes them to a CSV file.
#[derive(clap::Parser, Debug)]
#[command(name = "apt-trade-collector", version, about, long_about = None)]
struct Cli {
    /// JSON config file (defaults to ./config.json when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of months to collect, ending at the current month
    #[arg(long)]
    months_back: Option<u32>,

    /// Directory the CSV file is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Region code table (region CSV or 법정동코드 dump)
    #[arg(long)]
    region_table: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("apt_trade_collector={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    dotenvy::dotenv().ok();

    let today = Local::now().date_naive();
    match run(cli, |key| std::env::var(key).ok(), today).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// One collection run. Returns the path of the written CSV, or `None` when
/// the window is empty.
async fn run<F>(cli: Cli, env: F, today: NaiveDate) -> Result<Option<PathBuf>, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let overrides = Overrides {
        months_back: cli.months_back,
        output_dir: cli.output_dir,
        region_table: cli.region_table,
    };
    let config = load_config(cli.config.as_deref(), env, &overrides)?;
    let regions = load_region_table(&config.region_table)?;

    let window = compute_period_window(today, config.months_back, config.include_current_month);
    let Some((start, end)) = window_bounds(&window) else {
        warn!("Empty collection window, nothing to do");
        return Ok(None);
    };
    info!("Collection period: {} ~ {}", start, end);

    let client = MolitClient::new(config.api.clone())?;
    let collector = Collector::new(client, config.collect.clone());
    let dataset = collector.collect(&regions, &window).await;

    AnalyzerImpl::new().log_summary(&dataset);
    if dataset.is_empty() {
        warn!("No transactions collected; writing header-only file");
    }

    let path = output_path(&config.output_dir, start, end);
    CsvExporter::new().export(&dataset, &path)?;
    Ok(Some(path))
}
