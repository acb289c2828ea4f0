//! Price overlay dashboard.
//!
//! Opens the terminal dashboard by default. `--headless` prints the selected
//! instrument's forecast for the selected range as CSV on stdout instead.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use price_overlay::app::{Dashboard, Selection};
use price_overlay::{DashboardConfig, DashboardContext, ForecastCache, Instrument};

/// Actual vs predicted closing prices for Mastercard and Visa
#[derive(Parser, Debug)]
#[command(name = "price-overlay")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(long, env = "PRICE_OVERLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Price table CSV (overrides the config file)
    #[arg(long, env = "PRICE_OVERLAY_DATA")]
    data: Option<PathBuf>,

    /// Directory with scaler, trend and model artifacts
    #[arg(long, env = "PRICE_OVERLAY_ARTIFACTS")]
    artifacts: Option<PathBuf>,

    /// Initially selected instrument
    #[arg(long, value_enum, default_value_t = Instrument::Mastercard)]
    instrument: Instrument,

    /// Range start (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Range end (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Print the forecast as CSV instead of opening the dashboard
    #[arg(long)]
    headless: bool,

    /// Write logs to this file (the dashboard owns the terminal)
    #[arg(long, env = "PRICE_OVERLAY_LOG")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn load_config(&self) -> Result<DashboardConfig> {
        let mut config = match &self.config {
            Some(path) => DashboardConfig::from_json_path(path)?,
            None => DashboardConfig::default(),
        };
        if let Some(data) = &self.data {
            config.data_path = data.clone();
        }
        if let Some(artifacts) = &self.artifacts {
            config.artifacts_dir = artifacts.clone();
        }
        if let Some(start) = self.start {
            config.default_start = start;
        }
        if let Some(end) = self.end {
            config.default_end = end;
        }
        Ok(config)
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("price_overlay=info"));

    let stderr_layer = args
        .headless
        .then(|| fmt::layer().with_writer(io::stderr));
    let file_layer = match &args.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

#[derive(Serialize)]
struct CsvRow {
    date: NaiveDate,
    actual: f64,
    predicted: f64,
}

fn run_headless(ctx: &DashboardContext, selection: &Selection) -> Result<()> {
    let mut cache = ForecastCache::new();
    let view = cache.view(ctx, selection.instrument, &selection.range)?;

    let mut writer = csv::Writer::from_writer(io::stdout().lock());
    for point in view.points() {
        writer.serialize(CsvRow {
            date: point.date,
            actual: point.actual,
            predicted: point.predicted,
        })?;
    }
    writer.flush()?;

    info!(
        instrument = %selection.instrument,
        points = view.len(),
        "wrote forecast"
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let config = args.load_config()?;
    let ctx = DashboardContext::load(&config)?;
    let selection = Selection::new(args.instrument, config.default_range());

    if args.headless {
        return run_headless(&ctx, &selection);
    }

    Dashboard::new(&ctx, selection).run()?;
    info!("dashboard closed");
    Ok(())
}
