//! Strategist CLI — pull historical candle data and inspect the local store.
//!
//! Commands:
//! - `pull` — download candles for the configured symbols across all
//!   timeframes, clean them, and store Parquet files
//! - `status` — report what the store holds per symbol and timeframe

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use strategist_core::data::{
    pull_all, CandleStore, CircuitBreaker, DukascopyProvider, StdoutProgress, SymbolConfig,
    SymbolSpec, Timeframe,
};

#[derive(Parser)]
#[command(
    name = "strategist",
    about = "Algorithmic Strategist — historical candle data tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, clean, and store candle data for the configured symbols.
    Pull {
        /// Symbol config file.
        #[arg(long, default_value = "config/symbols.json")]
        config: PathBuf,

        /// Root directory for stored Parquet files.
        #[arg(long, default_value = "historical_data")]
        data_dir: PathBuf,

        /// Re-download even when the store already covers the window.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Only pull these labels (subset of the config).
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Only pull these timeframes (e.g. 1min,1hr,1day). Defaults to all.
        #[arg(long, value_delimiter = ',')]
        timeframes: Vec<String>,
    },
    /// Report stored series per symbol and timeframe.
    Status {
        /// Symbol config file.
        #[arg(long, default_value = "config/symbols.json")]
        config: PathBuf,

        /// Root directory for stored Parquet files.
        #[arg(long, default_value = "historical_data")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Pull {
            config,
            data_dir,
            force,
            symbols,
            timeframes,
        } => run_pull(&config, data_dir, force, &symbols, &timeframes),
        Commands::Status { config, data_dir } => run_status(&config, &data_dir),
    }
}

fn run_pull(
    config_path: &PathBuf,
    data_dir: PathBuf,
    force: bool,
    symbol_filter: &[String],
    timeframe_filter: &[String],
) -> Result<()> {
    let config = SymbolConfig::from_file(config_path)
        .with_context(|| format!("loading symbol config {}", config_path.display()))?;

    let symbols = select_symbols(&config, symbol_filter)?;
    let timeframes = select_timeframes(timeframe_filter)?;

    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = DukascopyProvider::new(circuit_breaker)?;
    let store = CandleStore::new(data_dir);
    let progress = StdoutProgress;

    let summary = pull_all(&provider, &store, &symbols, &timeframes, force, &progress);

    if !summary.all_succeeded() {
        for (task, err) in &summary.errors {
            eprintln!("Error for {task}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_status(config_path: &PathBuf, data_dir: &PathBuf) -> Result<()> {
    let config = SymbolConfig::from_file(config_path)
        .with_context(|| format!("loading symbol config {}", config_path.display()))?;
    let store = CandleStore::new(data_dir);

    let labels = config.labels();
    let statuses = store.status(&labels, &Timeframe::ALL);

    println!("{:<10} {:<6} {:>9}  range", "symbol", "tf", "rows");
    for status in statuses {
        if status.stored {
            println!(
                "{:<10} {:<6} {:>9}  {} to {}",
                status.label,
                status.timeframe.label(),
                status.rows.unwrap_or(0),
                status
                    .first_timestamp
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
                status
                    .last_timestamp
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
            );
        } else {
            println!(
                "{:<10} {:<6} {:>9}  -",
                status.label,
                status.timeframe.label(),
                "-"
            );
        }
    }

    Ok(())
}

fn select_symbols(config: &SymbolConfig, filter: &[String]) -> Result<Vec<SymbolSpec>> {
    if filter.is_empty() {
        return Ok(config.symbols.clone());
    }

    let mut selected = Vec::with_capacity(filter.len());
    for label in filter {
        match config.symbols.iter().find(|s| &s.label == label) {
            Some(spec) => selected.push(spec.clone()),
            None => bail!("symbol '{label}' is not in the config"),
        }
    }
    Ok(selected)
}

fn select_timeframes(filter: &[String]) -> Result<Vec<Timeframe>> {
    if filter.is_empty() {
        return Ok(Timeframe::ALL.to_vec());
    }

    let mut selected = Vec::with_capacity(filter.len());
    for label in filter {
        match Timeframe::from_label(label) {
            Some(tf) => selected.push(tf),
            None => bail!(
                "unknown timeframe '{label}'. Valid: 1min, 5min, 15min, 30min, 1hr, 4hr, 1day"
            ),
        }
    }
    Ok(selected)
}
