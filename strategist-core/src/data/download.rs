//! Pull orchestrator — sequential downloads over symbols x timeframes.
//!
//! For each task: compute the lookback window, fetch, sanitize, store.
//! Data-quality drops are reported, never fatal. A task failure is recorded
//! and the loop moves on; a tripped circuit breaker abandons the rest.

use chrono::{DateTime, Duration, Utc};

use super::provider::{candles_to_dataframe, CandleProvider, DataError};
use super::sanitize::{sanitize, CleanReport};
use super::store::{CandleStore, Coverage};
use super::symbols::SymbolSpec;
use super::timeframe::Timeframe;

/// How a single symbol + timeframe task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Cleaned data written to the store.
    Stored { rows: usize },
    /// Store already covers the window; nothing fetched.
    Fresh,
    /// Provider returned no candles for the window.
    Empty,
    /// Every fetched row was filtered out; nothing persisted.
    AllDropped,
}

/// Progress callbacks for a pull run.
pub trait PullProgress: Send {
    /// A task is starting.
    fn on_start(&self, label: &str, timeframe: Timeframe, index: usize, total: usize);

    /// The sanitizer ran; called even when nothing was dropped.
    fn on_cleaned(&self, label: &str, timeframe: Timeframe, report: &CleanReport);

    /// A task finished.
    fn on_complete(
        &self,
        label: &str,
        timeframe: Timeframe,
        index: usize,
        total: usize,
        result: &Result<PullOutcome, DataError>,
    );

    /// The whole run finished.
    fn on_batch_complete(&self, summary: &PullSummary);
}

/// Progress reporter that prints to stdout, warnings to stderr.
pub struct StdoutProgress;

impl PullProgress for StdoutProgress {
    fn on_start(&self, label: &str, timeframe: Timeframe, index: usize, total: usize) {
        println!("[{}/{}] {label} {timeframe}: fetching...", index + 1, total);
    }

    fn on_cleaned(&self, label: &str, timeframe: Timeframe, report: &CleanReport) {
        if report.rows_dropped() > 0 {
            eprintln!(
                "WARNING: {label} {timeframe}: cleaned {} bad rows ({:.2}%)",
                report.rows_dropped(),
                report.drop_fraction() * 100.0
            );
        }
        if !report.strictly_increasing {
            eprintln!(
                "ERROR: {label} {timeframe}: timestamps not strictly increasing after cleaning"
            );
        }
    }

    fn on_complete(
        &self,
        label: &str,
        timeframe: Timeframe,
        _index: usize,
        _total: usize,
        result: &Result<PullOutcome, DataError>,
    ) {
        match result {
            Ok(PullOutcome::Stored { rows }) => {
                println!("  OK: {label} {timeframe}: stored {rows} rows")
            }
            Ok(PullOutcome::Fresh) => println!("  OK: {label} {timeframe}: already up to date"),
            Ok(PullOutcome::Empty) => {
                eprintln!("WARNING: {label} {timeframe}: no data returned")
            }
            Ok(PullOutcome::AllDropped) => {
                eprintln!("WARNING: {label} {timeframe}: all rows dropped after cleaning")
            }
            Err(e) => eprintln!("  FAIL: {label} {timeframe}: {e}"),
        }
    }

    fn on_batch_complete(&self, summary: &PullSummary) {
        println!(
            "\nPull complete: {}/{} stored, {} fresh, {} empty, {} failed",
            summary.stored, summary.total, summary.fresh, summary.empty, summary.failed
        );
    }
}

/// Summary of a pull run.
#[derive(Debug)]
pub struct PullSummary {
    pub total: usize,
    pub stored: usize,
    pub fresh: usize,
    /// Tasks that produced nothing to persist (empty fetch or all rows dropped).
    pub empty: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl PullSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Pull every symbol x timeframe combination, sequentially.
pub fn pull_all(
    provider: &dyn CandleProvider,
    store: &CandleStore,
    symbols: &[SymbolSpec],
    timeframes: &[Timeframe],
    force: bool,
    progress: &dyn PullProgress,
) -> PullSummary {
    let total = symbols.len() * timeframes.len();
    let mut summary = PullSummary {
        total,
        stored: 0,
        fresh: 0,
        empty: 0,
        failed: 0,
        errors: Vec::new(),
    };

    let now = Utc::now();
    let mut tasks = Vec::with_capacity(total);
    for spec in symbols {
        for &tf in timeframes {
            tasks.push((spec, tf));
        }
    }

    for (i, &(spec, tf)) in tasks.iter().enumerate() {
        progress.on_start(&spec.label, tf, i, total);

        let start = now - Duration::days(tf.lookback_days());

        if !force {
            if let Coverage::Covered = store.covers(&spec.label, tf, start, now) {
                let result = Ok(PullOutcome::Fresh);
                progress.on_complete(&spec.label, tf, i, total, &result);
                summary.fresh += 1;
                continue;
            }
        }

        let result = pull_single(provider, store, spec, tf, start, now, progress);
        progress.on_complete(&spec.label, tf, i, total, &result);

        match result {
            Ok(PullOutcome::Stored { .. }) => summary.stored += 1,
            Ok(PullOutcome::Fresh) => summary.fresh += 1,
            Ok(PullOutcome::Empty) | Ok(PullOutcome::AllDropped) => summary.empty += 1,
            Err(e) => {
                summary.errors.push((task_name(spec, tf), e));
                summary.failed += 1;
            }
        }

        // Abandon the rest once the provider has shut the door
        if !provider.is_available() {
            for &(rest_spec, rest_tf) in &tasks[(i + 1)..] {
                summary
                    .errors
                    .push((task_name(rest_spec, rest_tf), DataError::CircuitBreakerTripped));
                summary.failed += 1;
            }
            break;
        }
    }

    progress.on_batch_complete(&summary);
    summary
}

/// One task: fetch, sanitize, store.
fn pull_single(
    provider: &dyn CandleProvider,
    store: &CandleStore,
    spec: &SymbolSpec,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    progress: &dyn PullProgress,
) -> Result<PullOutcome, DataError> {
    let fetched = provider.fetch(&spec.instrument, timeframe, start, end)?;
    if fetched.is_empty() {
        return Ok(PullOutcome::Empty);
    }

    let raw = candles_to_dataframe(&fetched.candles)?;
    let (cleaned, report) =
        sanitize(&raw).map_err(|e| DataError::ValidationError(e.to_string()))?;
    progress.on_cleaned(&spec.label, timeframe, &report);

    if cleaned.height() == 0 {
        return Ok(PullOutcome::AllDropped);
    }

    store.write(&spec.label, timeframe, &cleaned, provider.name())?;
    Ok(PullOutcome::Stored {
        rows: cleaned.height(),
    })
}

fn task_name(spec: &SymbolSpec, timeframe: Timeframe) -> String {
    format!("{} {}", spec.label, timeframe)
}
