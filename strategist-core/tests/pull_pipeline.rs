//! Integration tests for the pull pipeline: mock provider -> sanitizer -> store.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use strategist_core::data::{
    pull_all, CandleProvider, CandleStore, CleanReport, DataError, FetchResult, PullOutcome,
    PullProgress, PullSummary, RawCandle, SymbolSpec, Timeframe,
};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_data_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "strategist_pipeline_{}_{id}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn spec(instrument: &str, label: &str) -> SymbolSpec {
    SymbolSpec {
        instrument: instrument.into(),
        label: label.into(),
    }
}

fn candle(ts_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> RawCandle {
    RawCandle {
        timestamp_ms: ts_ms,
        open,
        high,
        low,
        close,
        volume,
    }
}

const HOUR_MS: i64 = 3_600_000;

fn clean_candles(n: usize) -> Vec<RawCandle> {
    (0..n)
        .map(|i| {
            let base = 1.1 + i as f64 * 0.01;
            candle(
                i as i64 * HOUR_MS,
                base,
                base + 0.1,
                base - 0.1,
                base + 0.05,
                100.0 + i as f64,
            )
        })
        .collect()
}

/// Mock provider serving canned responses per instrument.
struct MockProvider {
    responses: Mutex<HashMap<String, Result<Vec<RawCandle>, DataError>>>,
    available: AtomicBool,
    trip_on_error: bool,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            trip_on_error: false,
        }
    }

    fn with_candles(self, instrument: &str, candles: Vec<RawCandle>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(instrument.into(), Ok(candles));
        self
    }

    fn with_error(self, instrument: &str, err: DataError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(instrument.into(), Err(err));
        self
    }

    fn tripping_on_error(mut self) -> Self {
        self.trip_on_error = true;
        self
    }
}

impl CandleProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<FetchResult, DataError> {
        let responses = self.responses.lock().unwrap();
        match responses.get(instrument) {
            Some(Ok(candles)) => Ok(FetchResult {
                instrument: instrument.to_string(),
                timeframe,
                candles: candles.clone(),
            }),
            Some(Err(e)) => {
                if self.trip_on_error {
                    self.available.store(false, Ordering::SeqCst);
                }
                Err(DataError::Other(e.to_string()))
            }
            None => Ok(FetchResult {
                instrument: instrument.to_string(),
                timeframe,
                candles: Vec::new(),
            }),
        }
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

/// Progress sink that records clean reports for assertions.
struct RecordingProgress {
    reports: Mutex<Vec<(String, CleanReport)>>,
}

impl RecordingProgress {
    fn new() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
        }
    }
}

impl PullProgress for RecordingProgress {
    fn on_start(&self, _label: &str, _timeframe: Timeframe, _index: usize, _total: usize) {}

    fn on_cleaned(&self, label: &str, _timeframe: Timeframe, report: &CleanReport) {
        self.reports.lock().unwrap().push((label.into(), *report));
    }

    fn on_complete(
        &self,
        _label: &str,
        _timeframe: Timeframe,
        _index: usize,
        _total: usize,
        _result: &Result<PullOutcome, DataError>,
    ) {
    }

    fn on_batch_complete(&self, _summary: &PullSummary) {}
}

#[test]
fn pull_stores_cleaned_series_at_expected_path() {
    let dir = temp_data_dir();
    let store = CandleStore::new(&dir);
    let provider = MockProvider::new().with_candles("EUR/USD", clean_candles(10));
    let progress = RecordingProgress::new();

    let summary = pull_all(
        &provider,
        &store,
        &[spec("EUR/USD", "EURUSD")],
        &[Timeframe::Hour1],
        false,
        &progress,
    );

    assert!(summary.all_succeeded());
    assert_eq!(summary.stored, 1);
    assert!(dir.join("EURUSD/1hr/EURUSD_1hr.parquet").exists());

    let loaded = store.load("EURUSD", Timeframe::Hour1).unwrap();
    assert_eq!(loaded.height(), 10);
}

#[test]
fn pull_cleans_dirty_data_before_storing() {
    let store = CandleStore::new(temp_data_dir());
    let mut candles = clean_candles(5);
    candles.push(candle(0, 1.1, 1.2, 1.0, 1.15, 100.0)); // duplicate timestamp
    candles.push(candle(10 * HOUR_MS, f64::NAN, 1.2, 1.0, 1.15, 100.0));
    candles.push(candle(11 * HOUR_MS, 1.1, 0.9, 1.2, 1.15, 100.0)); // high < low
    candles.push(candle(12 * HOUR_MS, 1.1, 1.2, 1.0, 1.15, 0.0)); // zero volume

    let provider = MockProvider::new().with_candles("EUR/USD", candles);
    let progress = RecordingProgress::new();

    let summary = pull_all(
        &provider,
        &store,
        &[spec("EUR/USD", "EURUSD")],
        &[Timeframe::Hour1],
        false,
        &progress,
    );

    assert!(summary.all_succeeded());
    let loaded = store.load("EURUSD", Timeframe::Hour1).unwrap();
    assert_eq!(loaded.height(), 5);

    let reports = progress.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    let report = reports[0].1;
    assert_eq!(report.rows_in, 9);
    assert_eq!(report.rows_out, 5);
    assert_eq!(report.duplicate_rows, 1);
    assert_eq!(report.missing_value_rows, 1);
    assert_eq!(report.inverted_bar_rows, 1);
    assert_eq!(report.non_positive_volume_rows, 1);
    assert!(report.strictly_increasing);
}

#[test]
fn empty_fetch_stores_nothing() {
    let dir = temp_data_dir();
    let store = CandleStore::new(&dir);
    let provider = MockProvider::new(); // no canned data: every fetch is empty
    let progress = RecordingProgress::new();

    let summary = pull_all(
        &provider,
        &store,
        &[spec("EUR/USD", "EURUSD")],
        &[Timeframe::Day1],
        false,
        &progress,
    );

    assert!(summary.all_succeeded());
    assert_eq!(summary.empty, 1);
    assert_eq!(summary.stored, 0);
    assert!(!dir.join("EURUSD/1day/EURUSD_1day.parquet").exists());
}

#[test]
fn fully_dirty_fetch_stores_nothing() {
    let dir = temp_data_dir();
    let store = CandleStore::new(&dir);
    // Every candle is corrupt or zero-volume.
    let candles = vec![
        candle(0, 1.1, 0.9, 1.2, 1.15, 100.0),
        candle(HOUR_MS, 1.1, 1.2, 1.0, 1.15, 0.0),
    ];
    let provider = MockProvider::new().with_candles("EUR/USD", candles);
    let progress = RecordingProgress::new();

    let summary = pull_all(
        &provider,
        &store,
        &[spec("EUR/USD", "EURUSD")],
        &[Timeframe::Hour1],
        false,
        &progress,
    );

    assert!(summary.all_succeeded());
    assert_eq!(summary.empty, 1);
    assert!(!dir.join("EURUSD/1hr/EURUSD_1hr.parquet").exists());
}

#[test]
fn provider_failure_is_recorded_and_loop_continues() {
    let store = CandleStore::new(temp_data_dir());
    let provider = MockProvider::new()
        .with_error(
            "EUR/USD",
            DataError::NetworkUnreachable("connection refused".into()),
        )
        .with_candles("GBP/USD", clean_candles(3));
    let progress = RecordingProgress::new();

    let summary = pull_all(
        &provider,
        &store,
        &[spec("EUR/USD", "EURUSD"), spec("GBP/USD", "GBPUSD")],
        &[Timeframe::Hour1],
        false,
        &progress,
    );

    assert!(!summary.all_succeeded());
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.stored, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].0, "EURUSD 1hr");
    assert!(store.load("GBPUSD", Timeframe::Hour1).is_ok());
}

#[test]
fn tripped_breaker_abandons_remaining_tasks() {
    let store = CandleStore::new(temp_data_dir());
    let provider = MockProvider::new()
        .with_error("EUR/USD", DataError::CircuitBreakerTripped)
        .with_candles("GBP/USD", clean_candles(3))
        .tripping_on_error();
    let progress = RecordingProgress::new();

    let summary = pull_all(
        &provider,
        &store,
        &[spec("EUR/USD", "EURUSD"), spec("GBP/USD", "GBPUSD")],
        &[Timeframe::Hour1, Timeframe::Day1],
        false,
        &progress,
    );

    // First task fails and trips; the other three are abandoned.
    assert_eq!(summary.total, 4);
    assert_eq!(summary.failed, 4);
    assert_eq!(summary.stored, 0);
    assert!(store.load("GBPUSD", Timeframe::Hour1).is_err());
}

#[test]
fn second_pull_skips_covered_series() {
    let store = CandleStore::new(temp_data_dir());
    // Future-dated candles so the stored range covers the lookback window.
    let now_ms = Utc::now().timestamp_millis();
    let lookback_ms = Timeframe::Hour1.lookback_days() * 24 * HOUR_MS;
    let candles = vec![
        candle(now_ms - lookback_ms - HOUR_MS, 1.1, 1.2, 1.0, 1.15, 100.0),
        candle(now_ms + HOUR_MS, 1.2, 1.3, 1.1, 1.25, 200.0),
    ];
    let provider = MockProvider::new().with_candles("EUR/USD", candles);
    let progress = RecordingProgress::new();

    let first = pull_all(
        &provider,
        &store,
        &[spec("EUR/USD", "EURUSD")],
        &[Timeframe::Hour1],
        false,
        &progress,
    );
    assert_eq!(first.stored, 1);

    let second = pull_all(
        &provider,
        &store,
        &[spec("EUR/USD", "EURUSD")],
        &[Timeframe::Hour1],
        false,
        &progress,
    );
    assert_eq!(second.fresh, 1);
    assert_eq!(second.stored, 0);

    // Force overrides the freshness check.
    let forced = pull_all(
        &provider,
        &store,
        &[spec("EUR/USD", "EURUSD")],
        &[Timeframe::Hour1],
        true,
        &progress,
    );
    assert_eq!(forced.stored, 1);
}

#[test]
fn status_reflects_pull_results() {
    let store = CandleStore::new(temp_data_dir());
    let provider = MockProvider::new().with_candles("EUR/USD", clean_candles(4));
    let progress = RecordingProgress::new();

    pull_all(
        &provider,
        &store,
        &[spec("EUR/USD", "EURUSD")],
        &[Timeframe::Hour1],
        false,
        &progress,
    );

    let statuses = store.status(&["EURUSD"], &[Timeframe::Hour1, Timeframe::Day1]);
    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].stored);
    assert_eq!(statuses[0].rows, Some(4));
    assert!(!statuses[1].stored);
    assert_eq!(statuses[1].rows, None);
}
