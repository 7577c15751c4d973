//! Candle provider trait and structured error types.
//!
//! The trait abstracts over candle sources (Dukascopy HTTP, mocks in tests)
//! so the pull orchestrator never knows transport details. The store layer
//! sits above this trait; providers do not know about the store.

use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::timeframe::Timeframe;

/// Raw OHLCV candle from a provider, before sanitizing.
///
/// Timestamps are milliseconds since the Unix epoch, UTC. Fields may be NaN;
/// the sanitizer decides what survives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawCandle {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Which side of the book the candles are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferSide {
    Bid,
    Ask,
}

impl OfferSide {
    pub fn code(&self) -> &'static str {
        match self {
            OfferSide::Bid => "B",
            OfferSide::Ask => "A",
        }
    }
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("instrument not found: {instrument}")]
    InstrumentNotFound { instrument: String },

    #[error("hard stop: provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("store error: {0}")]
    StoreError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no stored data for {label} {timeframe} — run `pull` first")]
    NoStoredData { label: String, timeframe: Timeframe },

    #[error("data error: {0}")]
    Other(String),
}

/// Result of fetching one instrument + timeframe.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub candles: Vec<RawCandle>,
}

impl FetchResult {
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// Trait for candle providers.
pub trait CandleProvider: Send + Sync {
    /// Human-readable name, recorded in store metadata.
    fn name(&self) -> &str;

    /// Fetch candles for an instrument over a UTC time range.
    ///
    /// An empty result is not an error; thin instruments have gaps.
    fn fetch(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchResult, DataError>;

    /// Whether the provider is currently usable (not rate-limited or banned).
    fn is_available(&self) -> bool;
}

/// Build a candle DataFrame matching [`super::CandleSchema`] from raw candles.
pub fn candles_to_dataframe(candles: &[RawCandle]) -> Result<DataFrame, DataError> {
    let ts: Vec<i64> = candles.iter().map(|c| c.timestamp_ms).collect();
    let opens: Vec<f64> = candles.iter().map(|c| c.open).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    DataFrame::new(vec![
        Column::new("timestamp".into(), ts)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .map_err(|e| DataError::Other(format!("timestamp cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::Other(format!("dataframe creation: {e}")))
}
