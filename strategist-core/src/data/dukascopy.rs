//! Dukascopy candle provider.
//!
//! Fetches aggregated OHLCV candles from Dukascopy's historical-prices JSON
//! endpoint, bid side by default. Handles retries with exponential backoff,
//! response parsing, and the circuit breaker on bans and rate limits.
//!
//! Dukascopy aggregates candles from pre-filtered tick data, so responses
//! are usually clean. The sanitizer still runs on everything downstream.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::circuit_breaker::CircuitBreaker;
use super::provider::{CandleProvider, DataError, FetchResult, OfferSide, RawCandle};
use super::timeframe::Timeframe;

const ENDPOINT: &str = "https://freeserv.dukascopy.com/2.0/index.php";

/// Historical-prices JSON response. Candles arrive as
/// `[timestamp_ms, open, high, low, close, volume]` rows.
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    candles: Option<Vec<[f64; 6]>>,
    error: Option<HistoryError>,
}

#[derive(Debug, Deserialize)]
struct HistoryError {
    code: String,
    message: String,
}

/// Dukascopy HTTP provider.
pub struct DukascopyProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    offer_side: OfferSide,
    max_retries: u32,
    base_delay: Duration,
}

impl DukascopyProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            offer_side: OfferSide::Bid,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Use ask-side candles instead of the default bid side.
    pub fn with_offer_side(mut self, offer_side: OfferSide) -> Self {
        self.offer_side = offer_side;
        self
    }

    /// Build the request URL for an instrument, interval, and UTC range.
    fn history_url(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> String {
        format!(
            "{ENDPOINT}?path=api%2FhistoricalPrices&instrument={instrument}\
             &timeFrame={interval}&offerSide={side}\
             &start={start_ms}&end={end_ms}&count=0&format=json",
            interval = timeframe.interval_code(),
            side = self.offer_side.code(),
            start_ms = start.timestamp_millis(),
            end_ms = end.timestamp_millis(),
        )
    }

    /// Parse a response body into raw candles.
    fn parse_response(
        instrument: &str,
        resp: HistoryResponse,
    ) -> Result<Vec<RawCandle>, DataError> {
        let rows = match resp.candles {
            Some(rows) => rows,
            None => {
                return Err(match resp.error {
                    Some(err) if err.code == "instrument_not_found" => {
                        DataError::InstrumentNotFound {
                            instrument: instrument.to_string(),
                        }
                    }
                    Some(err) => DataError::ResponseFormatChanged(format!(
                        "{}: {}",
                        err.code, err.message
                    )),
                    None => {
                        DataError::ResponseFormatChanged("no candles and no error".into())
                    }
                });
            }
        };

        // Empty is valid: thin instruments and closed markets have gaps.
        let candles = rows
            .into_iter()
            .map(|[ts, open, high, low, close, volume]| RawCandle {
                timestamp_ms: ts as i64,
                open,
                high,
                low,
                close,
                volume,
            })
            .collect();

        Ok(candles)
    }

    /// Execute the request with retry, backoff, and circuit breaker checks.
    fn fetch_with_retry(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawCandle>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = self.history_url(instrument, timeframe, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        // Ban — stop talking to the provider at once
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error =
                            Some(DataError::Other(format!("HTTP {status} for {instrument}")));
                        continue;
                    }

                    let body: HistoryResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {instrument}: {e}"
                        ))
                    })?;

                    let candles = Self::parse_response(instrument, body)?;
                    self.circuit_breaker.record_success();
                    return Ok(candles);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl CandleProvider for DukascopyProvider {
    fn name(&self) -> &str {
        "dukascopy"
    }

    fn fetch(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchResult, DataError> {
        let candles = self.fetch_with_retry(instrument, timeframe, start, end)?;
        Ok(FetchResult {
            instrument: instrument.to_string(),
            timeframe,
            candles,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
