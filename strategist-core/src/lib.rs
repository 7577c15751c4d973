//! Strategist Core — historical OHLCV candle pipeline.
//!
//! This crate covers the full path from a remote candle provider to a
//! columnar file on disk:
//! - Candle schema and structural validation
//! - Defensive sanitizer (dedup, NaN/null drop, corrupt bars, bad volume)
//! - Provider trait with a Dukascopy HTTP implementation
//! - Circuit breaker for rate limits and bans
//! - Parquet store with atomic writes and metadata sidecars
//! - Sequential pull orchestrator over symbols x timeframes

pub mod data;
