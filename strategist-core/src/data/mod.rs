//! Candle acquisition, cleaning, and persistence.

pub mod circuit_breaker;
pub mod download;
pub mod dukascopy;
pub mod provider;
pub mod sanitize;
pub mod schema;
pub mod store;
pub mod symbols;
pub mod timeframe;

pub use circuit_breaker::CircuitBreaker;
pub use download::{pull_all, PullOutcome, PullProgress, PullSummary, StdoutProgress};
pub use dukascopy::DukascopyProvider;
pub use provider::{
    candles_to_dataframe, CandleProvider, DataError, FetchResult, OfferSide, RawCandle,
};
pub use sanitize::{sanitize, CleanReport, SanitizeError};
pub use schema::{CandleSchema, SchemaError};
pub use store::{CandleStore, Coverage, SeriesStatus, StoreMeta};
pub use symbols::{SymbolConfig, SymbolConfigError, SymbolSpec};
pub use timeframe::Timeframe;
