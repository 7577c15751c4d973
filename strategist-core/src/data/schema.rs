//! Canonical candle schema and structural validation.
//!
//! Data-quality problems (NaNs, corrupt bars) are handled by the sanitizer;
//! a missing or mistyped column is a structural error and fails fast here.

use polars::prelude::*;

/// Columns every candle frame must carry.
pub const OHLCV_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Expected schema for a single-symbol candle series.
pub struct CandleSchema;

impl CandleSchema {
    /// The canonical candle schema: a millisecond timestamp plus OHLCV.
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(
                "timestamp".into(),
                DataType::Datetime(TimeUnit::Milliseconds, None),
            ),
            Field::new("open".into(), DataType::Float64),
            Field::new("high".into(), DataType::Float64),
            Field::new("low".into(), DataType::Float64),
            Field::new("close".into(), DataType::Float64),
            Field::new("volume".into(), DataType::Float64),
        ])
    }

    /// Validate a DataFrame against the canonical schema.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}
