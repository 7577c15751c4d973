//! Defensive cleaning for candle series.
//!
//! Provider data is generally clean, but nothing downstream should have to
//! trust that. The sanitizer is a pure transform: sort by timestamp, drop
//! duplicate timestamps (first occurrence wins), drop rows with missing
//! values, drop corrupt bars (high < low), drop non-positive volume.
//!
//! Bad rows are never an error here; they are filtered and counted in the
//! [`CleanReport`]. The only failure mode is structural: a required column
//! that is absent or mistyped.

use polars::prelude::*;

use super::schema::{CandleSchema, SchemaError, OHLCV_COLUMNS};

/// What the sanitizer did to a series.
///
/// Stage counts are measured in the order the filters run, so a row that is
/// both a duplicate and NaN-valued is counted once, as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanReport {
    pub rows_in: usize,
    pub rows_out: usize,
    /// Rows removed because an earlier row had the same timestamp.
    pub duplicate_rows: usize,
    /// Rows removed for a null or NaN in any OHLCV field.
    pub missing_value_rows: usize,
    /// Rows removed because high < low.
    pub inverted_bar_rows: usize,
    /// Rows removed because volume <= 0.
    pub non_positive_volume_rows: usize,
    /// Post-check: output timestamps are strictly ascending. False here means
    /// a defect in the sort/dedup logic, not bad input data.
    pub strictly_increasing: bool,
}

impl CleanReport {
    /// Total rows removed across all stages.
    pub fn rows_dropped(&self) -> usize {
        self.rows_in - self.rows_out
    }

    /// Fraction of input rows removed, in [0, 1]. Zero for empty input.
    pub fn drop_fraction(&self) -> f64 {
        if self.rows_in == 0 {
            0.0
        } else {
            self.rows_dropped() as f64 / self.rows_in as f64
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("sanitize failed: {0}")]
    Polars(#[from] PolarsError),
}

/// Clean a candle series so it satisfies the series invariants:
/// unique, strictly ascending timestamps; no missing OHLCV values;
/// `high >= low`; `volume > 0`.
///
/// Returns the filtered frame and a [`CleanReport`]. An output emptied by
/// filtering is valid; the caller decides whether that is actionable.
/// Idempotent: sanitizing a sanitized frame changes nothing.
pub fn sanitize(df: &DataFrame) -> Result<(DataFrame, CleanReport), SanitizeError> {
    CandleSchema::validate(df)?;
    let rows_in = df.height();

    // Stable sort, then keep the first row per timestamp.
    let deduped = df
        .clone()
        .lazy()
        .sort(
            ["timestamp"],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .unique_stable(Some(vec!["timestamp".into()]), UniqueKeepStrategy::First)
        .collect()?;
    let duplicate_rows = rows_in - deduped.height();

    let present = deduped
        .lazy()
        .filter(all_fields_present())
        .collect()?;
    let missing_value_rows = rows_in - duplicate_rows - present.height();

    let shaped = present
        .lazy()
        .filter(col("high").gt_eq(col("low")))
        .collect()?;
    let inverted_bar_rows = rows_in - duplicate_rows - missing_value_rows - shaped.height();

    let cleaned = shaped.lazy().filter(col("volume").gt(0.0)).collect()?;
    let non_positive_volume_rows =
        rows_in - duplicate_rows - missing_value_rows - inverted_bar_rows - cleaned.height();

    let strictly_increasing = timestamps_strictly_increasing(&cleaned)?;
    debug_assert!(
        strictly_increasing,
        "timestamps not strictly increasing after sort + dedup"
    );

    let report = CleanReport {
        rows_in,
        rows_out: cleaned.height(),
        duplicate_rows,
        missing_value_rows,
        inverted_bar_rows,
        non_positive_volume_rows,
        strictly_increasing,
    };

    Ok((cleaned, report))
}

/// Every OHLCV field is non-null and non-NaN.
fn all_fields_present() -> Expr {
    OHLCV_COLUMNS
        .iter()
        .map(|name| col(*name).is_not_null().and(col(*name).is_not_nan()))
        .reduce(|acc, e| acc.and(e))
        .unwrap_or_else(|| lit(true))
}

fn timestamps_strictly_increasing(df: &DataFrame) -> Result<bool, PolarsError> {
    let ts = df.column("timestamp")?.cast(&DataType::Int64)?;
    let ca = ts.i64()?;

    let mut prev: Option<i64> = None;
    for value in ca.into_iter() {
        if let Some(current) = value {
            if let Some(p) = prev {
                if current <= p {
                    return Ok(false);
                }
            }
            prev = Some(current);
        }
    }
    Ok(true)
}
