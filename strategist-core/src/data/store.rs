//! Parquet store for cleaned candle series.
//!
//! Layout: `{data_dir}/{LABEL}/{TF}/{LABEL}_{TF}.parquet`
//!
//! - Atomic writes (encode to a buffer, write `.tmp`, rename into place)
//! - Metadata sidecar per series (row count, time range, blake3 hash, source)
//! - Schema validation on load; unreadable files are quarantined aside

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::provider::DataError;
use super::schema::CandleSchema;
use super::timeframe::Timeframe;

/// Metadata sidecar for one stored series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub label: String,
    pub timeframe: Timeframe,
    pub rows: usize,
    pub first_timestamp: NaiveDateTime,
    pub last_timestamp: NaiveDateTime,
    pub data_hash: String,
    pub source: String,
    pub written_at: NaiveDateTime,
}

/// How well a stored series covers a requested window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    NotStored,
    Covered,
    Partial {
        stored_first: NaiveDateTime,
        stored_last: NaiveDateTime,
    },
}

/// Store status for one label + timeframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesStatus {
    pub label: String,
    pub timeframe: Timeframe,
    pub stored: bool,
    pub rows: Option<usize>,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
}

/// The on-disk candle store.
pub struct CandleStore {
    data_dir: PathBuf,
}

impl CandleStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn series_dir(&self, label: &str, timeframe: Timeframe) -> PathBuf {
        self.data_dir.join(label).join(timeframe.label())
    }

    /// `{data_dir}/{LABEL}/{TF}/{LABEL}_{TF}.parquet`
    pub fn series_path(&self, label: &str, timeframe: Timeframe) -> PathBuf {
        self.series_dir(label, timeframe)
            .join(format!("{label}_{tf}.parquet", tf = timeframe.label()))
    }

    fn meta_path(&self, label: &str, timeframe: Timeframe) -> PathBuf {
        self.series_dir(label, timeframe).join("meta.json")
    }

    /// Write a cleaned series and its metadata sidecar.
    ///
    /// The caller is expected to have sanitized the frame; an empty frame is
    /// refused here because "nothing to persist" is decided one level up.
    pub fn write(
        &self,
        label: &str,
        timeframe: Timeframe,
        df: &DataFrame,
        source: &str,
    ) -> Result<(), DataError> {
        if df.height() == 0 {
            return Err(DataError::StoreError("no rows to store".into()));
        }
        CandleSchema::validate(df).map_err(|e| DataError::ValidationError(e.to_string()))?;

        let dir = self.series_dir(label, timeframe);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::StoreError(format!("failed to create {}: {e}", dir.display())))?;

        // Encode to a buffer so the content hash covers exactly what lands
        // on disk.
        let mut buf: Vec<u8> = Vec::new();
        ParquetWriter::new(&mut buf)
            .finish(&mut df.clone())
            .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
        let data_hash = blake3::hash(&buf).to_hex().to_string();

        let path = self.series_path(label, timeframe);
        let tmp_path = path.with_extension("parquet.tmp");
        fs::write(&tmp_path, &buf)
            .map_err(|e| DataError::StoreError(format!("write tmp file: {e}")))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::StoreError(format!("atomic rename failed: {e}"))
        })?;

        let (first, last) = timestamp_bounds(df)?;
        let meta = StoreMeta {
            label: label.to_string(),
            timeframe,
            rows: df.height(),
            first_timestamp: first,
            last_timestamp: last,
            data_hash,
            source: source.to_string(),
            written_at: chrono::Utc::now().naive_utc(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::StoreError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(label, timeframe), meta_json)
            .map_err(|e| DataError::StoreError(format!("meta write: {e}")))?;

        Ok(())
    }

    /// Load a stored series, validating its schema.
    ///
    /// A file that cannot be read or fails validation is renamed aside as
    /// `.quarantined` and its metadata sidecar is removed, so the series
    /// reads as not stored and the next pull rebuilds it.
    pub fn load(&self, label: &str, timeframe: Timeframe) -> Result<DataFrame, DataError> {
        let path = self.series_path(label, timeframe);
        if !path.exists() {
            return Err(DataError::NoStoredData {
                label: label.to_string(),
                timeframe,
            });
        }

        match read_and_validate(&path) {
            Ok(df) => Ok(df),
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                eprintln!(
                    "WARNING: quarantining unreadable store file {}: {e}",
                    path.display()
                );
                let _ = fs::rename(&path, &quarantine);
                // A surviving sidecar would keep reporting the series as
                // stored and let `covers` skip the rebuild
                let _ = fs::remove_file(self.meta_path(label, timeframe));
                Err(e)
            }
        }
    }

    /// Metadata sidecar for a series, if present.
    pub fn meta(&self, label: &str, timeframe: Timeframe) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path(label, timeframe)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Whether stored data covers a requested UTC window.
    ///
    /// The end of the window is compared with one interval of slack: the
    /// newest candle a provider can return opens one interval before `end`,
    /// so demanding `last_timestamp >= end` would never hold for `end = now`.
    pub fn covers(
        &self,
        label: &str,
        timeframe: Timeframe,
        start: DateTime<chrono::Utc>,
        end: DateTime<chrono::Utc>,
    ) -> Coverage {
        match self.meta(label, timeframe) {
            None => Coverage::NotStored,
            Some(meta) => {
                let slack = chrono::Duration::minutes(timeframe.interval_minutes());
                if meta.first_timestamp <= start.naive_utc()
                    && meta.last_timestamp >= (end - slack).naive_utc()
                {
                    Coverage::Covered
                } else {
                    Coverage::Partial {
                        stored_first: meta.first_timestamp,
                        stored_last: meta.last_timestamp,
                    }
                }
            }
        }
    }

    /// Store status for every label x timeframe pair.
    pub fn status(&self, labels: &[&str], timeframes: &[Timeframe]) -> Vec<SeriesStatus> {
        let mut statuses = Vec::with_capacity(labels.len() * timeframes.len());
        for label in labels {
            for &tf in timeframes {
                let meta = self.meta(label, tf);
                statuses.push(SeriesStatus {
                    label: label.to_string(),
                    timeframe: tf,
                    stored: meta.is_some(),
                    rows: meta.as_ref().map(|m| m.rows),
                    first_timestamp: meta.as_ref().map(|m| m.first_timestamp),
                    last_timestamp: meta.as_ref().map(|m| m.last_timestamp),
                });
            }
        }
        statuses
    }
}

fn read_and_validate(path: &Path) -> Result<DataFrame, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    CandleSchema::validate(&df).map_err(|e| DataError::ValidationError(e.to_string()))?;

    Ok(df)
}

/// First and last timestamps of a non-empty candle frame.
fn timestamp_bounds(df: &DataFrame) -> Result<(NaiveDateTime, NaiveDateTime), DataError> {
    let ts = df
        .column("timestamp")
        .and_then(|c| c.cast(&DataType::Int64))
        .map_err(|e| DataError::ParquetError(format!("timestamp column: {e}")))?;
    let ca = ts
        .i64()
        .map_err(|e| DataError::ParquetError(format!("timestamp column type: {e}")))?;

    let to_datetime = |ms: i64| {
        DateTime::from_timestamp_millis(ms)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| DataError::StoreError(format!("timestamp out of range: {ms}")))
    };

    let first = ca
        .min()
        .ok_or_else(|| DataError::StoreError("no timestamps in frame".into()))?;
    let last = ca
        .max()
        .ok_or_else(|| DataError::StoreError("no timestamps in frame".into()))?;

    Ok((to_datetime(first)?, to_datetime(last)?))
}
