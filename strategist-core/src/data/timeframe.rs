//! Candle timeframes and their download windows.
//!
//! Each timeframe pairs a folder label with a lookback window: intraday
//! minutes get six months, sub-daily hours get a year, and the coarse
//! timeframes get five years.

use serde::{Deserialize, Serialize};
use std::fmt;

const SIX_MONTHS_DAYS: i64 = 183;
const ONE_YEAR_DAYS: i64 = 365;
const FIVE_YEARS_DAYS: i64 = 1826;

/// Fixed candle interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1min")]
    Min1,
    #[serde(rename = "5min")]
    Min5,
    #[serde(rename = "15min")]
    Min15,
    #[serde(rename = "30min")]
    Min30,
    #[serde(rename = "1hr")]
    Hour1,
    #[serde(rename = "4hr")]
    Hour4,
    #[serde(rename = "1day")]
    Day1,
}

impl Timeframe {
    /// All timeframes, in ascending interval order. This is the default
    /// download set.
    pub const ALL: [Timeframe; 7] = [
        Timeframe::Min1,
        Timeframe::Min5,
        Timeframe::Min15,
        Timeframe::Min30,
        Timeframe::Hour1,
        Timeframe::Hour4,
        Timeframe::Day1,
    ];

    /// Folder label used in store paths and file names.
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Min1 => "1min",
            Timeframe::Min5 => "5min",
            Timeframe::Min15 => "15min",
            Timeframe::Min30 => "30min",
            Timeframe::Hour1 => "1hr",
            Timeframe::Hour4 => "4hr",
            Timeframe::Day1 => "1day",
        }
    }

    /// Interval code the provider API expects.
    pub fn interval_code(&self) -> &'static str {
        match self {
            Timeframe::Min1 => "1MIN",
            Timeframe::Min5 => "5MIN",
            Timeframe::Min15 => "15MIN",
            Timeframe::Min30 => "30MIN",
            Timeframe::Hour1 => "1HOUR",
            Timeframe::Hour4 => "4HOUR",
            Timeframe::Day1 => "1DAY",
        }
    }

    /// Candle interval length in minutes.
    pub fn interval_minutes(&self) -> i64 {
        match self {
            Timeframe::Min1 => 1,
            Timeframe::Min5 => 5,
            Timeframe::Min15 => 15,
            Timeframe::Min30 => 30,
            Timeframe::Hour1 => 60,
            Timeframe::Hour4 => 240,
            Timeframe::Day1 => 1440,
        }
    }

    /// How far back to request data for this timeframe.
    pub fn lookback_days(&self) -> i64 {
        match self {
            Timeframe::Min1 | Timeframe::Min5 => SIX_MONTHS_DAYS,
            Timeframe::Min15 | Timeframe::Min30 | Timeframe::Hour1 => ONE_YEAR_DAYS,
            Timeframe::Hour4 | Timeframe::Day1 => FIVE_YEARS_DAYS,
        }
    }

    /// Parse a folder label back into a timeframe.
    pub fn from_label(label: &str) -> Option<Timeframe> {
        Timeframe::ALL.into_iter().find(|tf| tf.label() == label)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
