//! Symbol configuration — the instrument list to download.
//!
//! Stored as JSON: `{"symbols": [{"instrument": "EUR/USD", "label": "EURUSD"}]}`.
//! The instrument is what the provider API understands; the label names
//! directories and files on disk. A malformed config is a fatal startup
//! error, never something to limp past.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// One instrument to download, with its on-disk label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub instrument: String,
    pub label: String,
}

/// The complete symbol configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbols: Vec<SymbolSpec>,
}

impl SymbolConfig {
    /// Load and validate a symbol config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, SymbolConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| SymbolConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a symbol config from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, SymbolConfigError> {
        let config: SymbolConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Labels become paths, so they must be non-empty and unique.
    fn validate(&self) -> Result<(), SymbolConfigError> {
        if self.symbols.is_empty() {
            return Err(SymbolConfigError::Empty);
        }

        let mut seen = BTreeSet::new();
        for spec in &self.symbols {
            if spec.label.is_empty() || spec.instrument.is_empty() {
                return Err(SymbolConfigError::BlankEntry);
            }
            if !seen.insert(spec.label.as_str()) {
                return Err(SymbolConfigError::DuplicateLabel(spec.label.clone()));
            }
        }
        Ok(())
    }

    /// All on-disk labels, in config order.
    pub fn labels(&self) -> Vec<&str> {
        self.symbols.iter().map(|s| s.label.as_str()).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SymbolConfigError {
    #[error("failed to read symbol config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse symbol config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("symbol config contains no symbols")]
    Empty,

    #[error("symbol config entry has an empty instrument or label")]
    BlankEntry,

    #[error("duplicate symbol label '{0}' — labels name output directories")]
    DuplicateLabel(String),
}
