//! # Gate Configuration
//!
//! The range table and the label decode table are loaded once at process start
//! from a TOML file and fully checked before the first request:
//!
//! ```toml
//! model = "model.toml"
//! label_encoding = "integer"
//!
//! [ranges.radius_mean]
//! min = 6.0
//! max = 30.0
//! ```
//!
//! An explicit `[[labels]]` list takes precedence over `label_encoding`. A
//! relative `model` path is resolved against the directory holding the
//! configuration file, so the pair can be moved together.

use crate::label::{LabelEntry, LabelError, LabelMap};
use crate::ranges::{FeatureRange, RangeError, RangeTable};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Invalid range table: {0}")]
    Range(#[from] RangeError),
    #[error("Invalid label table: {0}")]
    Label(#[from] LabelError),
}

/// Built-in decode tables for the two encodings seen in practice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelEncoding {
    /// `0 -> Benign`, `1 -> Malignant`
    #[default]
    Integer,
    /// `'B' -> Benign`, `'M' -> Malignant`
    Letter,
}

impl LabelEncoding {
    pub fn label_map(self) -> LabelMap {
        match self {
            LabelEncoding::Integer => LabelMap::binary_integer(),
            LabelEncoding::Letter => LabelMap::letter_code(),
        }
    }
}

/// The on-disk shape, before any checks.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGateConfig {
    model: Option<String>,
    #[serde(default)]
    label_encoding: LabelEncoding,
    #[serde(default)]
    labels: Vec<LabelEntry>,
    ranges: BTreeMap<String, FeatureRange>,
}

/// A checked configuration, ready to build an `InferenceGate`.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Default model artifact path, if the file names one.
    pub model: Option<PathBuf>,
    pub ranges: RangeTable,
    pub labels: LabelMap,
}

impl GateConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let toml_string = fs::read_to_string(path)?;
        let mut config = Self::from_toml(&toml_string)?;

        // Joining an absolute path replaces the base, so only relative paths move.
        let config_dir = path.parent().unwrap_or_else(|| Path::new(""));
        config.model = config.model.map(|model| config_dir.join(model));

        log::info!(
            "Loaded gate configuration from {}: {} feature ranges",
            path.display(),
            config.ranges.len()
        );
        Ok(config)
    }

    pub fn from_toml(toml_string: &str) -> Result<Self, ConfigError> {
        let raw: RawGateConfig = toml::from_str(toml_string)?;

        let ranges = RangeTable::new(raw.ranges)?;
        let labels = if raw.labels.is_empty() {
            log::debug!("No explicit label table; using {:?} encoding", raw.label_encoding);
            raw.label_encoding.label_map()
        } else {
            LabelMap::from_entries(&raw.labels)?
        };

        Ok(Self {
            model: raw.model.map(PathBuf::from),
            ranges,
            labels,
        })
    }
}
