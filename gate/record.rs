//! # Feature Records
//!
//! A `FeatureRecord` is the single-row input handed to the gate: an ordered
//! list of named numeric measurements for one tumor sample. Construction is the
//! only place values are checked for shape; once built, a record is read-only.

use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while assembling a `FeatureRecord`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("A feature record must contain at least one feature.")]
    Empty,
    #[error("Feature '{0}' appears more than once in the record.")]
    DuplicateFeature(String),
    #[error("Feature '{feature}' has a non-finite value ({value}). All measurements must be finite.")]
    NonFiniteValue { feature: String, value: f64 },
}

/// One named, finite measurement per feature, in the order supplied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    entries: Vec<(String, f64)>,
}

impl FeatureRecord {
    /// Builds a record, rejecting empty input, repeated names and non-finite values.
    pub fn new<I, S>(entries: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let entries: Vec<(String, f64)> = entries
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();

        if entries.is_empty() {
            return Err(RecordError::Empty);
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for (name, value) in &entries {
            if !seen.insert(name.as_str()) {
                return Err(RecordError::DuplicateFeature(name.clone()));
            }
            // NaN compares false against both bounds, so it must never reach the range check.
            if !value.is_finite() {
                return Err(RecordError::NonFiniteValue {
                    feature: name.clone(),
                    value: *value,
                });
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(feature, _)| feature == name)
            .map(|(_, value)| *value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
