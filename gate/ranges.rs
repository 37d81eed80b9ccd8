//! # Trusted Feature Ranges
//!
//! The `RangeTable` approximates the support region of a trained classifier by
//! one inclusive `[min, max]` interval per feature. The intervals come from
//! training-data statistics computed elsewhere; this module only checks that the
//! supplied table is well formed. A malformed table is a configuration error and
//! is rejected when the table is built, before any request is served.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    #[error("The range table is empty. At least one feature interval is required.")]
    Empty,
    #[error("Range for feature '{feature}' is inverted: min ({min}) is greater than max ({max}).")]
    InvertedBounds { feature: String, min: f64, max: f64 },
    #[error("Range for feature '{feature}' has a non-finite bound ({min}, {max}).")]
    NonFiniteBound { feature: String, min: f64, max: f64 },
    #[error("Feature '{0}' is listed more than once in the range table.")]
    DuplicateFeature(String),
}

/// An inclusive interval of trusted values for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub min: f64,
    pub max: f64,
}

impl FeatureRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Both ends are inclusive.
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Per-feature trusted intervals, keyed and iterated by feature name.
///
/// Immutable once built, so a single table can be shared across every
/// concurrent validation without locking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeTable {
    ranges: BTreeMap<String, FeatureRange>,
}

impl RangeTable {
    pub fn new<I, S>(entries: I) -> Result<Self, RangeError>
    where
        I: IntoIterator<Item = (S, FeatureRange)>,
        S: Into<String>,
    {
        let mut ranges = BTreeMap::new();
        for (name, range) in entries {
            let name = name.into();
            check_range(&name, range)?;
            if ranges.insert(name.clone(), range).is_some() {
                return Err(RangeError::DuplicateFeature(name));
            }
        }

        if ranges.is_empty() {
            return Err(RangeError::Empty);
        }

        log::debug!("Built range table over {} features", ranges.len());
        Ok(Self { ranges })
    }

    pub fn get(&self, feature: &str) -> Option<&FeatureRange> {
        self.ranges.get(feature)
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.ranges.contains_key(feature)
    }

    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.ranges.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureRange)> {
        self.ranges.iter().map(|(name, range)| (name.as_str(), range))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

fn check_range(feature: &str, range: FeatureRange) -> Result<(), RangeError> {
    if !range.min.is_finite() || !range.max.is_finite() {
        return Err(RangeError::NonFiniteBound {
            feature: feature.to_string(),
            min: range.min,
            max: range.max,
        });
    }
    if range.min > range.max {
        return Err(RangeError::InvertedBounds {
            feature: feature.to_string(),
            min: range.min,
            max: range.max,
        });
    }
    Ok(())
}
