//! # Canonical Labels
//!
//! Classifiers report their decision in whatever encoding they were trained
//! with: integers `0`/`1` for some artifacts, letters `'B'`/`'M'` for others.
//! Every integration supplies a `LabelMap` that decodes its native labels into
//! the two-case `Diagnosis`. Nothing else in the crate compares raw labels.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The canonical two-class outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Diagnosis {
    #[serde(alias = "Benign")]
    Benign,
    #[serde(alias = "Malignant")]
    Malignant,
}

impl Diagnosis {
    pub const ALL: [Diagnosis; 2] = [Diagnosis::Benign, Diagnosis::Malignant];

    pub fn name(self) -> &'static str {
        match self {
            Diagnosis::Benign => "Benign",
            Diagnosis::Malignant => "Malignant",
        }
    }

    /// The sentence shown to a user for this outcome.
    pub fn headline(self) -> &'static str {
        match self {
            Diagnosis::Benign => "No Cancer (Benign)",
            Diagnosis::Malignant => "Cancer Detected (Malignant)",
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A class label in the model's own encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLabel {
    Integer(i64),
    Text(String),
}

impl fmt::Display for RawLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawLabel::Integer(value) => write!(f, "{value}"),
            RawLabel::Text(value) => write!(f, "'{value}'"),
        }
    }
}

impl From<i64> for RawLabel {
    fn from(value: i64) -> Self {
        RawLabel::Integer(value)
    }
}

impl From<&str> for RawLabel {
    fn from(value: &str) -> Self {
        RawLabel::Text(value.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LabelError {
    #[error("Raw label {0} is mapped more than once in the label table.")]
    DuplicateRawLabel(RawLabel),
    #[error("The label table has no raw label that decodes to {0}.")]
    MissingDiagnosis(Diagnosis),
}

/// One row of a decode table as written in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub raw: RawLabel,
    pub diagnosis: Diagnosis,
}

/// Decode table from a model's raw labels to `Diagnosis`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    table: AHashMap<RawLabel, Diagnosis>,
}

impl LabelMap {
    /// Builds a decode table. Each raw label may appear once, and both
    /// diagnoses must be reachable.
    pub fn new<I>(entries: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = (RawLabel, Diagnosis)>,
    {
        let mut table = AHashMap::new();
        for (raw, diagnosis) in entries {
            if table.contains_key(&raw) {
                return Err(LabelError::DuplicateRawLabel(raw));
            }
            table.insert(raw, diagnosis);
        }

        for diagnosis in Diagnosis::ALL {
            if !table.values().any(|mapped| *mapped == diagnosis) {
                return Err(LabelError::MissingDiagnosis(diagnosis));
            }
        }

        Ok(Self { table })
    }

    pub fn from_entries(entries: &[LabelEntry]) -> Result<Self, LabelError> {
        Self::new(
            entries
                .iter()
                .map(|entry| (entry.raw.clone(), entry.diagnosis)),
        )
    }

    /// `0 -> Benign`, `1 -> Malignant`.
    pub fn binary_integer() -> Self {
        Self {
            table: [
                (RawLabel::Integer(0), Diagnosis::Benign),
                (RawLabel::Integer(1), Diagnosis::Malignant),
            ]
            .into_iter()
            .collect(),
        }
    }

    /// `'B' -> Benign`, `'M' -> Malignant`.
    pub fn letter_code() -> Self {
        Self {
            table: [
                (RawLabel::from("B"), Diagnosis::Benign),
                (RawLabel::from("M"), Diagnosis::Malignant),
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Returns `None` for labels outside the table; there is no default class.
    pub fn decode(&self, raw: &RawLabel) -> Option<Diagnosis> {
        self.table.get(raw).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
