//! # Inference Gate
//!
//! The gate stands between a feature record and a trained classifier. It
//! validates the record against the trusted range table first, and only a
//! record that is fully in range is ever shown to the model:
//!
//! ```text
//! Unvalidated -> InRange    -> Predicted | InferenceFailure
//!             -> OutOfRange -> Skipped
//! ```
//!
//! "We chose not to ask the model" (`PredictionOutcome::Skipped`) and "we asked
//! and it failed" (`GateError::InferenceFailure`) are kept strictly apart.

use crate::label::{Diagnosis, LabelMap, RawLabel};
use ahash::AHashSet;
use crate::model::{Classifier, InferenceError};
use crate::ranges::RangeTable;
use crate::record::FeatureRecord;
use crate::validate::{OutOfRange, SchemaMismatch, ValidationResult, check_schema, validate};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

/// Canonical probability masses always sum to 1 within this tolerance.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// A raw distribution whose total drifts further than this from 1 is rejected
/// instead of being renormalized.
pub const MAX_PROBABILITY_DRIFT: f64 = 1e-3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatch),
    #[error(
        "The model returned raw label {0}, which has no entry in the label table. Refusing to guess a diagnosis."
    )]
    UnmappedLabel(RawLabel),
    #[error(
        "The model's training features do not match the range table. Not trained on: [{}]. Trained on but not in range table: [{}].",
        .untrained.join(", "),
        .unranged.join(", ")
    )]
    ModelSchemaMismatch {
        /// Features the range table defines but the model was not trained on, sorted.
        untrained: Vec<String>,
        /// Features the model was trained on but the range table does not bound.
        unranged: Vec<String>,
    },
    #[error("Inference failed: {0}")]
    InferenceFailure(#[from] InferenceError),
}

impl GateError {
    /// Schema and label errors repeat for every record of a misconfigured run;
    /// only an `InferenceFailure` is specific to the record being scored.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GateError::InferenceFailure(_))
    }
}

/// Class probabilities in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassProbabilities {
    pub benign: f64,
    pub malignant: f64,
}

impl ClassProbabilities {
    pub fn get(&self, diagnosis: Diagnosis) -> f64 {
        match diagnosis {
            Diagnosis::Benign => self.benign,
            Diagnosis::Malignant => self.malignant,
        }
    }

    /// `(Benign, p0)` then `(Malignant, p1)`.
    pub fn iter(&self) -> impl Iterator<Item = (Diagnosis, f64)> + '_ {
        Diagnosis::ALL.into_iter().map(|d| (d, self.get(d)))
    }
}

/// The result of a single gated request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionOutcome {
    /// The record fell outside the trusted region; the model was not called.
    Skipped { reason: OutOfRange },
    /// The model was called. `probability` is `None` when the model has no
    /// probability capability.
    Predicted {
        label: Diagnosis,
        probability: Option<ClassProbabilities>,
    },
}

impl PredictionOutcome {
    pub fn label(&self) -> Option<Diagnosis> {
        match self {
            PredictionOutcome::Predicted { label, .. } => Some(*label),
            PredictionOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PredictionOutcome::Skipped { .. })
    }
}

/// Validates `record` and, only if it is in range, asks `model` for a decision.
pub fn gated_predict<M: Classifier + ?Sized>(
    record: &FeatureRecord,
    ranges: &RangeTable,
    model: &M,
    labels: &LabelMap,
) -> Result<PredictionOutcome, GateError> {
    match validate(record, ranges)? {
        ValidationResult::OutOfRange(reason) => {
            log::debug!("Skipping inference, out of range: {reason}");
            Ok(PredictionOutcome::Skipped { reason })
        }
        ValidationResult::InRange => {
            let raw = model.predict(record)?;
            let label = labels
                .decode(&raw)
                .ok_or(GateError::UnmappedLabel(raw))?;

            let probability = match model.predict_proba(record) {
                Some(distribution) => Some(normalize_probabilities(&distribution?, labels)?),
                None => None,
            };

            if let Some(probability) = &probability {
                let top = if probability.malignant > probability.benign {
                    Diagnosis::Malignant
                } else {
                    Diagnosis::Benign
                };
                if top != label && probability.benign != probability.malignant {
                    log::warn!(
                        "Model label {label} disagrees with its most probable class {top} ({:.3} vs {:.3})",
                        probability.get(label),
                        probability.get(top)
                    );
                }
            }

            Ok(PredictionOutcome::Predicted { label, probability })
        }
    }
}

/// Decodes a class-tagged raw distribution into canonical `{Benign, Malignant}`
/// masses that sum to 1.
///
/// Each raw class may appear once, and both diagnoses must receive at least one
/// column; anything else is a malformed distribution.
pub fn normalize_probabilities(
    distribution: &[(RawLabel, f64)],
    labels: &LabelMap,
) -> Result<ClassProbabilities, GateError> {
    let malformed = |detail: String| GateError::from(InferenceError::MalformedProbabilities(detail));

    let mut seen = AHashSet::with_capacity(distribution.len());
    let mut benign = 0.0;
    let mut malignant = 0.0;
    let mut columns = [0usize; 2];

    for (raw, p) in distribution {
        if !seen.insert(raw) {
            return Err(malformed(format!("class {raw} is reported more than once")));
        }
        if !p.is_finite() || *p < 0.0 {
            return Err(malformed(format!("class {raw} has probability {p}")));
        }
        match labels.decode(raw) {
            Some(Diagnosis::Benign) => {
                benign += p;
                columns[0] += 1;
            }
            Some(Diagnosis::Malignant) => {
                malignant += p;
                columns[1] += 1;
            }
            None => return Err(GateError::UnmappedLabel(raw.clone())),
        }
    }

    for (diagnosis, count) in Diagnosis::ALL.into_iter().zip(columns) {
        if count == 0 {
            return Err(malformed(format!("no class decodes to {diagnosis}")));
        }
    }

    let total = benign + malignant;
    if (total - 1.0).abs() > MAX_PROBABILITY_DRIFT {
        return Err(malformed(format!("probabilities sum to {total}, expected 1")));
    }

    Ok(ClassProbabilities {
        benign: benign / total,
        malignant: malignant / total,
    })
}

/// A classifier bound to the range table and label map it is trusted with.
///
/// The model is an injected dependency: whoever bootstraps the process loads it
/// once and hands it over, and the gate only ever reads it.
#[derive(Debug)]
pub struct InferenceGate<M> {
    model: M,
    ranges: RangeTable,
    labels: LabelMap,
}

impl<M: Classifier> InferenceGate<M> {
    /// Binds the parts together. If the model declares its training features,
    /// they must match the range table exactly.
    pub fn new(model: M, ranges: RangeTable, labels: LabelMap) -> Result<Self, GateError> {
        if let Some(model_features) = model.feature_names() {
            let model_features: Vec<&str> = model_features.iter().map(String::as_str).collect();
            let table_features: Vec<&str> = ranges.features().collect();
            if let Err(mismatch) = check_schema(&model_features, &table_features) {
                return Err(GateError::ModelSchemaMismatch {
                    untrained: mismatch.missing,
                    unranged: mismatch.unexpected,
                });
            }
        }
        log::info!(
            "Inference gate ready: {} trusted feature ranges, {} raw labels",
            ranges.len(),
            labels.len()
        );
        Ok(Self {
            model,
            ranges,
            labels,
        })
    }

    pub fn gated_predict(&self, record: &FeatureRecord) -> Result<PredictionOutcome, GateError> {
        gated_predict(record, &self.ranges, &self.model, &self.labels)
    }

    /// Validation only; never touches the model.
    pub fn validate(&self, record: &FeatureRecord) -> Result<ValidationResult, SchemaMismatch> {
        validate(record, &self.ranges)
    }

    pub fn ranges(&self) -> &RangeTable {
        &self.ranges
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: Classifier + Sync> InferenceGate<M> {
    /// Gates a batch of independent records in parallel. Results are returned
    /// in input order, one per record.
    pub fn gated_predict_many(
        &self,
        records: &[FeatureRecord],
    ) -> Vec<Result<PredictionOutcome, GateError>> {
        records
            .par_iter()
            .map(|record| self.gated_predict(record))
            .collect()
    }
}

/// Tally of a batch of gated requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateSummary {
    pub benign: usize,
    pub malignant: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl GateSummary {
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a Result<PredictionOutcome, GateError>>,
    {
        let mut summary = Self::default();
        for result in results {
            match result {
                Ok(PredictionOutcome::Predicted {
                    label: Diagnosis::Benign,
                    ..
                }) => summary.benign += 1,
                Ok(PredictionOutcome::Predicted {
                    label: Diagnosis::Malignant,
                    ..
                }) => summary.malignant += 1,
                Ok(PredictionOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.benign + self.malignant + self.skipped + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn normalization_reorders_by_label() {
        let labels = LabelMap::letter_code();
        let distribution = vec![(RawLabel::from("M"), 0.8), (RawLabel::from("B"), 0.2)];
        let probability = normalize_probabilities(&distribution, &labels).unwrap();
        assert_abs_diff_eq!(probability.benign, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(probability.malignant, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn normalization_absorbs_rounding_drift() {
        let labels = LabelMap::binary_integer();
        let distribution = vec![(RawLabel::Integer(0), 0.3333), (RawLabel::Integer(1), 0.6666)];
        let probability = normalize_probabilities(&distribution, &labels).unwrap();
        assert_abs_diff_eq!(
            probability.benign + probability.malignant,
            1.0,
            epsilon = PROBABILITY_TOLERANCE
        );
    }

    #[test]
    fn normalization_rejects_non_distributions() {
        let labels = LabelMap::binary_integer();

        let negative = vec![(RawLabel::Integer(0), -0.1), (RawLabel::Integer(1), 1.1)];
        assert!(matches!(
            normalize_probabilities(&negative, &labels),
            Err(GateError::InferenceFailure(InferenceError::MalformedProbabilities(_)))
        ));

        let scores = vec![(RawLabel::Integer(0), 2.0), (RawLabel::Integer(1), 3.0)];
        assert!(matches!(
            normalize_probabilities(&scores, &labels),
            Err(GateError::InferenceFailure(InferenceError::MalformedProbabilities(_)))
        ));

        let unmapped = vec![(RawLabel::Integer(0), 0.5), (RawLabel::Integer(7), 0.5)];
        assert_eq!(
            normalize_probabilities(&unmapped, &labels),
            Err(GateError::UnmappedLabel(RawLabel::Integer(7)))
        );
    }

    #[test]
    fn normalization_requires_one_column_per_class() {
        let labels = LabelMap::binary_integer();

        let repeated = vec![(RawLabel::Integer(0), 0.5), (RawLabel::Integer(0), 0.5)];
        assert!(matches!(
            normalize_probabilities(&repeated, &labels),
            Err(GateError::InferenceFailure(InferenceError::MalformedProbabilities(_)))
        ));

        let single = vec![(RawLabel::Integer(1), 1.0)];
        assert!(matches!(
            normalize_probabilities(&single, &labels),
            Err(GateError::InferenceFailure(InferenceError::MalformedProbabilities(_)))
        ));
    }

    #[test]
    fn normalization_accepts_several_raw_labels_per_diagnosis() {
        let labels = LabelMap::new([
            (RawLabel::Integer(0), Diagnosis::Benign),
            (RawLabel::Integer(2), Diagnosis::Benign),
            (RawLabel::Integer(1), Diagnosis::Malignant),
        ])
        .unwrap();
        let distribution = vec![
            (RawLabel::Integer(0), 0.25),
            (RawLabel::Integer(2), 0.25),
            (RawLabel::Integer(1), 0.5),
        ];
        let probability = normalize_probabilities(&distribution, &labels).unwrap();
        assert_abs_diff_eq!(probability.benign, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(probability.malignant, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn only_inference_failures_are_per_record() {
        let failure = GateError::InferenceFailure(InferenceError::Unavailable("offline".to_string()));
        assert!(!failure.is_fatal());
        assert!(GateError::UnmappedLabel(RawLabel::Integer(3)).is_fatal());
        assert!(
            GateError::SchemaMismatch(SchemaMismatch {
                missing: vec!["radius_mean".to_string()],
                unexpected: Vec::new(),
            })
            .is_fatal()
        );
    }

    #[test]
    fn summary_counts_each_kind() {
        let results = vec![
            Ok(PredictionOutcome::Predicted {
                label: Diagnosis::Benign,
                probability: None,
            }),
            Ok(PredictionOutcome::Predicted {
                label: Diagnosis::Malignant,
                probability: None,
            }),
            Ok(PredictionOutcome::Skipped {
                reason: OutOfRange {
                    violations: Vec::new(),
                },
            }),
            Err(GateError::InferenceFailure(InferenceError::Unavailable(
                "offline".to_string(),
            ))),
        ];
        let summary = GateSummary::from_results(&results);
        assert_eq!(
            summary,
            GateSummary {
                benign: 1,
                malignant: 1,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(summary.total(), 4);
    }
}
