//! # Gaussian Naive Bayes
//!
//! A self-contained, human-readable classifier artifact: per-class priors,
//! feature means and variances, stored as TOML. Posteriors are computed in log
//! space and normalized with log-sum-exp, so records far from every class mean
//! still produce a proper distribution.

use crate::label::RawLabel;
use crate::model::{Classifier, InferenceError};
use crate::record::FeatureRecord;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::PI;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the public, human-readable format of a trained
// Gaussian naive Bayes classifier when serialized to a TOML file.

/// Per-class parameters estimated during training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassParameters {
    /// The class label in the model's own encoding (e.g. `0`, `1`, `"B"`, `"M"`).
    pub label: RawLabel,
    /// Prior probability P(y = c).
    pub prior: f64,
    /// Feature means for this class, in `feature_names` order.
    pub means: Array1<f64>,
    /// Feature variances for this class, in `feature_names` order.
    /// Variance smoothing is assumed to be already folded in.
    pub variances: Array1<f64>,
}

/// The top-level, self-contained model artifact.
/// This is the structure that gets saved to and loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Defines the canonical feature order used by every parameter vector.
    pub feature_names: Vec<String>,
    pub classes: Vec<ClassParameters>,
}

/// Custom error type for model loading, saving, and artifact checks.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("The model declares no features.")]
    NoFeatures,
    #[error("Feature '{0}' is declared more than once in the model.")]
    DuplicateFeature(String),
    #[error("The model must have at least two classes, but it has {0}.")]
    TooFewClasses(usize),
    #[error("Class label {0} appears more than once in the model.")]
    DuplicateClass(RawLabel),
    #[error("Class {label} has {found} {field}, but the model declares {expected} features.")]
    DimensionMismatch {
        label: RawLabel,
        field: &'static str,
        found: usize,
        expected: usize,
    },
    #[error("Class {label} has an invalid prior ({prior}). Priors must be finite and positive.")]
    InvalidPrior { label: RawLabel, prior: f64 },
    #[error(
        "Class {label} has an invalid variance ({value}) for feature '{feature}'. Variances must be finite and positive."
    )]
    InvalidVariance {
        label: RawLabel,
        feature: String,
        value: f64,
    },
    #[error("Class {label} has a non-finite mean for feature '{feature}'.")]
    NonFiniteMean { label: RawLabel, feature: String },
}

impl GaussianNaiveBayes {
    /// Builds a model from explicit parameters, checking them the same way `load` does.
    pub fn new(
        feature_names: Vec<String>,
        classes: Vec<ClassParameters>,
    ) -> Result<Self, ModelError> {
        let model = Self {
            feature_names,
            classes,
        };
        model.check()?;
        Ok(model)
    }

    /// Saves the model to a file in a human-readable TOML format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// Loads a model from a TOML file and rejects malformed artifacts.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let toml_string = fs::read_to_string(path)?;
        let model: Self = toml::from_str(&toml_string)?;
        model.check()?;
        log::info!(
            "Loaded naive Bayes model from {}: {} features, {} classes",
            path.display(),
            model.feature_names.len(),
            model.classes.len()
        );
        Ok(model)
    }

    fn check(&self) -> Result<(), ModelError> {
        let n_features = self.feature_names.len();
        if n_features == 0 {
            return Err(ModelError::NoFeatures);
        }
        let mut seen_features = HashSet::new();
        for name in &self.feature_names {
            if !seen_features.insert(name.as_str()) {
                return Err(ModelError::DuplicateFeature(name.clone()));
            }
        }

        if self.classes.len() < 2 {
            return Err(ModelError::TooFewClasses(self.classes.len()));
        }

        let mut seen_labels = HashSet::new();
        for class in &self.classes {
            if !seen_labels.insert(&class.label) {
                return Err(ModelError::DuplicateClass(class.label.clone()));
            }
            if !(class.prior.is_finite() && class.prior > 0.0) {
                return Err(ModelError::InvalidPrior {
                    label: class.label.clone(),
                    prior: class.prior,
                });
            }
            for (field, len) in [
                ("means", class.means.len()),
                ("variances", class.variances.len()),
            ] {
                if len != n_features {
                    return Err(ModelError::DimensionMismatch {
                        label: class.label.clone(),
                        field,
                        found: len,
                        expected: n_features,
                    });
                }
            }
            for (i, name) in self.feature_names.iter().enumerate() {
                if !class.means[i].is_finite() {
                    return Err(ModelError::NonFiniteMean {
                        label: class.label.clone(),
                        feature: name.clone(),
                    });
                }
                let variance = class.variances[i];
                if !(variance.is_finite() && variance > 0.0) {
                    return Err(ModelError::InvalidVariance {
                        label: class.label.clone(),
                        feature: name.clone(),
                        value: variance,
                    });
                }
            }
        }
        Ok(())
    }

    /// Gathers the record's values in the model's canonical feature order.
    fn design_row(&self, record: &FeatureRecord) -> Result<Array1<f64>, InferenceError> {
        self.feature_names
            .iter()
            .map(|name| {
                record
                    .get(name)
                    .ok_or_else(|| InferenceError::FeatureMissing(name.clone()))
            })
            .collect::<Result<Vec<f64>, _>>()
            .map(Array1::from_vec)
    }

    /// Posterior P(y = c | x) for every class, in `classes` order.
    ///
    /// Uses the log-sum-exp trick so that very unlikely records do not
    /// underflow every class to zero.
    pub fn posterior(&self, record: &FeatureRecord) -> Result<Array1<f64>, InferenceError> {
        let x = self.design_row(record)?;

        let log_joint: Array1<f64> = self
            .classes
            .iter()
            .map(|class| {
                let log_likelihood: f64 = x
                    .iter()
                    .zip(class.means.iter())
                    .zip(class.variances.iter())
                    .map(|((&value, &mean), &variance)| {
                        let diff = value - mean;
                        -0.5 * (2.0 * PI * variance).ln() - diff * diff / (2.0 * variance)
                    })
                    .sum();
                class.prior.ln() + log_likelihood
            })
            .collect();

        let max_log = log_joint.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        if !max_log.is_finite() {
            return Err(InferenceError::MalformedProbabilities(format!(
                "log posterior is not finite ({max_log})"
            )));
        }
        let unnormalized = log_joint.mapv(|v| (v - max_log).exp());
        let total = unnormalized.sum();
        Ok(unnormalized / total)
    }
}

impl Classifier for GaussianNaiveBayes {
    fn predict(&self, record: &FeatureRecord) -> Result<RawLabel, InferenceError> {
        let posterior = self.posterior(record)?;
        let mut best = 0;
        for (i, &p) in posterior.iter().enumerate() {
            if p > posterior[best] {
                best = i;
            }
        }
        Ok(self.classes[best].label.clone())
    }

    fn predict_proba(
        &self,
        record: &FeatureRecord,
    ) -> Option<Result<Vec<(RawLabel, f64)>, InferenceError>> {
        Some(self.posterior(record).map(|posterior| {
            self.classes
                .iter()
                .zip(posterior.iter())
                .map(|(class, &p)| (class.label.clone(), p))
                .collect()
        }))
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }
}
