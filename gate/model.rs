//! # Classifier Capability
//!
//! The gate never depends on a concrete model. Anything that can turn a
//! `FeatureRecord` into a raw class label implements `Classifier`; the bundled
//! `GaussianNaiveBayes` artifact is one such implementation.

use crate::label::RawLabel;
use crate::record::FeatureRecord;
use thiserror::Error;

/// Failure raised by a classifier while it was being asked for a decision.
///
/// This is distinct from the gate declining to ask: a skipped request never
/// produces an `InferenceError`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("The model is unavailable: {0}")]
    Unavailable(String),
    #[error("The model requires feature '{0}', which the record does not provide.")]
    FeatureMissing(String),
    #[error("The model returned a malformed probability distribution: {0}")]
    MalformedProbabilities(String),
}

/// The capability the gate consumes: a trained binary classifier.
///
/// `predict_proba` is optional. Models without a probability capability keep
/// the default, and the gate reports no probabilities for them rather than
/// inventing any. When implemented, each probability is tagged with the raw
/// class it belongs to, so the caller never depends on the model's column order.
pub trait Classifier {
    fn predict(&self, record: &FeatureRecord) -> Result<RawLabel, InferenceError>;

    fn predict_proba(
        &self,
        _: &FeatureRecord,
    ) -> Option<Result<Vec<(RawLabel, f64)>, InferenceError>> {
        None
    }

    /// The features the model was trained on, if it declares them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn predict(&self, record: &FeatureRecord) -> Result<RawLabel, InferenceError> {
        (**self).predict(record)
    }

    fn predict_proba(
        &self,
        record: &FeatureRecord,
    ) -> Option<Result<Vec<(RawLabel, f64)>, InferenceError>> {
        (**self).predict_proba(record)
    }

    fn feature_names(&self) -> Option<&[String]> {
        (**self).feature_names()
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn predict(&self, record: &FeatureRecord) -> Result<RawLabel, InferenceError> {
        (**self).predict(record)
    }

    fn predict_proba(
        &self,
        record: &FeatureRecord,
    ) -> Option<Result<Vec<(RawLabel, f64)>, InferenceError>> {
        (**self).predict_proba(record)
    }

    fn feature_names(&self) -> Option<&[String]> {
        (**self).feature_names()
    }
}
