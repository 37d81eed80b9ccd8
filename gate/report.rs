//! Tab-separated reporting of gated predictions.

use crate::gate::{GateError, PredictionOutcome};
use std::path::Path;
use thiserror::Error;

pub const REPORT_HEADER: [&str; 6] = [
    "sample_id",
    "status",
    "diagnosis",
    "prob_benign",
    "prob_malignant",
    "violations",
];

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Error writing report: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Report has {ids} sample IDs but {results} results.")]
    LengthMismatch { ids: usize, results: usize },
}

/// Renders one result as the report's columns after `sample_id`.
///
/// Failed requests keep the error message in the last column so a batch run
/// never hides which rows the model could not score.
pub fn report_fields(result: &Result<PredictionOutcome, GateError>) -> [String; 5] {
    match result {
        Ok(PredictionOutcome::Predicted { label, probability }) => {
            let (benign, malignant) = match probability {
                Some(p) => (format!("{:.6}", p.benign), format!("{:.6}", p.malignant)),
                None => ("NA".to_string(), "NA".to_string()),
            };
            [
                "predicted".to_string(),
                label.name().to_string(),
                benign,
                malignant,
                String::new(),
            ]
        }
        Ok(PredictionOutcome::Skipped { reason }) => [
            "skipped".to_string(),
            "NA".to_string(),
            "NA".to_string(),
            "NA".to_string(),
            reason.to_string(),
        ],
        Err(err) => [
            "failed".to_string(),
            "NA".to_string(),
            "NA".to_string(),
            "NA".to_string(),
            err.to_string(),
        ],
    }
}

pub fn write_outcomes(
    path: impl AsRef<Path>,
    sample_ids: &[String],
    results: &[Result<PredictionOutcome, GateError>],
) -> Result<(), ReportError> {
    if sample_ids.len() != results.len() {
        return Err(ReportError::LengthMismatch {
            ids: sample_ids.len(),
            results: results.len(),
        });
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path.as_ref())?;
    writer.write_record(REPORT_HEADER)?;

    for (sample_id, result) in sample_ids.iter().zip(results) {
        let [status, diagnosis, benign, malignant, violations] = report_fields(result);
        writer.write_record([
            sample_id.as_str(),
            status.as_str(),
            diagnosis.as_str(),
            benign.as_str(),
            malignant.as_str(),
            violations.as_str(),
        ])?;
    }

    writer.flush()?;
    log::info!(
        "Wrote {} outcomes to {}",
        results.len(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::ClassProbabilities;
    use crate::label::Diagnosis;
    use crate::model::InferenceError;
    use crate::validate::{Bound, OutOfRange, Violation};
    use tempfile::tempdir;

    #[test]
    fn writes_one_row_per_outcome() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("predictions.tsv");

        let ids = vec!["p1".to_string(), "p2".to_string(), "p3".to_string()];
        let results = vec![
            Ok(PredictionOutcome::Predicted {
                label: Diagnosis::Malignant,
                probability: Some(ClassProbabilities {
                    benign: 0.25,
                    malignant: 0.75,
                }),
            }),
            Ok(PredictionOutcome::Skipped {
                reason: OutOfRange {
                    violations: vec![Violation {
                        feature: "radius_mean".to_string(),
                        observed: 5.9,
                        bound: Bound::BelowMin,
                        limit: 6.0,
                    }],
                },
            }),
            Err(GateError::InferenceFailure(InferenceError::Unavailable(
                "model offline".to_string(),
            ))),
        ];

        write_outcomes(&path, &ids, &results).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "sample_id\tstatus\tdiagnosis\tprob_benign\tprob_malignant\tviolations"
        );
        assert_eq!(lines[1], "p1\tpredicted\tMalignant\t0.250000\t0.750000\t");
        assert_eq!(lines[2], "p2\tskipped\tNA\tNA\tNA\tradius_mean=5.9<6");
        assert!(lines[3].starts_with("p3\tfailed\tNA\tNA\tNA\t"));
        assert!(lines[3].contains("model offline"));
    }

    #[test]
    fn missing_probabilities_render_as_na() {
        let fields = report_fields(&Ok(PredictionOutcome::Predicted {
            label: Diagnosis::Benign,
            probability: None,
        }));
        assert_eq!(fields[1], "Benign");
        assert_eq!(fields[2], "NA");
        assert_eq!(fields[3], "NA");
    }

    #[test]
    fn refuses_mismatched_lengths() {
        let dir = tempdir().unwrap();
        let err = write_outcomes(
            dir.path().join("out.tsv"),
            &["p1".to_string()],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::LengthMismatch { ids: 1, results: 0 }));
    }
}
