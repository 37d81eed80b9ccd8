//! # Record Loading
//!
//! Reads batches of feature records from tab-separated files. The header row
//! names the features; every column except the optional `sample_id` column is
//! parsed as a finite number. Failures are assumed to be user-input errors and
//! `DataError` points at the offending column and row.

use crate::record::{FeatureRecord, RecordError};
use std::path::Path;
use thiserror::Error;

/// Name of the optional identifier column.
pub const SAMPLE_ID_COLUMN: &str = "sample_id";

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Error reading tab-separated input: {0}")]
    CsvError(#[from] csv::Error),
    #[error("The input file has no feature columns. Expected a header naming at least one feature.")]
    NoFeatureColumns,
    #[error("The input file contains no data rows.")]
    NoRows,
    #[error("Column '{column}' on data row {row} contains '{value}', which is not a number.")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("Data row {row} is not a valid feature record: {source}")]
    InvalidRecord {
        row: usize,
        #[source]
        source: RecordError,
    },
}

/// Feature records together with their identifiers, in file order.
#[derive(Debug)]
pub struct RecordBatch {
    pub sample_ids: Vec<String>,
    pub records: Vec<FeatureRecord>,
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Feature names from the header, in column order. Every record shares them.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.records.first().into_iter().flat_map(FeatureRecord::names)
    }
}

/// Loads every row of a TSV file as a `FeatureRecord`.
///
/// If there is no `sample_id` column, sequential 1-based IDs are generated.
pub fn load_records(path: impl AsRef<Path>) -> Result<RecordBatch, DataError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let id_column = headers.iter().position(|h| h == SAMPLE_ID_COLUMN);
    let feature_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != id_column)
        .map(|(i, name)| (i, name.to_string()))
        .collect();

    if feature_columns.is_empty() {
        return Err(DataError::NoFeatureColumns);
    }

    let mut sample_ids = Vec::new();
    let mut records = Vec::new();

    for (index, row) in reader.records().enumerate() {
        let row = row?;
        let row_number = index + 1;

        let mut values = Vec::with_capacity(feature_columns.len());
        for (column, name) in &feature_columns {
            let cell = row.get(*column).unwrap_or("");
            let value: f64 = cell.parse().map_err(|_| DataError::NonNumeric {
                column: name.clone(),
                row: row_number,
                value: cell.to_string(),
            })?;
            values.push((name.clone(), value));
        }

        let record = FeatureRecord::new(values).map_err(|source| DataError::InvalidRecord {
            row: row_number,
            source,
        })?;

        let sample_id = match id_column {
            Some(column) => row.get(column).unwrap_or("").to_string(),
            None => row_number.to_string(),
        };

        sample_ids.push(sample_id);
        records.push(record);
    }

    if records.is_empty() {
        return Err(DataError::NoRows);
    }

    log::info!(
        "Loaded {} records with {} features from {}",
        records.len(),
        feature_columns.len(),
        path.display()
    );

    Ok(RecordBatch {
        sample_ids,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_tsv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_records_with_sample_ids() {
        let file = write_tsv(
            "sample_id\tradius_mean\ttexture_mean\n\
             p1\t14.0\t19.0\n\
             p2\t5.9\t21.5\n",
        );

        let batch = load_records(file.path()).unwrap();
        assert_eq!(batch.sample_ids, vec!["p1", "p2"]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records[1].get("radius_mean"), Some(5.9));
        let names: Vec<&str> = batch.records[0].names().collect();
        assert_eq!(names, vec!["radius_mean", "texture_mean"]);
    }

    #[test]
    fn generates_sequential_ids() {
        let file = write_tsv("radius_mean\n14.0\n15.5\n");
        let batch = load_records(file.path()).unwrap();
        assert_eq!(batch.sample_ids, vec!["1", "2"]);
    }

    #[test]
    fn reports_non_numeric_cells() {
        let file = write_tsv("radius_mean\ttexture_mean\n14.0\t19.0\n15.0\tabc\n");
        let err = load_records(file.path()).unwrap_err();
        match err {
            DataError::NonNumeric { column, row, value } => {
                assert_eq!(column, "texture_mean");
                assert_eq!(row, 2);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_finite_cells() {
        let file = write_tsv("radius_mean\nNaN\n");
        assert!(matches!(
            load_records(file.path()),
            Err(DataError::InvalidRecord { row: 1, .. })
        ));
    }

    #[test]
    fn rejects_empty_inputs() {
        let header_only = write_tsv("radius_mean\ttexture_mean\n");
        assert!(matches!(
            load_records(header_only.path()),
            Err(DataError::NoRows)
        ));

        let ids_only = write_tsv("sample_id\np1\n");
        assert!(matches!(
            load_records(ids_only.path()),
            Err(DataError::NoFeatureColumns)
        ));
    }
}
