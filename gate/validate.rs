//! # Range Validation
//!
//! Decides whether a `FeatureRecord` lies inside the support region described
//! by a `RangeTable`. Validation is a pure function of its two inputs and
//! reports every violating feature, not only the first one it meets.
//!
//! The record and the table must name exactly the same features. A mismatch is
//! a configuration or programming error and is returned as `SchemaMismatch`
//! rather than silently skipping the unmatched fields.

use crate::ranges::RangeTable;
use crate::record::FeatureRecord;
use itertools::Itertools;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which end of the trusted interval a value crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    BelowMin,
    AboveMax,
}

impl Bound {
    pub fn as_str(self) -> &'static str {
        match self {
            Bound::BelowMin => "below_min",
            Bound::AboveMax => "above_max",
        }
    }
}

/// One feature outside its trusted interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub feature: String,
    pub observed: f64,
    pub bound: Bound,
    /// The value of the crossed bound (`min` for `BelowMin`, `max` for `AboveMax`).
    pub limit: f64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound {
            Bound::BelowMin => write!(f, "{}={}<{}", self.feature, self.observed, self.limit),
            Bound::AboveMax => write!(f, "{}={}>{}", self.feature, self.observed, self.limit),
        }
    }
}

/// All violations found in one record, in record order. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutOfRange {
    pub violations: Vec<Violation>,
}

impl OutOfRange {
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().map(|v| v.feature.as_str())
    }
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.violations.iter().join(";"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    InRange,
    OutOfRange(OutOfRange),
}

impl ValidationResult {
    pub fn is_in_range(&self) -> bool {
        matches!(self, ValidationResult::InRange)
    }
}

/// The record and the range table disagree on which features exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Feature schema mismatch. Missing from record: [{}]. Not in range table: [{}].",
    .missing.join(", "),
    .unexpected.join(", ")
)]
pub struct SchemaMismatch {
    /// Features the range table defines but the record lacks, sorted.
    pub missing: Vec<String>,
    /// Features the record carries but the range table does not define, in record order.
    pub unexpected: Vec<String>,
}

/// Compares the record's feature names with the range table's, returning the
/// disagreement if any.
pub fn check_schema(
    record_features: &[&str],
    table_features: &[&str],
) -> Result<(), SchemaMismatch> {
    let missing: Vec<String> = table_features
        .iter()
        .filter(|name| !record_features.contains(*name))
        .map(|name| name.to_string())
        .collect();
    let unexpected: Vec<String> = record_features
        .iter()
        .filter(|name| !table_features.contains(*name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(SchemaMismatch {
            missing,
            unexpected,
        })
    }
}

/// Checks every feature of `record` against its interval in `ranges`.
///
/// Values equal to `min` or `max` are in range.
pub fn validate(
    record: &FeatureRecord,
    ranges: &RangeTable,
) -> Result<ValidationResult, SchemaMismatch> {
    let record_features: Vec<&str> = record.names().collect();
    let table_features: Vec<&str> = ranges.features().collect();
    check_schema(&record_features, &table_features)?;

    let violations: Vec<Violation> = record
        .iter()
        .filter_map(|(feature, observed)| {
            // Presence is guaranteed by the schema check above.
            let range = ranges.get(feature)?;
            if observed < range.min {
                Some(Violation {
                    feature: feature.to_string(),
                    observed,
                    bound: Bound::BelowMin,
                    limit: range.min,
                })
            } else if observed > range.max {
                Some(Violation {
                    feature: feature.to_string(),
                    observed,
                    bound: Bound::AboveMax,
                    limit: range.max,
                })
            } else {
                None
            }
        })
        .collect();

    if violations.is_empty() {
        Ok(ValidationResult::InRange)
    } else {
        Ok(ValidationResult::OutOfRange(OutOfRange { violations }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::FeatureRange;

    fn table() -> RangeTable {
        RangeTable::new([
            ("radius_mean", FeatureRange::new(6.0, 30.0)),
            ("texture_mean", FeatureRange::new(9.0, 40.0)),
            ("area_mean", FeatureRange::new(140.0, 2600.0)),
        ])
        .unwrap()
    }

    #[test]
    fn interior_values_are_in_range() {
        let record = FeatureRecord::new([
            ("radius_mean", 14.0),
            ("texture_mean", 19.0),
            ("area_mean", 600.0),
        ])
        .unwrap();
        assert_eq!(validate(&record, &table()), Ok(ValidationResult::InRange));
    }

    #[test]
    fn boundary_values_are_in_range() {
        let low = FeatureRecord::new([
            ("radius_mean", 6.0),
            ("texture_mean", 9.0),
            ("area_mean", 140.0),
        ])
        .unwrap();
        let high = FeatureRecord::new([
            ("radius_mean", 30.0),
            ("texture_mean", 40.0),
            ("area_mean", 2600.0),
        ])
        .unwrap();
        assert!(validate(&low, &table()).unwrap().is_in_range());
        assert!(validate(&high, &table()).unwrap().is_in_range());
    }

    #[test]
    fn reports_every_violation_in_record_order() {
        let record = FeatureRecord::new([
            ("area_mean", 3000.0),
            ("radius_mean", 5.9),
            ("texture_mean", 19.0),
        ])
        .unwrap();

        let ValidationResult::OutOfRange(out) = validate(&record, &table()).unwrap() else {
            panic!("expected an out-of-range result");
        };
        assert_eq!(
            out.violations,
            vec![
                Violation {
                    feature: "area_mean".to_string(),
                    observed: 3000.0,
                    bound: Bound::AboveMax,
                    limit: 2600.0,
                },
                Violation {
                    feature: "radius_mean".to_string(),
                    observed: 5.9,
                    bound: Bound::BelowMin,
                    limit: 6.0,
                },
            ]
        );
        assert_eq!(out.to_string(), "area_mean=3000>2600;radius_mean=5.9<6");
    }

    #[test]
    fn schema_mismatch_lists_both_directions() {
        let record = FeatureRecord::new([
            ("radius_mean", 14.0),
            ("texture_mean", 19.0),
            ("smoothness_mean", 0.1),
        ])
        .unwrap();

        let err = validate(&record, &table()).unwrap_err();
        assert_eq!(err.missing, vec!["area_mean".to_string()]);
        assert_eq!(err.unexpected, vec!["smoothness_mean".to_string()]);
        assert!(err.to_string().contains("smoothness_mean"));
    }

    #[test]
    fn bound_names_match_wire_form() {
        assert_eq!(Bound::BelowMin.as_str(), "below_min");
        assert_eq!(Bound::AboveMax.as_str(), "above_max");
    }
}
