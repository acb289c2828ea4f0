//! Typed failures for data and artifact loading.
//!
//! Everything else in the crate returns [`crate::Result`]; these variants are
//! wrapped in `anyhow::Error` and can be recovered with `downcast_ref`.

use std::path::PathBuf;

use thiserror::Error;

/// Failures that make a load or a pipeline stage unusable.
///
/// Short history and empty date ranges are not represented here: they produce
/// empty series instead of errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("input table is missing required column `{0}`")]
    MissingColumn(String),

    #[error("row {row}: cannot parse date `{value}`")]
    UnparseableDate { row: usize, value: String },

    #[error("row {row}: cannot parse `{value}` in column `{column}` as a number")]
    UnparseableNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("date {0} appears more than once")]
    DuplicateDate(chrono::NaiveDate),

    #[error("dates must be strictly increasing ({previous} is followed by {next})")]
    UnorderedDates {
        previous: chrono::NaiveDate,
        next: chrono::NaiveDate,
    },

    #[error("{artifact} was fit on columns {expected:?} but received {actual:?}")]
    SchemaMismatch {
        artifact: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("{context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = DataError::MissingColumn("Close_V".into());
        assert_eq!(
            err.to_string(),
            "input table is missing required column `Close_V`"
        );

        let err = DataError::MissingArtifact(PathBuf::from("artifacts/scaler_visa.json"));
        assert!(err.to_string().contains("scaler_visa.json"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = DataError::ShapeMismatch {
            context: "feature scaler width".into(),
            expected: 7,
            actual: 6,
        }
        .into();

        let typed = err.downcast_ref::<DataError>().unwrap();
        assert!(matches!(typed, DataError::ShapeMismatch { expected: 7, .. }));
    }
}
