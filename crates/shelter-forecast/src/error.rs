//! Error types for the shelter occupancy forecasting pipeline.
//!
//! This module is the single source of truth for all error types in the
//! crate. Every module that produces an error imports its error type from
//! here rather than defining it inline, keeping the error hierarchy
//! centralised and consistent.
//!
//! ## Hierarchy
//!
//! ```text
//! ForecastError (top-level)
//! ├── SchemaError      (missing / extra / misordered columns or features)
//! ├── InsufficientData (too few records to split into train / test)
//! ├── ValidationError  (out-of-range or negative inputs)
//! ├── ConfigError      (config validation / file loading)
//! ├── DatasetError     (CSV I/O, malformed cells)
//! ├── ShapeMismatch / NotFitted (regressor misuse)
//! ├── InvalidModel     (structurally broken model file)
//! └── Json             (model (de)serialization)
//! ```
//!
//! None of these conditions are transient, so nothing here is retried. They
//! propagate unchanged to the front end, which decides how to present them.

use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ForecastResult
// ---------------------------------------------------------------------------

/// Convenient `Result` alias used by orchestration-level functions.
pub type ForecastResult<T> = Result<T, ForecastError>;

// ---------------------------------------------------------------------------
// ForecastError: top-level aggregator
// ---------------------------------------------------------------------------

/// Top-level error type for the forecasting pipeline.
///
/// Orchestration-level functions (e.g. [`crate::model::TrainedModel::fit`]
/// and [`crate::scenario::evaluate`]) return `ForecastResult<T>`. Lower-level
/// functions return their own module-specific error types which are
/// automatically coerced into `ForecastError` via [`From`].
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Feature or label columns are missing, unexpected or misordered.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The training set is too small to be split into train and test.
    #[error("Insufficient data: {found} record(s) supplied, at least {required} required")]
    InsufficientData {
        /// Number of records that were supplied.
        found: usize,
        /// Minimum number of records needed.
        required: usize,
    },

    /// An input value is outside its accepted range.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A configuration validation or loading error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A dataset loading error.
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// A feature matrix and label vector disagree in shape.
    #[error("Shape mismatch: {features} feature row(s) but {labels} label(s)")]
    ShapeMismatch {
        /// Rows in the feature matrix.
        features: usize,
        /// Entries in the label vector.
        labels: usize,
    },

    /// A model was used before it was fitted.
    #[error("Model `{0}` has not been fitted")]
    NotFitted(&'static str),

    /// A deserialized model is structurally unusable.
    #[error("Invalid model: {reason}")]
    InvalidModel {
        /// What is wrong with it.
        reason: String,
    },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A saved model could not be read or written.
    #[error("Model file error at `{path}`: {source}")]
    ModelFile {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ForecastError {
    /// Construct a [`ForecastError::InsufficientData`].
    pub fn insufficient_data(found: usize, required: usize) -> Self {
        ForecastError::InsufficientData { found, required }
    }

    /// Construct a [`ForecastError::InvalidModel`].
    pub fn invalid_model<S: Into<String>>(reason: S) -> Self {
        ForecastError::InvalidModel { reason: reason.into() }
    }

    /// Construct a [`ForecastError::ModelFile`].
    pub fn model_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ForecastError::ModelFile { path: path.into(), source }
    }
}

// ---------------------------------------------------------------------------
// SchemaError
// ---------------------------------------------------------------------------

/// Column or feature-name mismatches between the data and the six-feature
/// schema the model was fitted on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A required column is absent from the dataset header.
    #[error("Missing required column `{column}`")]
    MissingColumn {
        /// Name of the missing column.
        column: String,
    },

    /// The dataset header carries a column that is not part of the schema.
    #[error("Unexpected column `{column}`")]
    UnexpectedColumn {
        /// Name of the extra column.
        column: String,
    },

    /// A column is present but at the wrong position.
    #[error("Column {position} should be `{expected}` but found `{found}`")]
    ColumnOrder {
        /// Zero-based position in the header.
        position: usize,
        /// Name expected at that position.
        expected: String,
        /// Name actually found.
        found: String,
    },

    /// A feature row lacks one of the features used at fit time.
    #[error("Missing feature `{feature}`")]
    MissingFeature {
        /// Name of the missing feature.
        feature: String,
    },

    /// A feature row carries a name that was not used at fit time.
    #[error("Unexpected feature `{feature}`")]
    UnexpectedFeature {
        /// Name of the extra feature.
        feature: String,
    },

    /// A feature row names the right features but in a different order.
    #[error("Feature {position} should be `{expected}` but found `{found}`")]
    FeatureOrder {
        /// Zero-based position in the row.
        position: usize,
        /// Name expected at that position.
        expected: String,
        /// Name actually found.
        found: String,
    },
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// Out-of-range input to the resource calculator or scenario evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A value lies outside its inclusive `[min, max]` range.
    #[error("`{field}` = {value} is outside the accepted range [{min}, {max}]")]
    OutOfRange {
        /// Name of the field.
        field: &'static str,
        /// The offending value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },

    /// A count that must be non-negative was negative.
    #[error("`{field}` must be >= 0, got {value}")]
    Negative {
        /// Name of the field.
        field: &'static str,
        /// The offending value.
        value: i64,
    },

    /// A floating-point value was NaN or infinite.
    #[error("`{field}` must be a finite number")]
    NonFinite {
        /// Name of the field.
        field: &'static str,
    },
}

impl ValidationError {
    /// Construct a [`ValidationError::OutOfRange`].
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        ValidationError::OutOfRange { field, value, min, max }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced when loading or validating a [`ForecastConfig`].
///
/// [`ForecastConfig`]: crate::config::ForecastConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read from or written to disk.
    #[error("Cannot access config file `{path}`: {source}")]
    FileRead {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON.
    #[error("Cannot parse config file `{path}`: {source}")]
    ParseError {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying JSON parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue { field, reason: reason.into() }
    }
}

// ---------------------------------------------------------------------------
// DatasetError
// ---------------------------------------------------------------------------

/// Errors produced while reading historical records.
///
/// Production code MUST NOT silently skip malformed rows: a bad cell fails
/// the whole load so the operator knows the history is incomplete.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The data file could not be opened or read.
    #[error("I/O error reading `{path}`: {source}")]
    IoError {
        /// Path being read when the error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader rejected the input.
    #[error("CSV error in `{source_name}`: {source}")]
    Csv {
        /// Dataset name (usually the file path).
        source_name: String,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// A cell could not be interpreted as the expected type.
    #[error("Row {row}, column `{column}`: {message}")]
    InvalidCell {
        /// One-based data row number (the header is row 0).
        row: usize,
        /// Column name.
        column: &'static str,
        /// Description of the problem.
        message: String,
    },
}

impl DatasetError {
    /// Construct a [`DatasetError::IoError`].
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::IoError { path: path.into(), source }
    }

    /// Construct a [`DatasetError::Csv`].
    pub fn csv<S: Into<String>>(source_name: S, source: csv::Error) -> Self {
        DatasetError::Csv { source_name: source_name.into(), source }
    }

    /// Construct a [`DatasetError::InvalidCell`].
    pub fn invalid_cell<S: Into<String>>(row: usize, column: &'static str, msg: S) -> Self {
        DatasetError::InvalidCell { row, column, message: msg.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_converts_into_forecast_error() {
        let err: ForecastError = SchemaError::MissingColumn { column: "chuva_mm".into() }.into();
        assert!(matches!(err, ForecastError::Schema(SchemaError::MissingColumn { .. })));
        assert!(err.to_string().contains("chuva_mm"));
    }

    #[test]
    fn insufficient_data_message_names_counts() {
        let err = ForecastError::insufficient_data(1, 2);
        assert_eq!(
            err.to_string(),
            "Insufficient data: 1 record(s) supplied, at least 2 required"
        );
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError::out_of_range("rainfall_mm", 600.0, 0.0, 500.0);
        assert_eq!(
            err.to_string(),
            "`rainfall_mm` = 600 is outside the accepted range [0, 500]"
        );
    }
}
