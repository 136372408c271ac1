//! Error types for the retail insights pipeline.
//!
//! - [`CsvError`] - CSV ingestion errors (with line context)
//! - [`MalformedRowError`] - a raw row that cannot become a transaction record
//! - [`AnalyticsError`] - aggregation requested on input it cannot handle
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ConfigError`] - environment configuration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Lower-level errors convert into [`PipelineError`] via `From`, so `?`
//! works across stage boundaries.

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// CSV reading failed at `line` (1-based; 0 when no line was reached).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Line {line}: {message}")]
pub struct CsvError {
    pub line: usize,
    pub message: String,
}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

// =============================================================================
// Normalization Errors
// =============================================================================

/// What was wrong with a raw row.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowErrorKind {
    /// The row is not a JSON object.
    #[error("row is not an object")]
    NotAnObject,

    /// A required column is absent (from the header or from the row).
    #[error("missing column '{column}'")]
    MissingField { column: String },

    /// A required text field is blank.
    #[error("column '{column}' is empty")]
    EmptyValue { column: String },

    /// The date field does not match any accepted shape.
    #[error("cannot parse date '{value}'")]
    InvalidDate { value: String },

    /// Quantity is not a non-negative integer.
    #[error("quantity '{value}' is not a non-negative integer")]
    InvalidQuantity { value: String },

    /// Total price is not a non-negative finite number.
    #[error("total price '{value}' is not a non-negative number")]
    InvalidPrice { value: String },
}

/// A raw input row could not be normalized into a transaction record.
///
/// `row` is the 1-based data row index (header excluded); `0` means the
/// problem was found in the header before any row was read.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Malformed row {row}: {kind}")]
pub struct MalformedRowError {
    pub row: usize,
    pub kind: RowErrorKind,
}

impl MalformedRowError {
    pub fn new(row: usize, kind: RowErrorKind) -> Self {
        Self { row, kind }
    }

    /// Header-level failure (no row involved).
    pub fn header(kind: RowErrorKind) -> Self {
        Self { row: 0, kind }
    }
}

// =============================================================================
// Analytics Errors
// =============================================================================

/// Errors raised by the aggregation stages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyticsError {
    /// An aggregation with no meaningful empty value was requested on zero records.
    #[error("cannot aggregate an empty transaction set")]
    EmptyDataset,

    /// Rolling window must cover at least one observation.
    #[error("invalid rolling window size: {0}")]
    InvalidWindow(usize),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::analyze_bytes`]
/// and friends.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Row normalization error.
    #[error("{0}")]
    MalformedRow(#[from] MalformedRowError),

    /// Aggregation error.
    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    /// Raw rows failed schema validation.
    #[error("Validation failed on row {row}: {errors:?}")]
    Validation { row: usize, errors: Vec<String> },

    /// No records to analyze.
    #[error("No records to analyze")]
    EmptyInput,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while reading settings from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: '{value}' ({message})")]
    Invalid {
        key: String,
        value: String,
        message: String,
    },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeds the configured limit.
    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Listener IO error.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for normalization.
pub type NormalizeResult<T> = Result<T, MalformedRowError>;

/// Result type for aggregation stages.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::new(1, "Empty CSV file");
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("Empty"));

        let row_err = MalformedRowError::new(
            3,
            RowErrorKind::InvalidDate { value: "soon".into() },
        );
        let pipeline_err: PipelineError = row_err.into();
        assert!(pipeline_err.to_string().contains("row 3"));
        assert!(pipeline_err.to_string().contains("soon"));

        let pipeline_err: PipelineError = AnalyticsError::EmptyDataset.into();
        assert!(pipeline_err.to_string().contains("empty"));
    }

    #[test]
    fn test_csv_error_message_format() {
        let err = CsvError::new(5, "Cannot read line: unexpected EOF");
        assert_eq!(err.to_string(), "Line 5: Cannot read line: unexpected EOF");
    }

    #[test]
    fn test_header_error_has_row_zero() {
        let err = MalformedRowError::header(RowErrorKind::MissingField {
            column: "Brand".into(),
        });
        assert_eq!(err.row, 0);
        assert!(err.to_string().contains("missing column 'Brand'"));
    }
}
