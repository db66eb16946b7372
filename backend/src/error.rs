//! Error types for the index pipeline.
//!
//! One enum per layer:
//!
//! - [`TableError`] - Raw table parsing errors
//! - [`ReshapeError`] - Wide-to-long reshaping errors (format and configuration)
//! - [`SourceError`] - Data provider errors
//! - [`ComposeError`] - Series merge and statistics errors
//! - [`ConfigError`] - Configuration loading errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::models::Metric;

// =============================================================================
// Table Parsing Errors
// =============================================================================

/// Errors while turning raw text into a wide table.
#[derive(Debug, Error)]
pub enum TableError {
    /// Failed to read file.
    #[error("Failed to read table: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode bytes.
    #[error("Failed to decode table: {0}")]
    EncodingError(String),

    /// Empty input.
    #[error("Table is empty")]
    EmptyTable,

    /// No header line.
    #[error("No header found in table")]
    NoHeader,

    /// Delimited reader failure.
    #[error("Invalid table format: {0}")]
    Csv(#[from] csv::Error),

    /// A data row does not line up with the header.
    #[error("Line {line}: expected {expected} cells, found {found}")]
    RaggedRow { line: usize, expected: usize, found: usize },
}

// =============================================================================
// Reshape Errors
// =============================================================================

/// Errors while reshaping a wide table into long rows.
#[derive(Debug, Error)]
pub enum ReshapeError {
    /// A period header is not a `YYYYQn` label.
    #[error("Period label '{label}' is not a quarterly period (expected YYYYQn)")]
    Format { label: String },

    /// The id columns do not match the table's non-period columns.
    #[error("Id columns {expected:?} do not match table columns {found:?}")]
    Configuration { expected: Vec<String>, found: Vec<String> },

    /// A row has a different number of cells than the header.
    #[error("Row {row} has {found} cells, header has {expected}")]
    MalformedRow { row: usize, expected: usize, found: usize },
}

// =============================================================================
// Source Errors
// =============================================================================

/// Errors from a data provider.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Provider answered with a non-success status.
    #[error("Dataset '{dataset}' request returned HTTP {status}")]
    Status { dataset: String, status: u16 },

    /// Dataset is not available locally.
    #[error("Dataset '{dataset}' not found in {dir}")]
    NotFound { dataset: String, dir: String },

    /// Payload could not be parsed.
    #[error("Dataset '{dataset}' is malformed: {source}")]
    Table {
        dataset: String,
        #[source]
        source: TableError,
    },
}

// =============================================================================
// Compose Errors
// =============================================================================

/// Errors while merging series or computing statistics.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// A series holds more than one point for the same quarter.
    #[error("Series '{metric}' has more than one point for {quarter}")]
    AmbiguousQuarter { metric: Metric, quarter: String },

    /// Window outside the supported range.
    #[error("{kind} window {window} is not supported (allowed: {allowed})")]
    InvalidWindow {
        kind: &'static str,
        window: usize,
        allowed: &'static str,
    },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run_analysis`].
/// Per-country problems are not errors at this level; they are collected as
/// failures in the report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Reshape error: {0}")]
    Reshape(#[from] ReshapeError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Failed to bind: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type TableResult<T> = Result<T, TableError>;

pub type ReshapeResult<T> = Result<T, ReshapeError>;

pub type SourceResult<T> = Result<T, SourceError>;

pub type ComposeResult<T> = Result<T, ComposeError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let reshape_err = ReshapeError::Format { label: "2019-12".into() };
        let pipeline_err: PipelineError = reshape_err.into();
        assert!(pipeline_err.to_string().contains("2019-12"));

        let compose_err = ComposeError::AmbiguousQuarter {
            metric: Metric::Gva,
            quarter: "2020Q1".into(),
        };
        let pipeline_err: PipelineError = compose_err.into();
        assert!(pipeline_err.to_string().contains("gva"));
        assert!(pipeline_err.to_string().contains("2020Q1"));
    }

    #[test]
    fn test_configuration_error_format() {
        let err = ReshapeError::Configuration {
            expected: vec!["freq".into(), "geo".into()],
            found: vec!["freq".into(), "unit".into(), "geo".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("unit"));
        assert!(msg.contains("do not match"));
    }
}
