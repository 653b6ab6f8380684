//! Error types for the claims anomaly pipeline

use thiserror::Error;

/// Errors raised by an individual outlier detector.
///
/// Detector errors are recoverable at the pipeline level: a failing
/// detector is dropped from the comparison instead of aborting the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("not enough rows for neighborhood search: {rows} rows, k={neighbors}")]
    InsufficientRows { rows: usize, neighbors: usize },

    #[error("empty feature matrix")]
    EmptyInput,
}

/// Errors raised while assembling a pipeline configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

/// Result type for detector operations
pub type DetectorResult<T> = Result<T, DetectorError>;
