//! Error types for the record/output layer.

use thiserror::Error;

/// Errors raised while reading trees, evaluating expressions or writing output.
#[derive(Error, Debug)]
pub enum RootError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expression could not be compiled
    #[error("expression error: {0}")]
    Expression(String),

    /// Histogram could not be filled
    #[error("histogram fill error: {0}")]
    HistogramFill(String),

    /// Requested tree is absent
    #[error("tree not found: {0}")]
    TreeNotFound(String),

    /// Requested branch is absent
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// Structurally invalid tree data
    #[error("invalid tree data: {0}")]
    Deserialization(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RootError>;

impl From<RootError> for evh_core::Error {
    fn from(e: RootError) -> Self {
        match e {
            RootError::Io(e) => evh_core::Error::Io(e),
            RootError::Json(e) => evh_core::Error::Json(e),
            other => evh_core::Error::Runtime(other.to_string()),
        }
    }
}
