//! Error types for evh

use std::path::PathBuf;

use thiserror::Error;

/// evh error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed or semantically invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Value outside the range a binning or axis can represent
    #[error("Range error: {0}")]
    Range(String),

    /// Malformed numeric input in edge files
    #[error("Parse error: {0}")]
    Parse(String),

    /// Failure while processing records
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// An error raised while processing one configuration line.
    #[error("{source} (line {line} of {})", path.display())]
    AtLine {
        /// Configuration file path.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Underlying error.
        source: Box<Error>,
    },
}

impl Error {
    /// Annotate this error with the configuration line it was raised on.
    pub fn at_line(self, path: impl Into<PathBuf>, line: usize) -> Self {
        Error::AtLine { path: path.into(), line, source: Box::new(self) }
    }

    /// The innermost error, with line annotations removed.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::AtLine { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the root cause is a [`Error::Config`].
    pub fn is_config(&self) -> bool {
        matches!(self.root_cause(), Error::Config(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
