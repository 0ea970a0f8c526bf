//! Centralized error handling for the theftcast pipeline.
//!
//! Every pipeline stage returns [`Result`], so a failure anywhere aborts the
//! whole run before the artifact writer is reached. The variants mirror the
//! ways a training run can fail:
//!
//! ```
//! use theftcast::error::TheftcastError;
//!
//! fn describe(err: &TheftcastError) -> &'static str {
//!     match err {
//!         TheftcastError::EmptyInput(_) => "nothing to train on",
//!         TheftcastError::InsufficientData { .. } => "a numeric column is too sparse",
//!         TheftcastError::NoCandidates => "every backend failed",
//!         _ => "other failure",
//!     }
//! }
//! ```
//!
//! ## Context Extension Trait
//!
//! The `ResultExt` trait adds `.context()` to any `Result` whose error
//! converts into [`TheftcastError`]:
//!
//! ```no_run
//! use theftcast::error::ResultExt as _;
//!
//! fn load() -> theftcast::error::Result<String> {
//!     std::fs::read_to_string("thefts.csv").context("Failed to load dataset")
//! }
//! ```

use std::fmt;

/// Main error type for theftcast operations.
#[derive(Debug)]
pub enum TheftcastError {
    /// The input table has no rows or no columns.
    EmptyInput(String),

    /// A numeric column cannot support the normality test.
    InsufficientData {
        column: String,
        non_missing: usize,
    },

    /// The configured label column is absent from the table.
    MissingLabelColumn(String),

    /// The label column does not hold exactly two classes.
    InvalidLabel(String),

    /// No classifier produced a result.
    NoCandidates,

    /// The artifact or a side file could not be persisted.
    ArtifactWrite(String),

    /// A consumer supplied a record without every required feature.
    MissingFeatures(Vec<String>),

    /// A learning backend failed to fit or predict.
    Training(String),

    /// I/O errors (file operations)
    Io(std::io::Error),

    /// Data processing errors (Polars, parsing, etc.)
    DataProcessing(String),

    /// Configuration errors
    Config(String),

    /// Generic error with context
    Other(String),
}

impl fmt::Display for TheftcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput(msg) => write!(f, "Empty input: {msg}"),
            Self::InsufficientData {
                column,
                non_missing,
            } => write!(
                f,
                "Insufficient data: column '{column}' has {non_missing} non-missing value(s), at least 2 are needed for the normality test"
            ),
            Self::MissingLabelColumn(col) => write!(f, "Label column '{col}' not found"),
            Self::InvalidLabel(msg) => write!(f, "Invalid label column: {msg}"),
            Self::NoCandidates => write!(f, "No classifier produced a candidate model"),
            Self::ArtifactWrite(msg) => write!(f, "Failed to write artifact: {msg}"),
            Self::MissingFeatures(names) => {
                write!(f, "Missing required features: {}", names.join(", "))
            }
            Self::Training(msg) => write!(f, "Training error: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for TheftcastError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TheftcastError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for TheftcastError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<serde_json::Error> for TheftcastError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for TheftcastError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

/// Result type alias for theftcast operations.
pub type Result<T> = std::result::Result<T, TheftcastError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<TheftcastError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: TheftcastError = e.into();
            TheftcastError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: TheftcastError = e.into();
            TheftcastError::Other(format!("{}: {}", f(), err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TheftcastError::InsufficientData {
            column: "BIKE_COST".to_owned(),
            non_missing: 1,
        };
        assert!(err.to_string().contains("'BIKE_COST' has 1 non-missing"));

        let err = TheftcastError::MissingFeatures(vec!["A".to_owned(), "B".to_owned()]);
        assert_eq!(err.to_string(), "Missing required features: A, B");
    }

    #[test]
    fn test_label_error_display() {
        let err = TheftcastError::MissingLabelColumn("STATUS".to_owned());
        assert_eq!(err.to_string(), "Label column 'STATUS' not found");
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "thefts.csv",
        ));

        let result: Result<()> = result.context("Failed to read file");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read file")
        );
    }
}
