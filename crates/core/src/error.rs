//! Error types for sift.
//!
//! One enum covers every failure in the workspace. Variants fall into three
//! groups that callers treat differently:
//! - configuration errors (bad chunking parameters, missing templates,
//!   dimension mismatches) fail immediately and are never retried;
//! - backend errors (embedding model, datastore, LLM) are retryable;
//! - data errors (`NoMatch`) model an explicit "nothing found" outcome.

use thiserror::Error;

/// Unified error type for sift.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chunker constructed with an unusable size/overlap pair
    #[error("Invalid chunk configuration: chunk_size={chunk_size}, overlap={overlap} ({reason})")]
    InvalidChunkConfig {
        chunk_size: usize,
        overlap: usize,
        reason: String,
    },

    /// Prompt template lookup failed
    #[error("Missing template: {0}")]
    MissingTemplate(String),

    /// Vector dimension differs from the index dimension
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Complexity level could not be resolved
    #[error("Unknown complexity '{0}'. Expected one of: easy, medium, hard")]
    UnknownComplexity(String),

    /// Task dispatched with no active strategy
    #[error("No strategy set")]
    NoStrategy,

    /// Embedding model failure; retry, possibly with a smaller batch
    #[error("Embedding backend error: {0}")]
    EmbeddingBackend(String),

    /// Vector datastore failure
    #[error("Datastore error: {0}")]
    Datastore(String),

    /// No chunk matched the keyword above the threshold
    #[error("No match: {0}")]
    NoMatch(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Task execution errors
    #[error("Task error: {0}")]
    Task(String),

    /// Work stopped between batches at the caller's request
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the failure came from a backend that may succeed on retry.
    ///
    /// Configuration and data errors always return `false`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingBackend(_) | AppError::Datastore(_) | AppError::Llm(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Datastore(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_are_retryable() {
        assert!(AppError::EmbeddingBackend("oom".to_string()).is_retryable());
        assert!(AppError::Datastore("locked".to_string()).is_retryable());
        assert!(AppError::Llm("timeout".to_string()).is_retryable());
    }

    #[test]
    fn test_configuration_errors_are_not_retryable() {
        let err = AppError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("384"));

        assert!(!AppError::MissingTemplate("short/base".to_string()).is_retryable());
        assert!(!AppError::NoStrategy.is_retryable());
        assert!(!AppError::NoMatch("kw".to_string()).is_retryable());
    }

    #[test]
    fn test_sqlite_error_maps_to_datastore() {
        let err: AppError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, AppError::Datastore(_)));
    }
}
