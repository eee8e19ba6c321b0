//! Error types for llmdocs.
//!
//! Library crates use [`LlmDocsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for diagnostics that happen before a
//! pipeline run exists; inside a run every error ends up in the summary.

use std::path::PathBuf;

/// Top-level error type for all llmdocs operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmDocsError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network or HTTP status failure while fetching a required source.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Structurally malformed input document (e.g. unbalanced code fences).
    #[error("extraction error in {source_name}: {message}")]
    Extraction {
        source_name: String,
        message: String,
    },

    /// LLM request failure, timeout, or empty response.
    #[error("assembly error: {0}")]
    Assembly(String),

    /// The external checker could not be invoked or crashed. Results cannot
    /// be trusted, so this is distinct from a block failing its check.
    #[error("validator unavailable: {0}")]
    ValidatorUnavailable(String),

    /// A required artifact or credential is missing before a stage starts.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON (de)serialization of a persisted artifact failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LlmDocsError>;

impl LlmDocsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error scoped to one source document.
    pub fn extraction(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Create a precondition error from any displayable message.
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for LlmDocsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
