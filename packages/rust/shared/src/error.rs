//! Error types for the research pipeline.
//!
//! Library crates use [`ResearcherError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all research operations.
#[derive(Debug, thiserror::Error)]
pub enum ResearcherError {
    /// Configuration loading or validation error (missing credentials, bad TOML).
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure.
    #[error("network error: {0}")]
    Network(String),

    /// Language-model collaborator failure.
    #[error("model error: {0}")]
    Model(String),

    /// Search-provider collaborator failure.
    #[error("search error: {0}")]
    Search(String),

    /// A collaborator call exceeded its time budget.
    #[error("timed out after {after:?}: {what}")]
    Timeout { what: String, after: Duration },

    /// Response body could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ResearcherError>;

impl ResearcherError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a timeout error for the named operation.
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ResearcherError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ResearcherError::timeout("search 'rust'", Duration::from_secs(30));
        assert_eq!(err.to_string(), "timed out after 30s: search 'rust'");

        let err = ResearcherError::timeout("search 'rust'", Duration::from_millis(100));
        assert_eq!(err.to_string(), "timed out after 100ms: search 'rust'");

        let err = ResearcherError::Model("HTTP 429".into());
        assert!(err.to_string().contains("429"));
    }
}
