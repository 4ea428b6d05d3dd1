//! Error types for copydesk.
//!
//! Library crates use [`CopydeskError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only [`CopydeskError::Fetch`] fails a URL outright; research, ranking
//! and draft failures are absorbed by the pipeline as degraded results
//! and recorded as warnings on the package.

use std::path::PathBuf;

/// Top-level error type for all copydesk operations.
#[derive(Debug, thiserror::Error)]
pub enum CopydeskError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP/parse error while fetching a source page.
    /// Fatal for that URL; the batch continues.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Search-provider error (competitors / forum questions).
    #[error("research error: {0}")]
    Research(String),

    /// Embedding-transport error in the semantic ranking strategy.
    #[error("ranking error: {0}")]
    Ranking(String),

    /// Draft-generation error (API transport or response shape).
    #[error("draft error: {0}")]
    Draft(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid URL list, bad input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CopydeskError>;

impl CopydeskError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a fetch error from any displayable message.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a research error from any displayable message.
    pub fn research(msg: impl Into<String>) -> Self {
        Self::Research(msg.into())
    }

    /// Create a ranking error from any displayable message.
    pub fn ranking(msg: impl Into<String>) -> Self {
        Self::Ranking(msg.into())
    }

    /// Create a draft error from any displayable message.
    pub fn draft(msg: impl Into<String>) -> Self {
        Self::Draft(msg.into())
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
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
        let err = CopydeskError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = CopydeskError::fetch("HTTP 404 for https://example.com/gone");
        assert!(err.to_string().contains("404"));

        let err = CopydeskError::validation("empty URL list");
        assert!(err.to_string().contains("empty URL list"));
    }
}
