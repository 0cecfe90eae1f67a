//! Error types for Linetrace.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Linetrace error types.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the git backend
    #[error("Git error: {0}")]
    Git(String),

    /// Malformed attribution stream input
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// An operation was triggered too often inside the guard window
    #[error("Runaway invocation of '{operation}': {count} calls within {window_ms}ms")]
    Runaway {
        operation: String,
        count: usize,
        window_ms: u64,
    },

    /// The cache shut itself down after a runaway trip
    #[error("Blame cache is disabled")]
    Disabled,

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
