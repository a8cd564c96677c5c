//! Common error types for TQV

use thiserror::Error;

/// Common result type for TQV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the verifier crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (malformed task, bad marker, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON encoding or decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
