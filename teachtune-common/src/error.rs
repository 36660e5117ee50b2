//! Common error types for TeachTune

use thiserror::Error;

/// Common result type for TeachTune operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across TeachTune crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed recurrence or lesson data
    ///
    /// Blocks the save; never degraded silently.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Student or lesson missing, or outside the teacher's scope
    #[error("Not found: {0}")]
    NotFound(String),

    /// Schedule transaction failed and was rolled back
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Alert delivery to a notification channel failed
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored data could not be decoded
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON column: {}", err))
    }
}
