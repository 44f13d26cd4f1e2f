//! Error types for Ladder.

use thiserror::Error;

/// Result type for Ladder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Ladder operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced user, code or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record store could not serve the request (retryable)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Request rejected before touching the store
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Actor lacks the admin flag
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Guarded write lost a race, or a create collided with an existing id
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::Conflict(_))
    }
}
