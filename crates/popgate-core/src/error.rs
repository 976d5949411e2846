//! Error types for the core library.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend mail store failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The account name does not match the naming policy.
    #[error("Invalid account name: {0}")]
    InvalidAccountName(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
