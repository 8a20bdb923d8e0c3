//! Error types for the question bank

use thiserror::Error;

/// Errors surfaced by the store, the tracker and the ingest path
#[derive(Debug, Error)]
pub enum BankError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Question not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<BankError> for String {
    fn from(err: BankError) -> Self {
        err.to_string()
    }
}

pub type Result<T> = std::result::Result<T, BankError>;
