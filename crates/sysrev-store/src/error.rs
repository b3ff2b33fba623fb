//! Store error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Output header does not match schema: {0}")]
    HeaderMismatch(String),

    #[error("Malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("Could not persist {path}: {reason}")]
    Persist { path: String, reason: String },
}

impl StoreError {
    pub(crate) fn malformed(row: usize, reason: impl Into<String>) -> Self {
        StoreError::MalformedRow { row, reason: reason.into() }
    }
}
