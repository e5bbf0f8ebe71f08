//! Storage error types.

use thiserror::Error;

/// Backend operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("backend not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported backend scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("range {offset}+{length} exceeds backend size {size}")]
    OutOfBounds { offset: u64, length: u64, size: u64 },

    #[error("backend opened read-only: {0}")]
    ReadOnly(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
