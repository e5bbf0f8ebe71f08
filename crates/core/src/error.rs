//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid ticket id: {0}")]
    InvalidTicketId(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("ticket timeout {timeout}s exceeds maximum {max}s")]
    TimeoutTooLarge { timeout: u64, max: u64 },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
