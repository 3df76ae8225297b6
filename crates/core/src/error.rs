//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    #[error("invalid level: {0}")]
    InvalidLevel(String),

    #[error("invalid quota table: {0}")]
    InvalidQuotaTable(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
