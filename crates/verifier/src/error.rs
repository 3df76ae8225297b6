//! Verification error types.
//!
//! Per-token problems never surface here; they fail closed to `false`.
//! These errors describe a batch that could not be answered at all.

use quotagate_index::{IndexError, StoreState};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("index not ready: {0}")]
    NotReady(StoreState),

    #[error("verification cancelled")]
    Cancelled,

    #[error("verification timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("batch of {size} tokens exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("index error: {0}")]
    Index(IndexError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<IndexError> for VerifierError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotReady(state) => VerifierError::NotReady(state),
            other => VerifierError::Index(other),
        }
    }
}

/// Result type for verification operations.
pub type VerifierResult<T> = std::result::Result<T, VerifierError>;
