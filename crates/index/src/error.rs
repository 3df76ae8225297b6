//! Index store error types.

use crate::state::StoreState;
use thiserror::Error;

/// Index store and build errors.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index not ready: {0}")]
    NotReady(StoreState),

    #[error("index build already in progress")]
    BuildInProgress,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt index record at line {line}: {reason}")]
    Corrupt { line: u64, reason: String },

    #[error("duplicate index entry: {0}")]
    Duplicate(String),

    #[error("incomplete index: expected {expected} entries, found {actual}")]
    Incomplete { expected: u64, actual: u64 },

    #[error("index build cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IndexError {
    /// Whether the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, IndexError::Io(_) | IndexError::Database(_))
    }
}

/// Result type for index operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let io = IndexError::Io(std::io::Error::other("disk hiccup"));
        assert!(io.is_transient());
        assert!(IndexError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!IndexError::NotReady(StoreState::Building).is_transient());
        assert!(!IndexError::Cancelled.is_transient());
    }

    #[test]
    fn test_incomplete_message() {
        let err = IndexError::Incomplete {
            expected: 11,
            actual: 7,
        };
        assert_eq!(
            err.to_string(),
            "incomplete index: expected 11 entries, found 7"
        );
    }
}
