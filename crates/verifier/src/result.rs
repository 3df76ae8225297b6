//! Batch verification results.

use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Why a single token passed or failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenVerdict {
    /// Hash resolved and the identifier is within the level's quota.
    Valid,
    /// Wrong length, non-numeric level, or malformed hash.
    InvalidFormat,
    /// Hash is not in the index.
    NotFound,
    /// Identifier is 0 or above the level's quota.
    OutOfQuota,
    /// The index could not be queried; treated as invalid.
    LookupFailed,
}

impl TokenVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenVerdict::Valid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenVerdict::Valid => "valid",
            TokenVerdict::InvalidFormat => "invalid_format",
            TokenVerdict::NotFound => "not_found",
            TokenVerdict::OutOfQuota => "out_of_quota",
            TokenVerdict::LookupFailed => "lookup_failed",
        }
    }
}

/// Verdicts for one batch, keyed by the original token string.
///
/// Serializes as a JSON object of `token -> bool`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationResult {
    verdicts: HashMap<String, TokenVerdict>,
}

impl VerificationResult {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            verdicts: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, token: String, verdict: TokenVerdict) {
        self.verdicts.insert(token, verdict);
    }

    /// Validity of a token, if it was part of the batch.
    pub fn get(&self, token: &str) -> Option<bool> {
        self.verdicts.get(token).map(TokenVerdict::is_valid)
    }

    /// Detailed verdict of a token, if it was part of the batch.
    pub fn verdict(&self, token: &str) -> Option<TokenVerdict> {
        self.verdicts.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TokenVerdict)> {
        self.verdicts.iter().map(|(t, v)| (t.as_str(), *v))
    }

    /// Number of tokens that verified true.
    pub fn valid_count(&self) -> usize {
        self.verdicts.values().filter(|v| v.is_valid()).count()
    }
}

impl Serialize for VerificationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.verdicts.iter().map(|(t, v)| (t, v.is_valid())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_token_to_bool() {
        let mut result = VerificationResult::default();
        result.insert("a".to_string(), TokenVerdict::Valid);
        result.insert("b".to_string(), TokenVerdict::OutOfQuota);

        let json: serde_json::Value = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"a": true, "b": false}));
        assert_eq!(result.valid_count(), 1);
        assert_eq!(result.verdict("b"), Some(TokenVerdict::OutOfQuota));
        assert_eq!(result.get("c"), None);
    }
}
