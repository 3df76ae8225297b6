//! Index data model.

use quotagate_core::{ContentHash, Identifier};
use serde::Serialize;
use std::time::Duration;

/// One `(identifier, hash)` pair of the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    pub identifier: Identifier,
    pub hash: ContentHash,
}

impl IndexEntry {
    /// Hash an identifier into its entry.
    pub fn compute(identifier: Identifier) -> Self {
        Self {
            identifier,
            hash: ContentHash::of_identifier(identifier),
        }
    }
}

/// Summary of a completed build.
#[derive(Clone, Debug, Serialize)]
pub struct BuildReport {
    /// Entries committed to the store.
    pub entries: u64,
    /// Highest identifier hashed.
    pub limit: Identifier,
    /// Hashing workers used.
    pub concurrency: usize,
    /// Wall time of the build.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
