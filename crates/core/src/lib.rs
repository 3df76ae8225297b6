//! Core domain types and shared logic for quotagate.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Sequential identifiers and their content hashes
//! - The 67-character token wire format
//! - The level to quota mapping
//! - Configuration shared by the server and the CLI

pub mod config;
pub mod error;
pub mod hash;
pub mod quota;
pub mod token;

pub use error::{Error, Result};
pub use hash::{ContentHash, Identifier};
pub use quota::{Level, QuotaTable};
pub use token::{DecodedToken, LevelHash};

/// Highest identifier generated by a default index build.
pub const DEFAULT_HASH_LIMIT: Identifier = 4_300_000;

/// Default number of concurrent hashing workers during an index build.
pub const DEFAULT_BUILD_CONCURRENCY: usize = 100;

/// Default capacity of the queue between hashing workers and the index writer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
