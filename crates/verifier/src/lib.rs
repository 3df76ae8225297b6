//! Token verification for quotagate.
//!
//! The [`VerificationEngine`] decodes tokens, resolves their hashes against an
//! [`IndexStore`](quotagate_index::IndexStore), and checks the resolved
//! identifier against the [`QuotaTable`](quotagate_core::QuotaTable).

pub mod engine;
pub mod error;
pub mod result;

pub use engine::{EngineOptions, VerificationEngine};
pub use error::{VerifierError, VerifierResult};
pub use result::{TokenVerdict, VerificationResult};
