//! HTTP API server for quotagate.
//!
//! This crate provides the HTTP surface over the verification engine:
//! - Batch token verification
//! - Hash lookups, single and bulk
//! - The combined level lookup with content publishing
//! - Health, readiness, and Prometheus metrics
//! - Startup index loading and background builds

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod publish;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
