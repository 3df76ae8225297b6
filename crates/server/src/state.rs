//! Application state shared across handlers.

use crate::publish::ContentPublisher;
use quotagate_core::QuotaTable;
use quotagate_core::config::AppConfig;
use quotagate_index::IndexStore;
use quotagate_verifier::{EngineOptions, VerificationEngine};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Hash index.
    pub index: Arc<dyn IndexStore>,
    /// Verification engine over `index`.
    pub engine: VerificationEngine,
    /// Content publisher for the combined level lookup.
    pub publisher: Arc<dyn ContentPublisher>,
    /// Cancelled when the server shuts down; aborts in-flight batches.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        config: AppConfig,
        index: Arc<dyn IndexStore>,
        quotas: QuotaTable,
        publisher: Arc<dyn ContentPublisher>,
        shutdown: CancellationToken,
    ) -> Self {
        let engine = VerificationEngine::new(
            Arc::clone(&index),
            Arc::new(quotas),
            EngineOptions::from(&config.server),
        );
        Self {
            config: Arc::new(config),
            index,
            engine,
            publisher,
            shutdown,
        }
    }
}
