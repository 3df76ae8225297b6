//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Probes
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/ready", get(handlers::readiness))
        .route("/v1/index", get(handlers::index_stats))
        // Verification
        .route("/v1/verify", post(handlers::verify_tokens))
        // Lookups
        .route("/v1/token", post(handlers::lookup_hashes))
        .route("/v1/token/{hash}", get(handlers::lookup_hash))
        .route("/v1/leveltoken/{level_hash}", get(handlers::level_token));

    // Unversioned lookup paths served by earlier deployments.
    let legacy_routes = Router::new()
        .route("/token", post(handlers::lookup_hashes))
        .route("/token/{hash}", get(handlers::lookup_hash))
        .route("/leveltoken/{level_hash}", get(handlers::level_token));

    let mut router = Router::new().merge(api_routes).merge(legacy_routes);

    // The metrics endpoint is unauthenticated; restrict it at the network level.
    if state.config.server.metrics_enabled {
        let metrics_routes = Router::new().route("/metrics", get(metrics_handler));
        router = router.merge(metrics_routes);
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
