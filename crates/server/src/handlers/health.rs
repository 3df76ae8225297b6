//! Health, readiness, and index status endpoints.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use quotagate_index::StoreState;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub index: StoreState,
}

/// GET /v1/health
///
/// Reports liveness. The index state is informational; see `/v1/ready`.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.index.health_check().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        index: state.index.state(),
    }))
}

/// Readiness response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub index: StoreState,
}

/// GET /v1/ready
pub async fn readiness(State(state): State<AppState>) -> ApiResult<Json<ReadyResponse>> {
    let index = state.index.state();
    if index != StoreState::Ready {
        return Err(ApiError::ServiceUnavailable(format!("index is {index}")));
    }
    Ok(Json(ReadyResponse { ready: true, index }))
}

/// Index status response.
#[derive(Debug, Serialize)]
pub struct IndexStatsResponse {
    pub backend: &'static str,
    pub state: StoreState,
    pub entries: u64,
    pub limit: u64,
}

/// GET /v1/index
pub async fn index_stats(State(state): State<AppState>) -> ApiResult<Json<IndexStatsResponse>> {
    Ok(Json(IndexStatsResponse {
        backend: state.index.backend_name(),
        state: state.index.state(),
        entries: state.index.len().await?,
        limit: state.config.build.limit,
    }))
}
