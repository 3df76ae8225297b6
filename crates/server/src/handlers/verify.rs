//! Batch token verification.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use quotagate_verifier::VerificationResult;
use serde::Deserialize;
use std::time::Instant;

/// Verification request body: a bare list of tokens or an object wrapping one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum VerifyRequest {
    List(Vec<String>),
    Object { tokens: Vec<String> },
}

impl VerifyRequest {
    pub fn into_tokens(self) -> Vec<String> {
        match self {
            VerifyRequest::List(tokens) | VerifyRequest::Object { tokens } => tokens,
        }
    }
}

/// POST /v1/verify
///
/// Responds with `{ "<token>": bool, ... }`, one entry per distinct token.
pub async fn verify_tokens(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<VerificationResult>> {
    // Parsed by hand so any malformed body is a 400 with our error shape.
    let request: VerifyRequest = serde_json::from_slice(&body).map_err(|e| {
        ApiError::BadRequest(format!(
            "expected a JSON array of tokens or {{\"tokens\": [...]}}: {e}"
        ))
    })?;
    let tokens = request.into_tokens();

    let started = Instant::now();
    let outcome = state.engine.verify_batch(tokens, &state.shutdown).await;
    metrics::VERIFY_BATCH_DURATION.observe(started.elapsed().as_secs_f64());

    match outcome {
        Ok(result) => {
            metrics::VERIFY_BATCHES.with_label_values(&["ok"]).inc();
            for (_, verdict) in result.iter() {
                metrics::TOKENS_VERIFIED
                    .with_label_values(&[verdict.as_str()])
                    .inc();
            }
            Ok(Json(result))
        }
        Err(e) => {
            let err = ApiError::from(e);
            metrics::VERIFY_BATCHES.with_label_values(&[err.code()]).inc();
            Err(err)
        }
    }
}
