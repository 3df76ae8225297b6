//! Hash lookup endpoints.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::publish::ContentAddress;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use futures::stream::{self, StreamExt};
use quotagate_core::{ContentHash, Identifier, LevelHash};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bulk lookup body: a list of hashes or a single bare hash.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LookupRequest {
    Many(Vec<String>),
    One(String),
}

impl LookupRequest {
    pub fn into_hashes(self) -> Vec<String> {
        match self {
            LookupRequest::Many(hashes) => hashes,
            LookupRequest::One(hash) => vec![hash],
        }
    }
}

/// Outcome of one hash in a bulk lookup.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum HashLookup {
    Found(Identifier),
    Error(&'static str),
}

/// GET /v1/token/{hash}
pub async fn lookup_hash(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<Json<HashMap<String, Identifier>>> {
    let parsed = ContentHash::from_hex(&hash).inspect_err(|_| metrics::record_lookup("invalid"))?;
    match state.index.lookup(&parsed).await? {
        Some(identifier) => {
            metrics::record_lookup("found");
            Ok(Json(HashMap::from([(hash, identifier)])))
        }
        None => {
            metrics::record_lookup("not_found");
            Err(ApiError::NotFound(format!("hash not found: {hash}")))
        }
    }
}

/// POST /v1/token
///
/// Body is a JSON array of hashes or a single JSON string. Every hash gets an
/// entry: its identifier, or an error string.
pub async fn lookup_hashes(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<HashMap<String, HashLookup>>> {
    let hashes = serde_json::from_slice::<LookupRequest>(&body)
        .map_err(|e| {
            ApiError::BadRequest(format!(
                "expected a JSON array of hashes or a single hash string: {e}"
            ))
        })?
        .into_hashes();
    let max = state.config.server.max_batch_size;
    if hashes.len() > max {
        return Err(ApiError::PayloadTooLarge(format!(
            "batch of {} hashes exceeds the limit of {max}",
            hashes.len()
        )));
    }
    state.index.readiness().ensure_ready()?;

    let concurrency = state.config.server.verify_concurrency.max(1);
    let results: Vec<_> = stream::iter(hashes)
        .map(|hash| {
            let index = state.index.clone();
            async move {
                let Ok(parsed) = ContentHash::from_hex(&hash) else {
                    metrics::record_lookup("invalid");
                    return Ok((hash, HashLookup::Error("invalid hash")));
                };
                let outcome = match index.lookup(&parsed).await? {
                    Some(identifier) => {
                        metrics::record_lookup("found");
                        HashLookup::Found(identifier)
                    }
                    None => {
                        metrics::record_lookup("not_found");
                        HashLookup::Error("hash not found")
                    }
                };
                Ok::<_, ApiError>((hash, outcome))
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut response = HashMap::with_capacity(results.len());
    for result in results {
        let (hash, outcome) = result?;
        response.insert(hash, outcome);
    }
    Ok(Json(response))
}

/// Combined level lookup response.
#[derive(Debug, Serialize)]
pub struct LevelTokenResponse {
    /// Level digits as supplied, followed by the identifier.
    #[serde(rename = "Result")]
    pub result: String,
    /// Address of `result` in the content store.
    #[serde(rename = "CID")]
    pub cid: ContentAddress,
}

/// GET /v1/leveltoken/{level_hash}
///
/// Resolves `<level>-<hash>`, publishes `<level><identifier>`, and returns
/// both the derived string and its content address.
pub async fn level_token(
    State(state): State<AppState>,
    Path(level_hash): Path<String>,
) -> ApiResult<Json<LevelTokenResponse>> {
    let parsed = LevelHash::parse(&level_hash)?;
    let identifier = state
        .index
        .lookup(&parsed.hash)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("hash not found: {}", parsed.hash)))?;

    let result = format!("{}{}", parsed.level, identifier);
    let cid = match state.publisher.publish(&result).await {
        Ok(cid) => {
            metrics::record_publish("ok");
            cid
        }
        Err(e) => {
            metrics::record_publish("error");
            return Err(e.into());
        }
    };
    tracing::debug!(result = %result, cid = %cid, publisher = state.publisher.name(), "Published level token");

    Ok(Json(LevelTokenResponse { result, cid }))
}
