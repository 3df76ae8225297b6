//! Prometheus metrics for the quotagate server.
//!
//! Covers token verification outcomes, hash lookups, index builds, and
//! content publishing. Labels never carry tokens or hashes.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Verification metrics
pub static TOKENS_VERIFIED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "quotagate_tokens_verified_total",
            "Total number of tokens verified, by verdict",
        ),
        &["verdict"],
    )
    .expect("metric creation failed")
});

pub static VERIFY_BATCHES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "quotagate_verify_batches_total",
            "Total number of verification batches, by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static VERIFY_BATCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "quotagate_verify_batch_duration_seconds",
            "Time taken to verify a batch of tokens",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
    )
    .expect("metric creation failed")
});

// Lookup metrics
pub static HASH_LOOKUPS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "quotagate_hash_lookups_total",
            "Total number of direct hash lookups, by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

// Index metrics
pub static INDEX_BUILDS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "quotagate_index_builds_total",
            "Total number of index builds, by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static INDEX_BUILD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "quotagate_index_build_duration_seconds",
            "Time taken to build the hash index",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
    )
    .expect("metric creation failed")
});

pub static INDEX_ENTRIES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "quotagate_index_entries",
        "Number of entries in the published index",
    )
    .expect("metric creation failed")
});

pub static INDEX_READY: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "quotagate_index_ready",
        "Whether the index is ready to answer lookups (1) or not (0)",
    )
    .expect("metric creation failed")
});

// Publishing metrics
pub static PUBLISH_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "quotagate_publish_requests_total",
            "Total number of content publish requests, by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are no-ops.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(TOKENS_VERIFIED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(VERIFY_BATCHES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(VERIFY_BATCH_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(HASH_LOOKUPS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INDEX_BUILDS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INDEX_BUILD_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INDEX_ENTRIES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INDEX_READY.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PUBLISH_REQUESTS.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record a hash lookup outcome.
pub fn record_lookup(outcome: &str) {
    HASH_LOOKUPS.with_label_values(&[outcome]).inc();
}

/// Record a publish outcome.
pub fn record_publish(outcome: &str) {
    PUBLISH_REQUESTS.with_label_values(&[outcome]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        register_metrics();
        register_metrics();
        record_lookup("found");
        assert!(HASH_LOOKUPS.with_label_values(&["found"]).get() >= 1);
    }
}
