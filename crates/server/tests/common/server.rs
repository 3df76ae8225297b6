//! Server test utilities.

use super::fixtures::RecordingPublisher;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use quotagate_core::config::AppConfig;
use quotagate_core::{Identifier, QuotaTable};
use quotagate_index::{IndexBuilder, IndexEntry, IndexStore, MemoryStore};
use quotagate_server::publish::{ContentPublisher, DisabledPublisher};
use quotagate_server::{AppState, create_router};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub publisher: Arc<RecordingPublisher>,
}

#[allow(dead_code)]
impl TestServer {
    /// Server over a fully built in-memory index of `[0, 1000]`.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Server over a fully built index, with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = AppConfig::for_testing();
        modifier(&mut config);

        let index = Arc::new(MemoryStore::new());
        IndexBuilder::new((&config.build).into())
            .build(index.as_ref())
            .await
            .expect("Failed to build test index");
        Self::assemble(config, index)
    }

    /// Server over an index holding exactly `ids`.
    pub async fn with_ids(ids: &[Identifier]) -> Self {
        let index = Arc::new(MemoryStore::new());
        let mut writer = index.begin_build().await.expect("Failed to begin build");
        let entries: Vec<_> = ids.iter().copied().map(IndexEntry::compute).collect();
        writer.append(&entries).await.expect("Failed to append");
        writer
            .commit(ids.len() as u64)
            .await
            .expect("Failed to commit");
        Self::assemble(AppConfig::for_testing(), index)
    }

    /// Server whose index has not been built.
    pub fn unready() -> Self {
        Self::assemble(AppConfig::for_testing(), Arc::new(MemoryStore::new()))
    }

    /// Replace the publisher with one that reports publishing as disabled.
    pub fn without_publisher(mut self) -> Self {
        let state = AppState {
            publisher: Arc::new(DisabledPublisher) as Arc<dyn ContentPublisher>,
            ..self.state.clone()
        };
        self.router = create_router(state.clone());
        self.state = state;
        self
    }

    fn assemble(config: AppConfig, index: Arc<dyn IndexStore>) -> Self {
        let publisher = Arc::new(RecordingPublisher::default());
        let state = AppState::new(
            config,
            index,
            QuotaTable::default(),
            publisher.clone(),
            CancellationToken::new(),
        );
        let router = create_router(state.clone());
        Self {
            router,
            state,
            publisher,
        }
    }

    /// Send a request with an optional raw body and decode the JSON response.
    pub async fn request(&self, method: &str, uri: &str, body: Option<Vec<u8>>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(bytes) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(bytes)
            }
            None => Body::empty(),
        };

        let request = builder.body(body).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    /// Send a JSON request.
    pub async fn json_request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request(method, uri, body.map(|v| serde_json::to_vec(&v).unwrap()))
            .await
    }
}
