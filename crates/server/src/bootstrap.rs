//! Startup index preparation.

use crate::metrics;
use anyhow::{Result, bail};
use quotagate_core::config::{BuildConfig, BuildPolicy};
use quotagate_index::{BuildOptions, BuildReport, IndexBuilder, IndexError, IndexResult, IndexStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a background index build.
pub type BuildHandle = JoinHandle<IndexResult<BuildReport>>;

/// Load or schedule the index according to the build policy.
///
/// Returns a handle when a build was started in the background. The server
/// can accept requests meanwhile; verification answers `503` until the build
/// commits.
pub async fn prepare_index(
    index: Arc<dyn IndexStore>,
    config: &BuildConfig,
    cancel: CancellationToken,
) -> Result<Option<BuildHandle>> {
    let expected = config.expected_entries();

    let needs_build = match config.policy {
        BuildPolicy::Always => true,
        BuildPolicy::IfMissing => match index.load_existing(expected).await {
            Ok(Some(_)) => false,
            Ok(None) => {
                tracing::info!("No persisted index found");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Persisted index is unusable, rebuilding");
                true
            }
        },
        BuildPolicy::Never => match index.load_existing(expected).await {
            Ok(Some(_)) => false,
            Ok(None) => bail!("build policy is 'never' but no persisted index exists"),
            Err(e) => bail!("failed to load persisted index: {e}"),
        },
    };

    if !needs_build {
        record_index_state(index.as_ref()).await;
        return Ok(None);
    }

    Ok(Some(spawn_build(index, BuildOptions::from(config), cancel)))
}

/// Run an index build in the background, recording metrics on completion.
pub fn spawn_build(
    index: Arc<dyn IndexStore>,
    options: BuildOptions,
    cancel: CancellationToken,
) -> BuildHandle {
    tokio::spawn(async move {
        metrics::INDEX_READY.set(0);
        let result = IndexBuilder::new(options)
            .build_with_cancel(index.as_ref(), &cancel)
            .await;

        match &result {
            Ok(report) => {
                metrics::INDEX_BUILDS.with_label_values(&["ok"]).inc();
                metrics::INDEX_BUILD_DURATION.observe(report.elapsed.as_secs_f64());
            }
            Err(IndexError::Cancelled) => {
                metrics::INDEX_BUILDS.with_label_values(&["cancelled"]).inc();
            }
            Err(e) => {
                metrics::INDEX_BUILDS.with_label_values(&["error"]).inc();
                tracing::error!(error = %e, "Index build failed");
            }
        }
        record_index_state(index.as_ref()).await;
        result
    })
}

async fn record_index_state(index: &dyn IndexStore) {
    let ready = index.state() == quotagate_index::StoreState::Ready;
    metrics::INDEX_READY.set(i64::from(ready));
    match index.len().await {
        Ok(entries) => metrics::INDEX_ENTRIES.set(entries as i64),
        Err(e) => tracing::debug!(error = %e, "Failed to read index size"),
    }
}

/// Wait for a background build.
///
/// Resolves `Ok` when there is nothing to wait for or the build succeeded or
/// was cancelled; resolves `Err` when the build failed.
pub async fn wait_for_build(handle: Option<BuildHandle>) -> Result<()> {
    let Some(handle) = handle else {
        return Ok(());
    };
    match handle.await {
        Ok(Ok(_)) | Ok(Err(IndexError::Cancelled)) => Ok(()),
        Ok(Err(e)) => Err(anyhow::Error::new(e).context("index build failed")),
        Err(e) => Err(anyhow::Error::new(e).context("index build task panicked")),
    }
}
