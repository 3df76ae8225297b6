//! Bounded-concurrency index builder.
//!
//! `concurrency` hashing workers claim identifiers from a shared counter and
//! send entries into a bounded queue. A single writer task drains the queue
//! and appends batches to the store. Workers block while the queue is full,
//! so memory use is bounded by the queue capacity regardless of the size of
//! the identifier space.

use crate::error::{IndexError, IndexResult};
use crate::models::{BuildReport, IndexEntry};
use crate::store::{IndexStore, IndexWriter};
use quotagate_core::Identifier;
use quotagate_core::config::BuildConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Parameters for one build.
#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Highest identifier to hash.
    pub limit: Identifier,
    /// Number of hashing workers.
    pub concurrency: usize,
    /// Capacity of the worker to writer queue.
    pub queue_capacity: usize,
    /// Entries per store append.
    pub write_batch_size: usize,
    /// Progress log interval in entries; 0 disables progress logging.
    pub progress_interval: u64,
}

impl From<&BuildConfig> for BuildOptions {
    fn from(config: &BuildConfig) -> Self {
        Self {
            limit: config.limit,
            concurrency: config.concurrency,
            queue_capacity: config.queue_capacity,
            write_batch_size: config.write_batch_size,
            progress_interval: config.progress_interval,
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from(&BuildConfig::default())
    }
}

impl BuildOptions {
    /// Number of entries a complete build writes.
    pub fn expected_entries(&self) -> u64 {
        self.limit + 1
    }

    fn validate(&self) -> IndexResult<()> {
        if self.concurrency == 0 || self.queue_capacity == 0 || self.write_batch_size == 0 {
            return Err(IndexError::Config(
                "concurrency, queue_capacity and write_batch_size must be at least 1".to_string(),
            ));
        }
        if self.limit == Identifier::MAX {
            return Err(IndexError::Config("limit is out of range".to_string()));
        }
        Ok(())
    }
}

/// Builds the hash index over `[0, limit]`.
#[derive(Clone, Debug)]
pub struct IndexBuilder {
    options: BuildOptions,
}

impl IndexBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build the index into `store`.
    pub async fn build(&self, store: &dyn IndexStore) -> IndexResult<BuildReport> {
        self.build_with_cancel(store, &CancellationToken::new())
            .await
    }

    /// Build the index into `store`, stopping early if `cancel` fires.
    ///
    /// The store becomes `Ready` only when every identifier has been hashed,
    /// drained from the queue, and committed. Any failure, panic, or
    /// cancellation aborts the writer and leaves the store `Failed`.
    pub async fn build_with_cancel(
        &self,
        store: &dyn IndexStore,
        cancel: &CancellationToken,
    ) -> IndexResult<BuildReport> {
        self.options.validate()?;
        let started = Instant::now();
        let expected = self.options.expected_entries();

        tracing::info!(
            backend = store.backend_name(),
            limit = self.options.limit,
            concurrency = self.options.concurrency,
            queue_capacity = self.options.queue_capacity,
            "Starting index build"
        );

        let writer = store.begin_build().await?;
        let (tx, rx) = mpsc::channel(self.options.queue_capacity);
        let next = Arc::new(AtomicU64::new(0));
        let stop = cancel.child_token();

        let mut workers = JoinSet::new();
        for _ in 0..self.options.concurrency {
            workers.spawn(hash_worker(
                Arc::clone(&next),
                self.options.limit,
                tx.clone(),
                stop.clone(),
            ));
        }
        // The queue closes once every worker has dropped its sender.
        drop(tx);

        // Owned by this future: dropping the build aborts the writer task too.
        let mut consumer = JoinSet::new();
        consumer.spawn(drain_queue(
            writer,
            rx,
            self.options.write_batch_size,
            self.options.progress_interval,
            expected,
            stop.clone(),
        ));

        let mut worker_failure = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                stop.cancel();
                worker_failure.get_or_insert_with(|| e.to_string());
            }
        }

        let (writer, drained) = consumer
            .join_next()
            .await
            .ok_or_else(|| IndexError::Internal("index writer task missing".to_string()))?
            .map_err(|e| IndexError::Internal(format!("index writer task failed: {e}")))?;

        if cancel.is_cancelled() {
            writer.abort().await;
            tracing::warn!("Index build cancelled");
            return Err(IndexError::Cancelled);
        }
        if let Some(reason) = worker_failure {
            writer.abort().await;
            return Err(IndexError::Internal(format!(
                "hashing worker failed: {reason}"
            )));
        }
        if let Err(e) = drained {
            writer.abort().await;
            return Err(e);
        }

        let entries = writer.commit(expected).await?;
        let report = BuildReport {
            entries,
            limit: self.options.limit,
            concurrency: self.options.concurrency,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            backend = store.backend_name(),
            entries = report.entries,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Index build complete"
        );
        Ok(report)
    }
}

async fn hash_worker(
    next: Arc<AtomicU64>,
    limit: Identifier,
    tx: mpsc::Sender<IndexEntry>,
    stop: CancellationToken,
) {
    loop {
        let identifier = next.fetch_add(1, Ordering::Relaxed);
        if identifier > limit {
            break;
        }
        let entry = IndexEntry::compute(identifier);
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            sent = tx.send(entry) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

async fn drain_queue(
    mut writer: Box<dyn IndexWriter>,
    mut rx: mpsc::Receiver<IndexEntry>,
    batch_size: usize,
    progress_interval: u64,
    expected: u64,
    stop: CancellationToken,
) -> (Box<dyn IndexWriter>, IndexResult<u64>) {
    let mut batch = Vec::with_capacity(batch_size);
    let mut written = 0u64;
    let mut next_progress = progress_interval;

    let result: IndexResult<u64> = async {
        loop {
            let received = rx.recv().await;
            let closed = received.is_none();
            if let Some(entry) = received {
                batch.push(entry);
            }
            if batch.len() >= batch_size || (closed && !batch.is_empty()) {
                writer.append(&batch).await?;
                written += batch.len() as u64;
                batch.clear();

                if progress_interval > 0 && written >= next_progress {
                    tracing::info!(written, expected, "Index build progress");
                    next_progress = written - written % progress_interval + progress_interval;
                }
            }
            if closed {
                return Ok(written);
            }
        }
    }
    .await;

    if result.is_err() {
        // Unblock workers waiting on a full queue.
        stop.cancel();
        rx.close();
    }
    (writer, result)
}
