//! Common test utilities for verifier tests.

use async_trait::async_trait;
use quotagate_core::{ContentHash, Identifier, Level, QuotaTable, token};
use quotagate_index::{
    IndexEntry, IndexError, IndexResult, IndexStore, IndexWriter, MemoryStore, Readiness,
};
use quotagate_verifier::{EngineOptions, VerificationEngine};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Identifiers present in the fixture index.
#[allow(dead_code)]
pub const FIXTURE_IDS: [Identifier; 6] = [0, 1, 100, 2_079_134, 2_079_135, 2_100_000];

/// Build a ready in-memory index holding exactly `ids`.
#[allow(dead_code)]
pub async fn ready_store(ids: &[Identifier]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let mut writer = store.begin_build().await.unwrap();
    let entries: Vec<_> = ids.iter().copied().map(IndexEntry::compute).collect();
    writer.append(&entries).await.unwrap();
    writer.commit(ids.len() as u64).await.unwrap();
    store
}

/// Engine over `store` with the default quota table.
#[allow(dead_code)]
pub fn engine_over(store: Arc<dyn IndexStore>, options: EngineOptions) -> VerificationEngine {
    VerificationEngine::new(store, Arc::new(QuotaTable::default()), options)
}

/// Token for `identifier` at `level`.
#[allow(dead_code)]
pub fn token_for(level: u16, identifier: Identifier) -> String {
    token::encode(Level::new(level), &ContentHash::of_identifier(identifier))
}

/// Lookup behaviour injected by [`FaultyStore`].
#[allow(dead_code)]
pub enum Fault {
    /// Fail the first `n` lookups with an I/O error.
    TransientFailures(usize),
    /// Fail every lookup with an I/O error.
    AlwaysFail,
    /// Delay every lookup.
    Delay(Duration),
}

/// Ready store wrapper that injects lookup faults.
#[allow(dead_code)]
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    fault: Fault,
    lookups: AtomicUsize,
}

#[allow(dead_code)]
impl FaultyStore {
    pub async fn new(ids: &[Identifier], fault: Fault) -> Self {
        Self {
            inner: ready_store(ids).await,
            fault,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexStore for FaultyStore {
    fn backend_name(&self) -> &'static str {
        "faulty"
    }

    fn readiness(&self) -> &Readiness {
        self.inner.readiness()
    }

    async fn load_existing(&self, _expected: u64) -> IndexResult<Option<u64>> {
        Ok(None)
    }

    async fn begin_build(&self) -> IndexResult<Box<dyn IndexWriter>> {
        self.inner.begin_build().await
    }

    async fn lookup(&self, hash: &ContentHash) -> IndexResult<Option<Identifier>> {
        let attempt = self.lookups.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::TransientFailures(n) if attempt < n => {
                Err(IndexError::Io(std::io::Error::other("transient")))
            }
            Fault::AlwaysFail => Err(IndexError::Io(std::io::Error::other("down"))),
            Fault::Delay(delay) => {
                tokio::time::sleep(delay).await;
                self.inner.lookup(hash).await
            }
            _ => self.inner.lookup(hash).await,
        }
    }

    async fn len(&self) -> IndexResult<u64> {
        self.inner.len().await
    }

    async fn health_check(&self) -> IndexResult<()> {
        Ok(())
    }
}
