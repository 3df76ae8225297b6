//! Common test utilities for index tests.

use async_trait::async_trait;
use quotagate_core::{ContentHash, Identifier};
use quotagate_index::flatfile::parse_record;
use quotagate_index::{
    BuildOptions, IndexEntry, IndexError, IndexResult, IndexStore, IndexWriter, MemoryStore,
    Readiness,
};
use std::collections::BTreeSet;
use std::path::Path;

/// Small build options suitable for tests.
#[allow(dead_code)]
pub fn test_options(limit: Identifier, concurrency: usize) -> BuildOptions {
    BuildOptions {
        limit,
        concurrency,
        queue_capacity: 16,
        write_batch_size: 32,
        progress_interval: 0,
    }
}

/// Read a flat index file into an order-independent set of entries.
#[allow(dead_code)]
pub async fn read_entries(path: &Path) -> BTreeSet<(Identifier, ContentHash)> {
    let contents = tokio::fs::read_to_string(path).await.unwrap();
    contents
        .lines()
        .enumerate()
        .map(|(i, line)| {
            let entry = parse_record(line, i as u64 + 1).unwrap();
            (entry.identifier, entry.hash)
        })
        .collect()
}

/// Memory store whose writer fails on a chosen append call.
#[allow(dead_code)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_on_append: usize,
}

#[allow(dead_code)]
impl FailingStore {
    pub fn new(fail_on_append: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_on_append,
        }
    }
}

#[async_trait]
impl IndexStore for FailingStore {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    fn readiness(&self) -> &Readiness {
        self.inner.readiness()
    }

    async fn load_existing(&self, _expected: u64) -> IndexResult<Option<u64>> {
        Ok(None)
    }

    async fn begin_build(&self) -> IndexResult<Box<dyn IndexWriter>> {
        Ok(Box::new(FailingWriter {
            inner: self.inner.begin_build().await?,
            appends: 0,
            fail_on_append: self.fail_on_append,
        }))
    }

    async fn lookup(&self, hash: &ContentHash) -> IndexResult<Option<Identifier>> {
        self.inner.lookup(hash).await
    }

    async fn len(&self) -> IndexResult<u64> {
        self.inner.len().await
    }

    async fn health_check(&self) -> IndexResult<()> {
        Ok(())
    }
}

struct FailingWriter {
    inner: Box<dyn IndexWriter>,
    appends: usize,
    fail_on_append: usize,
}

#[async_trait]
impl IndexWriter for FailingWriter {
    async fn append(&mut self, entries: &[IndexEntry]) -> IndexResult<()> {
        self.appends += 1;
        if self.appends == self.fail_on_append {
            return Err(IndexError::Io(std::io::Error::other("disk full")));
        }
        self.inner.append(entries).await
    }

    async fn commit(self: Box<Self>, expected: u64) -> IndexResult<u64> {
        self.inner.commit(expected).await
    }

    async fn abort(self: Box<Self>) {
        self.inner.abort().await
    }
}
