//! In-memory index store.
//!
//! Also provides the immutable published table that the flat-file store
//! loads into.

use crate::error::{IndexError, IndexResult};
use crate::models::IndexEntry;
use crate::state::{BuildGuard, Readiness};
use crate::store::{IndexStore, IndexWriter};
use async_trait::async_trait;
use quotagate_core::{ContentHash, Identifier};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Hash to identifier map, immutable once built.
pub(crate) type HashTable = HashMap<ContentHash, Identifier>;

/// Holder for the currently published table.
///
/// Readers clone the inner `Arc` and query without holding the lock.
#[derive(Debug, Default)]
pub(crate) struct PublishedTable {
    current: RwLock<Option<Arc<HashTable>>>,
}

impl PublishedTable {
    pub(crate) async fn publish(&self, table: HashTable) {
        *self.current.write().await = Some(Arc::new(table));
    }

    pub(crate) async fn get(&self, hash: &ContentHash) -> Option<Identifier> {
        let table = self.current.read().await.clone()?;
        table.get(hash).copied()
    }

    pub(crate) async fn len(&self) -> u64 {
        self.current
            .read()
            .await
            .as_ref()
            .map_or(0, |t| t.len() as u64)
    }
}

/// Insert an entry into a table under construction, rejecting duplicate hashes.
pub(crate) fn insert_unique(table: &mut HashTable, entry: &IndexEntry) -> IndexResult<()> {
    match table.entry(entry.hash) {
        Entry::Occupied(existing) => Err(IndexError::Duplicate(format!(
            "hash {} maps to both {} and {}",
            entry.hash,
            existing.get(),
            entry.identifier
        ))),
        Entry::Vacant(slot) => {
            slot.insert(entry.identifier);
            Ok(())
        }
    }
}

/// Index store that lives only in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readiness: Arc<Readiness>,
    table: Arc<PublishedTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    async fn load_existing(&self, _expected: u64) -> IndexResult<Option<u64>> {
        Ok(None)
    }

    async fn begin_build(&self) -> IndexResult<Box<dyn IndexWriter>> {
        let guard = self.readiness.begin_build()?;
        Ok(Box::new(MemoryWriter {
            guard,
            table: Arc::clone(&self.table),
            entries: HashTable::new(),
        }))
    }

    async fn lookup(&self, hash: &ContentHash) -> IndexResult<Option<Identifier>> {
        self.readiness.ensure_ready()?;
        Ok(self.table.get(hash).await)
    }

    async fn len(&self) -> IndexResult<u64> {
        Ok(self.table.len().await)
    }

    async fn health_check(&self) -> IndexResult<()> {
        Ok(())
    }
}

struct MemoryWriter {
    guard: BuildGuard,
    table: Arc<PublishedTable>,
    entries: HashTable,
}

#[async_trait]
impl IndexWriter for MemoryWriter {
    async fn append(&mut self, entries: &[IndexEntry]) -> IndexResult<()> {
        self.entries.reserve(entries.len());
        for entry in entries {
            insert_unique(&mut self.entries, entry)?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>, expected: u64) -> IndexResult<u64> {
        let MemoryWriter {
            guard,
            table,
            entries,
        } = *self;
        let actual = entries.len() as u64;
        if actual != expected {
            return Err(IndexError::Incomplete { expected, actual });
        }
        table.publish(entries).await;
        guard.complete();
        Ok(actual)
    }

    async fn abort(self: Box<Self>) {
        tracing::debug!(entries = self.entries.len(), "Discarding in-memory build");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StoreState;

    #[tokio::test]
    async fn test_lookup_requires_ready() {
        let store = MemoryStore::new();
        let hash = ContentHash::of_identifier(1);
        assert!(matches!(
            store.lookup(&hash).await,
            Err(IndexError::NotReady(StoreState::NotReady))
        ));
    }

    #[tokio::test]
    async fn test_build_and_lookup() {
        let store = MemoryStore::new();
        let mut writer = store.begin_build().await.unwrap();
        let entries: Vec<_> = (0..=10).map(IndexEntry::compute).collect();
        writer.append(&entries).await.unwrap();
        assert_eq!(store.state(), StoreState::Building);
        assert_eq!(writer.commit(11).await.unwrap(), 11);

        assert_eq!(store.state(), StoreState::Ready);
        assert_eq!(store.len().await.unwrap(), 11);
        assert_eq!(
            store.lookup(&ContentHash::of_identifier(7)).await.unwrap(),
            Some(7)
        );
        assert_eq!(
            store.lookup(&ContentHash::of_identifier(11)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_duplicate_entry_rejected() {
        let store = MemoryStore::new();
        let mut writer = store.begin_build().await.unwrap();
        let entry = IndexEntry::compute(3);
        let err = writer.append(&[entry, entry]).await.unwrap_err();
        assert!(matches!(err, IndexError::Duplicate(_)));
        writer.abort().await;
        assert_eq!(store.state(), StoreState::Failed);
    }

    #[tokio::test]
    async fn test_incomplete_commit_fails_store() {
        let store = MemoryStore::new();
        let mut writer = store.begin_build().await.unwrap();
        writer.append(&[IndexEntry::compute(0)]).await.unwrap();
        let err = writer.commit(2).await.unwrap_err();
        assert!(matches!(
            err,
            IndexError::Incomplete {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(store.state(), StoreState::Failed);
    }
}
