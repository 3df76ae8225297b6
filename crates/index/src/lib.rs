//! Hash index for quotagate.
//!
//! This crate owns the mapping from content hash back to identifier:
//! - The [`IndexStore`] abstraction and its readiness lifecycle
//! - Flat-file, SQLite, and in-memory backends
//! - The bounded-concurrency [`IndexBuilder`]

pub mod builder;
pub mod error;
pub mod flatfile;
pub mod memory;
pub mod models;
pub mod sqlite;
pub mod state;
pub mod store;

pub use builder::{BuildOptions, IndexBuilder};
pub use error::{IndexError, IndexResult};
pub use flatfile::FlatFileStore;
pub use memory::MemoryStore;
pub use models::{BuildReport, IndexEntry};
pub use sqlite::SqliteStore;
pub use state::{Readiness, StoreState};
pub use store::{IndexStore, IndexWriter};

use quotagate_core::config::IndexConfig;
use std::sync::Arc;

/// Create an index store from configuration.
///
/// The returned store is `NotReady`; callers load or build it.
pub async fn from_config(config: &IndexConfig) -> IndexResult<Arc<dyn IndexStore>> {
    match config {
        IndexConfig::FlatFile { path } => {
            Ok(Arc::new(FlatFileStore::new(path.clone())) as Arc<dyn IndexStore>)
        }
        IndexConfig::Sqlite {
            path,
            max_connections,
        } => {
            let store = SqliteStore::new(path, *max_connections).await?;
            Ok(Arc::new(store) as Arc<dyn IndexStore>)
        }
        IndexConfig::Memory => Ok(Arc::new(MemoryStore::new()) as Arc<dyn IndexStore>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_backends() {
        let temp_dir = tempfile::tempdir().unwrap();

        let store = from_config(&IndexConfig::FlatFile {
            path: temp_dir.path().join("token_hashes.txt"),
        })
        .await
        .unwrap();
        assert_eq!(store.backend_name(), "flatfile");
        assert_eq!(store.state(), StoreState::NotReady);

        let store = from_config(&IndexConfig::Sqlite {
            path: temp_dir.path().join("index.db"),
            max_connections: 2,
        })
        .await
        .unwrap();
        assert_eq!(store.backend_name(), "sqlite");
        store.health_check().await.unwrap();

        let store = from_config(&IndexConfig::Memory).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
    }
}
