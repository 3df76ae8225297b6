//! Index store abstraction.

use crate::error::IndexResult;
use crate::models::IndexEntry;
use crate::state::{Readiness, StoreState};
use async_trait::async_trait;
use quotagate_core::{ContentHash, Identifier};

/// Durable mapping from content hash to identifier.
///
/// Stores are written once per build through an [`IndexWriter`] and are
/// read-only otherwise. Lookups are only answered while the store is
/// [`StoreState::Ready`].
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Short backend name for logs and stats.
    fn backend_name(&self) -> &'static str;

    /// Lifecycle state holder.
    fn readiness(&self) -> &Readiness;

    /// Current lifecycle state.
    fn state(&self) -> StoreState {
        self.readiness().current()
    }

    /// Wait until a build or load completes.
    async fn wait_ready(&self) -> IndexResult<()> {
        self.readiness().wait_ready().await
    }

    /// Load a previously persisted index holding exactly `expected` entries.
    ///
    /// Returns the number of entries loaded, or `None` if nothing was persisted.
    /// A persisted index of any other size is rejected with
    /// [`IndexError::Incomplete`](crate::IndexError::Incomplete) and leaves the
    /// store `Failed`.
    async fn load_existing(&self, expected: u64) -> IndexResult<Option<u64>>;

    /// Start a new build, moving the store to `Building`.
    async fn begin_build(&self) -> IndexResult<Box<dyn IndexWriter>>;

    /// Resolve a hash. `Ok(None)` means the hash is not in the index.
    async fn lookup(&self, hash: &ContentHash) -> IndexResult<Option<Identifier>>;

    /// Number of entries in the published index.
    async fn len(&self) -> IndexResult<u64>;

    /// Check backend connectivity.
    async fn health_check(&self) -> IndexResult<()>;
}

/// Write side of a single build.
///
/// A writer is finished by exactly one of [`commit`](IndexWriter::commit) or
/// [`abort`](IndexWriter::abort). A writer dropped without either leaves the
/// store `Failed`.
#[async_trait]
pub trait IndexWriter: Send {
    /// Persist a batch of entries.
    async fn append(&mut self, entries: &[IndexEntry]) -> IndexResult<()>;

    /// Flush, verify that `expected` entries were written, and publish the index.
    async fn commit(self: Box<Self>, expected: u64) -> IndexResult<u64>;

    /// Discard everything written by this build.
    async fn abort(self: Box<Self>);
}
