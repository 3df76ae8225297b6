//! SQLite index store.

use crate::error::{IndexError, IndexResult};
use crate::models::IndexEntry;
use crate::state::{BuildGuard, Readiness};
use crate::store::{IndexStore, IndexWriter};
use async_trait::async_trait;
use quotagate_core::{ContentHash, Identifier};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Rows per INSERT statement, kept well below SQLite's bind parameter limit.
const MAX_ROWS_PER_INSERT: usize = 500;

/// SQLite-backed index store.
///
/// Lookups go straight to the `content_hash` unique index, so nothing is held
/// in memory. A build replaces all rows inside one transaction and records a
/// completion marker, so an interrupted build leaves the previous index intact
/// on disk.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    readiness: Arc<Readiness>,
}

impl SqliteStore {
    /// Open (or create) a SQLite index database.
    pub async fn new(path: impl AsRef<Path>, max_connections: u32) -> IndexResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Readers wait out the build transaction's commit instead of failing.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            readiness: Arc::new(Readiness::new()),
        };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn migrate(&self) -> IndexResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl IndexStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    async fn load_existing(&self, expected: u64) -> IndexResult<Option<u64>> {
        let marker: Option<i64> =
            sqlx::query_scalar("SELECT entry_count FROM index_builds WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        let Some(entries) = marker else {
            return Ok(None);
        };
        let guard = self.readiness.begin_build()?;
        let entries = entries as u64;
        if entries != expected {
            return Err(IndexError::Incomplete {
                expected,
                actual: entries,
            });
        }
        guard.complete();
        tracing::info!(entries, "Loaded SQLite index");
        Ok(Some(entries))
    }

    async fn begin_build(&self) -> IndexResult<Box<dyn IndexWriter>> {
        let guard = self.readiness.begin_build()?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM index_builds")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM index_entries")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(SqliteWriter {
            guard,
            tx,
            written: 0,
        }))
    }

    async fn lookup(&self, hash: &ContentHash) -> IndexResult<Option<Identifier>> {
        self.readiness.ensure_ready()?;
        let identifier: Option<i64> =
            sqlx::query_scalar("SELECT identifier FROM index_entries WHERE content_hash = ?")
                .bind(hash.to_hex())
                .fetch_optional(&self.pool)
                .await?;
        identifier
            .map(|id| {
                Identifier::try_from(id)
                    .map_err(|_| IndexError::Internal(format!("negative identifier {id} in index")))
            })
            .transpose()
    }

    async fn len(&self) -> IndexResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn health_check(&self) -> IndexResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct SqliteWriter {
    guard: BuildGuard,
    tx: Transaction<'static, Sqlite>,
    written: u64,
}

#[async_trait]
impl IndexWriter for SqliteWriter {
    async fn append(&mut self, entries: &[IndexEntry]) -> IndexResult<()> {
        for chunk in entries.chunks(MAX_ROWS_PER_INSERT) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO index_entries (identifier, content_hash) ");
            qb.push_values(chunk, |mut row, entry| {
                row.push_bind(entry.identifier as i64)
                    .push_bind(entry.hash.to_hex());
            });
            qb.build()
                .execute(&mut *self.tx)
                .await
                .map_err(|e| {
                    let unique = e
                        .as_database_error()
                        .is_some_and(|db| db.is_unique_violation());
                    if unique {
                        IndexError::Duplicate(e.to_string())
                    } else {
                        IndexError::Database(e)
                    }
                })?;
            self.written += chunk.len() as u64;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>, expected: u64) -> IndexResult<u64> {
        let SqliteWriter {
            guard,
            mut tx,
            written,
        } = *self;
        if written != expected {
            // Dropping the transaction rolls it back.
            return Err(IndexError::Incomplete {
                expected,
                actual: written,
            });
        }
        sqlx::query("INSERT INTO index_builds (id, entry_count, completed_at) VALUES (1, ?, ?)")
            .bind(written as i64)
            .bind(OffsetDateTime::now_utc())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        guard.complete();
        tracing::info!(entries = written, "SQLite index committed");
        Ok(written)
    }

    async fn abort(self: Box<Self>) {
        if let Err(e) = self.tx.rollback().await {
            tracing::warn!(error = %e, "Failed to roll back index build");
        }
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS index_entries (
    identifier INTEGER PRIMARY KEY,
    content_hash TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_index_entries_hash ON index_entries(content_hash);

CREATE TABLE IF NOT EXISTS index_builds (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    entry_count INTEGER NOT NULL,
    completed_at TEXT NOT NULL
);
"#;
