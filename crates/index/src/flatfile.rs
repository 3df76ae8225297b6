//! Flat-file index store.
//!
//! The persisted form is one `identifier:hexhash` record per line, in no
//! particular order. A build writes to a sibling `.building` file that is
//! renamed into place only after a complete, synced write. The whole file is
//! loaded into an immutable in-memory table that concurrent lookups share.

use crate::error::{IndexError, IndexResult};
use crate::memory::{HashTable, PublishedTable, insert_unique};
use crate::models::IndexEntry;
use crate::state::{BuildGuard, Readiness};
use crate::store::{IndexStore, IndexWriter};
use async_trait::async_trait;
use quotagate_core::{ContentHash, Identifier};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

/// I/O buffer size for reading and writing index files.
pub const IO_BUFFER_SIZE: usize = 1024 * 1024;

/// Render one record, including the trailing newline.
pub fn format_record(entry: &IndexEntry) -> String {
    format!("{}:{}\n", entry.identifier, entry.hash)
}

/// Parse one record (without the trailing newline).
pub fn parse_record(line: &str, line_no: u64) -> IndexResult<IndexEntry> {
    let corrupt = |reason: String| IndexError::Corrupt {
        line: line_no,
        reason,
    };
    let (identifier, hash) = line
        .split_once(':')
        .ok_or_else(|| corrupt("missing ':' separator".to_string()))?;
    let identifier: Identifier = identifier
        .parse()
        .map_err(|e| corrupt(format!("invalid identifier {identifier:?}: {e}")))?;
    let hash = ContentHash::from_hex(hash).map_err(|e| corrupt(e.to_string()))?;
    Ok(IndexEntry { identifier, hash })
}

/// Index store backed by a newline-delimited file.
#[derive(Debug)]
pub struct FlatFileStore {
    path: PathBuf,
    readiness: Arc<Readiness>,
    table: Arc<PublishedTable>,
}

impl FlatFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            readiness: Arc::new(Readiness::new()),
            table: Arc::new(PublishedTable::default()),
        }
    }

    /// Path of the published index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn building_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".building");
        PathBuf::from(name)
    }

    async fn read_table(&self) -> IndexResult<HashTable> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::with_capacity(IO_BUFFER_SIZE, file).lines();
        let mut table = HashTable::new();
        let mut line_no = 0u64;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.is_empty() {
                continue;
            }
            insert_unique(&mut table, &parse_record(&line, line_no)?)?;
        }
        Ok(table)
    }
}

#[async_trait]
impl IndexStore for FlatFileStore {
    fn backend_name(&self) -> &'static str {
        "flatfile"
    }

    fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    async fn load_existing(&self, expected: u64) -> IndexResult<Option<u64>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let guard = self.readiness.begin_build()?;
        let table = self.read_table().await?;
        let entries = table.len() as u64;
        if entries != expected {
            return Err(IndexError::Incomplete {
                expected,
                actual: entries,
            });
        }
        self.table.publish(table).await;
        guard.complete();
        tracing::info!(path = %self.path.display(), entries, "Loaded index file");
        Ok(Some(entries))
    }

    async fn begin_build(&self) -> IndexResult<Box<dyn IndexWriter>> {
        let guard = self.readiness.begin_build()?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = self.building_path();
        let file = File::create(&temp_path).await?;
        Ok(Box::new(FlatFileWriter {
            guard,
            file: BufWriter::with_capacity(IO_BUFFER_SIZE, file),
            temp: PartialFile::new(temp_path),
            final_path: self.path.clone(),
            published: Arc::clone(&self.table),
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

/// A `.building` file that is deleted when dropped unless kept.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn keep(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove partial index file"
            );
        }
    }
}

struct FlatFileWriter {
    guard: BuildGuard,
    file: BufWriter<File>,
    temp: PartialFile,
    final_path: PathBuf,
    published: Arc<PublishedTable>,
    entries: HashTable,
}

impl FlatFileWriter {
    async fn finish(&mut self, expected: u64) -> IndexResult<u64> {
        let actual = self.entries.len() as u64;
        if actual != expected {
            return Err(IndexError::Incomplete { expected, actual });
        }
        self.file.flush().await?;
        self.file.get_ref().sync_all().await?;
        tokio::fs::rename(&self.temp.path, &self.final_path).await?;
        self.temp.keep();
        Ok(actual)
    }

    async fn discard(&mut self) {
        if let Err(e) = tokio::fs::remove_file(&self.temp.path).await {
            tracing::warn!(
                path = %self.temp.path.display(),
                error = %e,
                "Failed to remove partial index file"
            );
        }
        self.temp.keep();
    }
}

#[async_trait]
impl IndexWriter for FlatFileWriter {
    async fn append(&mut self, entries: &[IndexEntry]) -> IndexResult<()> {
        self.entries.reserve(entries.len());
        for entry in entries {
            insert_unique(&mut self.entries, entry)?;
            self.file.write_all(format_record(entry).as_bytes()).await?;
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>, expected: u64) -> IndexResult<u64> {
        match self.finish(expected).await {
            Ok(actual) => {
                let FlatFileWriter {
                    guard,
                    published,
                    entries,
                    final_path,
                    ..
                } = *self;
                published.publish(entries).await;
                guard.complete();
                tracing::info!(path = %final_path.display(), entries = actual, "Index file written");
                Ok(actual)
            }
            Err(e) => {
                self.discard().await;
                Err(e)
            }
        }
    }

    async fn abort(mut self: Box<Self>) {
        self.discard().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_format() {
        let entry = IndexEntry::compute(100);
        assert_eq!(
            format_record(&entry),
            "100:ad57366865126e55649ecb23ae1d48887544976efea46a48eb5d85a6eeb4d306\n"
        );
        let parsed = parse_record(format_record(&entry).trim_end(), 1).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_parse_record_rejects_garbage() {
        let hash = ContentHash::of_identifier(1);
        for line in [
            "no separator".to_string(),
            format!("-1:{hash}"),
            format!("x:{hash}"),
            "1:abc".to_string(),
            format!("1:{hash}:extra"),
        ] {
            match parse_record(&line, 9) {
                Err(IndexError::Corrupt { line: 9, .. }) => {}
                other => panic!("{line:?}: unexpected {other:?}"),
            }
        }
    }
}
