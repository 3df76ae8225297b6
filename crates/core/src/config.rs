//! Configuration types shared across crates.

use crate::hash::Identifier;
use crate::quota::QuotaTable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum number of tokens accepted in one verification request.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Maximum number of tokens verified concurrently within one batch.
    #[serde(default = "default_verify_concurrency")]
    pub verify_concurrency: usize,
    /// Deadline for a whole verification batch in milliseconds.
    /// A batch that misses the deadline fails as a whole; no partial result is returned.
    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_batch_size() -> usize {
    10_000
}

fn default_verify_concurrency() -> usize {
    256
}

fn default_verify_timeout_ms() -> u64 {
    30_000
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_batch_size: default_max_batch_size(),
            verify_concurrency: default_verify_concurrency(),
            verify_timeout_ms: default_verify_timeout_ms(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Get the verification deadline as a Duration.
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    /// Validate server configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_batch_size == 0 {
            return Err("server.max_batch_size must be at least 1".to_string());
        }
        if self.verify_concurrency == 0 {
            return Err("server.verify_concurrency must be at least 1".to_string());
        }
        if self.verify_timeout_ms == 0 {
            return Err("server.verify_timeout_ms must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Index store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IndexConfig {
    /// Newline-delimited `identifier:hash` file, loaded fully into memory.
    #[serde(rename = "flatfile")]
    FlatFile {
        /// Index file path.
        path: PathBuf,
    },
    /// SQLite database with an indexed hash column.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Maximum connections in the pool.
        #[serde(default = "default_sqlite_max_connections")]
        max_connections: u32,
    },
    /// In-memory only; rebuilt on every start.
    Memory,
}

fn default_sqlite_max_connections() -> u32 {
    4
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::FlatFile {
            path: PathBuf::from("./data/token_hashes.txt"),
        }
    }
}

impl IndexConfig {
    /// Validate index configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            IndexConfig::Sqlite {
                max_connections, ..
            } if *max_connections == 0 => {
                Err("index.max_connections must be at least 1".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// When to build the index at startup.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BuildPolicy {
    /// Reuse a complete persisted index; build only if none exists.
    #[default]
    IfMissing,
    /// Always rebuild, discarding any persisted index.
    Always,
    /// Never build; serve only a persisted index.
    Never,
}

/// Index build configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Highest identifier to hash; the index holds `limit + 1` entries.
    #[serde(default = "default_limit")]
    pub limit: Identifier,
    /// Number of concurrent hashing workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Capacity of the queue between the workers and the writer.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Entries handed to the store per write.
    #[serde(default = "default_write_batch_size")]
    pub write_batch_size: usize,
    /// Log build progress every this many entries (0 disables progress logs).
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    /// Startup build policy.
    #[serde(default)]
    pub policy: BuildPolicy,
}

fn default_limit() -> Identifier {
    crate::DEFAULT_HASH_LIMIT
}

fn default_concurrency() -> usize {
    crate::DEFAULT_BUILD_CONCURRENCY
}

fn default_queue_capacity() -> usize {
    crate::DEFAULT_QUEUE_CAPACITY
}

fn default_write_batch_size() -> usize {
    500
}

fn default_progress_interval() -> u64 {
    500_000
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
            write_batch_size: default_write_batch_size(),
            progress_interval: default_progress_interval(),
            policy: BuildPolicy::default(),
        }
    }
}

impl BuildConfig {
    /// Number of entries a complete build produces.
    pub fn expected_entries(&self) -> u64 {
        self.limit + 1
    }

    /// Validate build configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("build.concurrency must be at least 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("build.queue_capacity must be at least 1".to_string());
        }
        if self.write_batch_size == 0 {
            return Err("build.write_batch_size must be at least 1".to_string());
        }
        // SQLite stores identifiers as signed 64-bit integers.
        if self.limit >= i64::MAX as u64 {
            return Err(format!(
                "build.limit {} exceeds maximum value {}",
                self.limit,
                i64::MAX - 1
            ));
        }
        Ok(())
    }
}

/// Quota table configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Maximum identifier per level, starting at level 0.
    /// Uses the built-in table when unset.
    #[serde(default)]
    pub levels: Option<Vec<Identifier>>,
}

impl QuotaConfig {
    /// Build the quota table.
    pub fn to_table(&self) -> crate::Result<QuotaTable> {
        match &self.levels {
            Some(levels) => QuotaTable::new(levels.clone()),
            None => Ok(QuotaTable::default()),
        }
    }
}

/// Content publishing configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PublishConfig {
    /// Publishing disabled; the combined lookup endpoint reports unavailable.
    #[default]
    Disabled,
    /// IPFS node reached over its HTTP RPC API.
    Ipfs {
        /// RPC API base URL (e.g., "http://localhost:5002").
        #[serde(default = "default_ipfs_api_url")]
        api_url: String,
        /// Request timeout in seconds.
        #[serde(default = "default_publish_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_ipfs_api_url() -> String {
    "http://localhost:5002".to_string()
}

fn default_publish_timeout_secs() -> u64 {
    10
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Index store configuration.
    #[serde(default)]
    pub index: IndexConfig,
    /// Index build configuration.
    #[serde(default)]
    pub build: BuildConfig,
    /// Quota table configuration.
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Content publishing configuration.
    #[serde(default)]
    pub publish: PublishConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses an in-memory index over a small identifier space.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            index: IndexConfig::Memory,
            build: BuildConfig {
                limit: 1_000,
                concurrency: 8,
                queue_capacity: 64,
                progress_interval: 0,
                ..Default::default()
            },
            quota: QuotaConfig::default(),
            publish: PublishConfig::Disabled,
        }
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.index.validate()?;
        self.build.validate()?;
        self.quota.to_table().map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = AppConfig::default();
        assert_eq!(config.build.limit, 4_300_000);
        assert_eq!(config.build.concurrency, 100);
        assert_eq!(config.build.queue_capacity, 1000);
        assert_eq!(config.build.policy, BuildPolicy::IfMissing);
        assert!(matches!(config.publish, PublishConfig::Disabled));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_index_config_deserialize() {
        let config: IndexConfig =
            serde_json::from_str(r#"{"type":"flatfile","path":"/tmp/idx.txt"}"#).unwrap();
        assert!(matches!(config, IndexConfig::FlatFile { .. }));

        let config: IndexConfig =
            serde_json::from_str(r#"{"type":"sqlite","path":"/tmp/idx.db"}"#).unwrap();
        match config {
            IndexConfig::Sqlite {
                max_connections, ..
            } => assert_eq!(max_connections, 4),
            other => panic!("expected sqlite config, got {other:?}"),
        }

        let config: IndexConfig = serde_json::from_str(r#"{"type":"memory"}"#).unwrap();
        assert!(matches!(config, IndexConfig::Memory));
    }

    #[test]
    fn test_app_config_from_toml() {
        let toml_str = r#"
            [server]
            bind = "0.0.0.0:9000"
            verify_timeout_ms = 500

            [index]
            type = "sqlite"
            path = "./data/index.db"

            [build]
            limit = 10000
            policy = "always"

            [publish]
            type = "ipfs"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.verify_timeout(), Duration::from_millis(500));
        assert_eq!(config.build.limit, 10_000);
        assert_eq!(config.build.expected_entries(), 10_001);
        assert_eq!(config.build.policy, BuildPolicy::Always);
        assert_eq!(config.build.concurrency, 100);
        match config.publish {
            PublishConfig::Ipfs {
                api_url,
                timeout_secs,
            } => {
                assert_eq!(api_url, "http://localhost:5002");
                assert_eq!(timeout_secs, 10);
            }
            other => panic!("expected ipfs config, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let mut config = AppConfig::for_testing();
        config.build.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::for_testing();
        config.build.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::for_testing();
        config.server.verify_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_quota_override() {
        let levels: Vec<Identifier> = (0..crate::quota::LEVEL_COUNT as u64).map(|l| l * 10).collect();
        let config = QuotaConfig {
            levels: Some(levels),
        };
        let table = config.to_table().unwrap();
        assert_eq!(table.quota(crate::Level::new(1)), 10);

        let config = QuotaConfig {
            levels: Some(vec![0, 1, 2]),
        };
        assert!(config.to_table().is_err());
    }
}
