//! Command-line tools for the quotagate hash index.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use quotagate_core::config::{AppConfig, BuildPolicy};
use quotagate_core::{ContentHash, Identifier, Level, token};
use quotagate_index::{IndexBuilder, IndexStore};
use quotagate_verifier::{EngineOptions, VerificationEngine};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "quotagate")]
#[command(about = "Build, inspect, and query the quotagate hash index")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "QUOTAGATE_CONFIG",
        default_value = "config/quotagate.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the configured index store, replacing any existing index
    BuildIndex {
        /// Highest identifier to hash (overrides build.limit)
        #[arg(long)]
        limit: Option<Identifier>,

        /// Number of hashing workers (overrides build.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Resolve a content hash to its identifier
    Lookup {
        /// 64 character lowercase hex hash
        hash: String,
    },
    /// Verify tokens and print a JSON map of token to validity
    Verify {
        /// Tokens to verify
        #[arg(required = true)]
        tokens: Vec<String>,
    },
    /// Print the content hash of an identifier
    Hash {
        /// Identifier to hash
        identifier: Identifier,

        /// Also print the token for this level
        #[arg(long, value_parser = clap::value_parser!(u16).range(0..=999))]
        level: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Hash { identifier, level } => {
            let hash = ContentHash::of_identifier(identifier);
            println!("{hash}");
            if let Some(level) = level {
                println!("{}", token::encode(Level::new(level), &hash));
            }
        }

        Commands::BuildIndex { limit, concurrency } => {
            let mut config = load_config(&cli.config)?;
            if let Some(limit) = limit {
                config.build.limit = limit;
            }
            if let Some(concurrency) = concurrency {
                config.build.concurrency = concurrency;
            }
            config
                .validate()
                .map_err(anyhow::Error::msg)
                .context("invalid configuration")?;

            let index = open_index(&config).await?;
            let cancel = cancel_on_ctrl_c();
            let report = IndexBuilder::new((&config.build).into())
                .build_with_cancel(index.as_ref(), &cancel)
                .await
                .context("index build failed")?;

            eprintln!(
                "Built {} entries with {} workers in {:.2?}",
                report.entries, report.concurrency, report.elapsed
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Lookup { hash } => {
            let config = load_validated_config(&cli.config)?;
            let parsed = ContentHash::from_hex(&hash).context("invalid hash")?;
            let index = ready_index(&config).await?;

            match index.lookup(&parsed).await? {
                Some(identifier) => {
                    let output = BTreeMap::from([(hash, identifier)]);
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                None => bail!("hash not found: {hash}"),
            }
        }

        Commands::Verify { tokens } => {
            let config = load_validated_config(&cli.config)?;
            let index = ready_index(&config).await?;
            let quotas = config.quota.to_table().context("invalid quota table")?;
            let engine = VerificationEngine::new(
                index,
                Arc::new(quotas),
                EngineOptions::from(&config.server),
            );

            let result = engine
                .verify_batch(tokens, &cancel_on_ctrl_c())
                .await
                .context("verification failed")?;
            let output: BTreeMap<_, _> = result
                .iter()
                .map(|(token, verdict)| (token, verdict.is_valid()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Load configuration from defaults, an optional TOML file, and `QUOTAGATE_*` variables.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if Path::new(path).exists() {
        tracing::debug!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(Env::prefixed("QUOTAGATE_").split("__"))
        .extract()
        .context("failed to load configuration")
}

fn load_validated_config(path: &str) -> Result<AppConfig> {
    let config = load_config(path)?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    Ok(config)
}

async fn open_index(config: &AppConfig) -> Result<Arc<dyn IndexStore>> {
    let index = quotagate_index::from_config(&config.index)
        .await
        .context("failed to open index store")?;
    index
        .health_check()
        .await
        .context("index store health check failed")?;
    Ok(index)
}

/// Open the index and make it ready for queries.
///
/// A persisted index must hold exactly `build.limit + 1` entries. Without one,
/// the index is built in process unless the build policy is `never`.
async fn ready_index(config: &AppConfig) -> Result<Arc<dyn IndexStore>> {
    let index = open_index(config).await?;
    if index
        .load_existing(config.build.expected_entries())
        .await
        .context("failed to load persisted index")?
        .is_some()
    {
        return Ok(index);
    }

    if config.build.policy == BuildPolicy::Never {
        bail!("no persisted index found; run `quotagate build-index` first");
    }
    tracing::info!(limit = config.build.limit, "No persisted index found, building");
    IndexBuilder::new((&config.build).into())
        .build_with_cancel(index.as_ref(), &cancel_on_ctrl_c())
        .await
        .context("index build failed")?;
    Ok(index)
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}
