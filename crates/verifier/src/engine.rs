//! Verification engine.

use crate::error::{VerifierError, VerifierResult};
use crate::result::{TokenVerdict, VerificationResult};
use quotagate_core::config::ServerConfig;
use quotagate_core::{ContentHash, DecodedToken, Identifier, QuotaTable};
use quotagate_index::{IndexError, IndexStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Engine tuning.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Tokens verified concurrently within one batch.
    pub max_concurrency: usize,
    /// Deadline for a whole batch.
    pub batch_timeout: Option<Duration>,
    /// Largest accepted batch, counted before de-duplication.
    pub max_batch_size: Option<usize>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 256,
            batch_timeout: None,
            max_batch_size: None,
        }
    }
}

impl From<&ServerConfig> for EngineOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_concurrency: config.verify_concurrency,
            batch_timeout: Some(config.verify_timeout()),
            max_batch_size: Some(config.max_batch_size),
        }
    }
}

enum Resolved {
    Found(Identifier),
    Missing,
    Failed,
}

/// Decodes tokens, resolves them against the index, and applies quotas.
///
/// The engine holds no mutable state; cloning is cheap and clones share the
/// same index and quota table.
#[derive(Clone)]
pub struct VerificationEngine {
    index: Arc<dyn IndexStore>,
    quotas: Arc<QuotaTable>,
    options: EngineOptions,
}

impl VerificationEngine {
    pub fn new(index: Arc<dyn IndexStore>, quotas: Arc<QuotaTable>, options: EngineOptions) -> Self {
        Self {
            index,
            quotas,
            options,
        }
    }

    pub fn index(&self) -> &Arc<dyn IndexStore> {
        &self.index
    }

    pub fn quotas(&self) -> &QuotaTable {
        &self.quotas
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Classify a single token.
    ///
    /// Only an unready index is an error; every per-token problem yields a
    /// failing verdict.
    pub async fn check_token(&self, token: &str) -> VerifierResult<TokenVerdict> {
        let Ok(decoded) = DecodedToken::decode(token) else {
            return Ok(TokenVerdict::InvalidFormat);
        };
        let verdict = match self.resolve(&decoded.hash).await? {
            Resolved::Missing => TokenVerdict::NotFound,
            Resolved::Failed => TokenVerdict::LookupFailed,
            Resolved::Found(identifier) if self.quotas.permits(decoded.level, identifier) => {
                TokenVerdict::Valid
            }
            Resolved::Found(_) => TokenVerdict::OutOfQuota,
        };
        Ok(verdict)
    }

    /// Verify a single token.
    pub async fn verify_token(&self, token: &str) -> VerifierResult<bool> {
        Ok(self.check_token(token).await?.is_valid())
    }

    /// Verify a batch of tokens.
    ///
    /// Each distinct token is checked in its own task, at most
    /// `max_concurrency` at a time, and the result holds exactly one entry
    /// per distinct token. If `cancel` fires or the batch deadline passes,
    /// in-flight checks are aborted and no result is returned.
    pub async fn verify_batch(
        &self,
        tokens: Vec<String>,
        cancel: &CancellationToken,
    ) -> VerifierResult<VerificationResult> {
        if let Some(max) = self.options.max_batch_size
            && tokens.len() > max
        {
            return Err(VerifierError::BatchTooLarge {
                size: tokens.len(),
                max,
            });
        }
        self.index.readiness().ensure_ready()?;

        let work = self.run_batch(tokens);
        let bounded = async {
            match self.options.batch_timeout {
                Some(limit) => tokio::time::timeout(limit, work)
                    .await
                    .unwrap_or(Err(VerifierError::TimedOut(limit))),
                None => work.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Verification batch cancelled");
                Err(VerifierError::Cancelled)
            }
            result = bounded => result,
        }
    }

    async fn run_batch(&self, tokens: Vec<String>) -> VerifierResult<VerificationResult> {
        let unique: HashSet<String> = tokens.into_iter().collect();
        let permits = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for token in unique {
            let engine = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| VerifierError::Internal("verification semaphore closed".into()))?;
                let verdict = engine.check_token(&token).await?;
                Ok::<_, VerifierError>((token, verdict))
            });
        }

        // Tasks hand their verdicts back here; nothing else writes the result.
        // Returning early drops the JoinSet, which aborts the remaining tasks.
        let mut result = VerificationResult::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (token, verdict) = joined
                .map_err(|e| VerifierError::Internal(format!("verification task failed: {e}")))??;
            result.insert(token, verdict);
        }

        tracing::debug!(
            tokens = result.len(),
            valid = result.valid_count(),
            "Verified batch"
        );
        Ok(result)
    }

    /// Look up a hash, retrying a transient failure once.
    async fn resolve(&self, hash: &ContentHash) -> VerifierResult<Resolved> {
        let mut retried = false;
        loop {
            match self.index.lookup(hash).await {
                Ok(Some(identifier)) => return Ok(Resolved::Found(identifier)),
                Ok(None) => return Ok(Resolved::Missing),
                Err(IndexError::NotReady(state)) => return Err(VerifierError::NotReady(state)),
                Err(e) if e.is_transient() && !retried => {
                    tracing::debug!(error = %e, "Retrying index lookup");
                    retried = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, hash = %hash, "Index lookup failed; token rejected");
                    return Ok(Resolved::Failed);
                }
            }
        }
    }
}
