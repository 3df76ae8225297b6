//! Index readiness lifecycle.
//!
//! A store moves `NotReady -> Building -> Ready`. A failed or abandoned build
//! ends in `Failed`. Only a `Ready` store answers lookups; every other state
//! rejects them so callers never observe a partially written index.

use crate::error::{IndexError, IndexResult};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle state of an index store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    /// No index has been built or loaded.
    NotReady,
    /// A build or load is running.
    Building,
    /// A complete index is available.
    Ready,
    /// The last build or load failed.
    Failed,
}

impl StoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreState::NotReady => "not_ready",
            StoreState::Building => "building",
            StoreState::Ready => "ready",
            StoreState::Failed => "failed",
        }
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, observable store state.
#[derive(Debug)]
pub struct Readiness {
    tx: watch::Sender<StoreState>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StoreState::NotReady);
        Self { tx }
    }

    /// Current state.
    pub fn current(&self) -> StoreState {
        *self.tx.borrow()
    }

    /// Enter `Building`.
    ///
    /// Fails with [`IndexError::BuildInProgress`] if another build holds the
    /// store. The returned guard marks the store `Failed` unless it is
    /// completed.
    pub fn begin_build(self: &Arc<Self>) -> IndexResult<BuildGuard> {
        let mut busy = false;
        self.tx.send_if_modified(|state| {
            if *state == StoreState::Building {
                busy = true;
                false
            } else {
                *state = StoreState::Building;
                true
            }
        });
        if busy {
            return Err(IndexError::BuildInProgress);
        }
        Ok(BuildGuard {
            readiness: Arc::clone(self),
            done: false,
        })
    }

    fn set(&self, state: StoreState) {
        self.tx.send_replace(state);
    }

    /// Fail unless the store is `Ready`.
    pub fn ensure_ready(&self) -> IndexResult<()> {
        match self.current() {
            StoreState::Ready => Ok(()),
            other => Err(IndexError::NotReady(other)),
        }
    }

    /// Wait until the store is `Ready`.
    ///
    /// Returns an error as soon as the store enters `Failed`.
    pub async fn wait_ready(&self) -> IndexResult<()> {
        let mut rx = self.tx.subscribe();
        let state = *rx
            .wait_for(|s| matches!(s, StoreState::Ready | StoreState::Failed))
            .await
            .map_err(|_| IndexError::Internal("readiness channel closed".to_string()))?;
        match state {
            StoreState::Ready => Ok(()),
            other => Err(IndexError::NotReady(other)),
        }
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.tx.subscribe()
    }
}

/// Exclusive right to publish a new index.
///
/// Dropping the guard without calling [`BuildGuard::complete`] marks the
/// store `Failed`.
#[derive(Debug)]
pub struct BuildGuard {
    readiness: Arc<Readiness>,
    done: bool,
}

impl BuildGuard {
    /// Mark the store `Ready`.
    pub fn complete(mut self) {
        self.done = true;
        self.readiness.set(StoreState::Ready);
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        if !self.done {
            self.readiness.set(StoreState::Failed);
        }
    }
}
