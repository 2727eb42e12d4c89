//! Transaction coordinator.
//!
//! A [`TransactionScope`] wraps one storage-native transaction and moves
//! through `Idle -> Open -> Committed | Aborted`. The coordinator runs a
//! [`UnitOfWork`] inside a fresh scope, commits only when every write of the
//! unit succeeded, aborts otherwise, and replays the unit when the backend
//! reported a write conflict.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::{CatalogError, CatalogResult},
    store::{CatalogStore, StoreScope},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Idle,
    Open,
    Committed,
    Aborted,
}

/// One all-or-nothing unit of storage writes
pub struct TransactionScope {
    label: &'static str,
    inner: Option<Box<dyn StoreScope>>,
    state: ScopeState,
}

impl TransactionScope {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            inner: None,
            state: ScopeState::Idle,
        }
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Begin the storage transaction. A scope is opened at most once.
    pub async fn open(&mut self, store: &dyn CatalogStore) -> CatalogResult<()> {
        if self.state != ScopeState::Idle {
            return Err(self.misuse("open"));
        }
        self.inner = Some(store.open().await?);
        self.state = ScopeState::Open;
        tracing::debug!("Scope {} opened", self.label);
        Ok(())
    }

    /// Storage handle bound to the open transaction.
    pub fn store(&mut self) -> CatalogResult<&mut dyn StoreScope> {
        if self.state != ScopeState::Open {
            return Err(self.misuse("use"));
        }
        match self.inner.as_deref_mut() {
            Some(inner) => Ok(inner),
            None => Err(CatalogError::Storage(format!(
                "scope {} lost its transaction",
                self.label
            ))),
        }
    }

    pub async fn commit(&mut self) -> CatalogResult<()> {
        let inner = self.take_open("commit")?;
        match inner.commit().await {
            Ok(()) => {
                self.state = ScopeState::Committed;
                tracing::debug!("Scope {} committed", self.label);
                Ok(())
            }
            Err(e) => {
                // a failed commit leaves nothing behind on any backend
                self.state = ScopeState::Aborted;
                Err(e)
            }
        }
    }

    pub async fn abort(&mut self) -> CatalogResult<()> {
        let inner = self.take_open("abort")?;
        self.state = ScopeState::Aborted;
        tracing::debug!("Scope {} aborted", self.label);
        inner.abort().await
    }

    fn take_open(&mut self, action: &str) -> CatalogResult<Box<dyn StoreScope>> {
        if self.state != ScopeState::Open {
            return Err(self.misuse(action));
        }
        self.inner.take().ok_or_else(|| {
            CatalogError::Storage(format!("scope {} lost its transaction", self.label))
        })
    }

    fn misuse(&self, action: &str) -> CatalogError {
        CatalogError::Storage(format!(
            "cannot {} scope {} in state {:?}",
            action, self.label, self.state
        ))
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.state == ScopeState::Open {
            // the backend discards the transaction when its handle is dropped
            tracing::warn!("Scope {} dropped while open", self.label);
        }
    }
}

/// A sequence of reads and writes that must commit together
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Output: Send;

    /// Short name used in logs
    fn label(&self) -> &'static str;

    /// Run against an open scope. May be called more than once when the
    /// backend reports a conflict, so it must not keep state between runs.
    async fn run(&self, scope: &mut dyn StoreScope) -> CatalogResult<Self::Output>;
}

#[derive(Clone)]
pub struct TransactionCoordinator {
    store: Arc<dyn CatalogStore>,
    max_attempts: u32,
}

impl TransactionCoordinator {
    pub fn new(store: Arc<dyn CatalogStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Open a scope for callers that drive it by hand.
    pub async fn begin(&self, label: &'static str) -> CatalogResult<TransactionScope> {
        let mut scope = TransactionScope::new(label);
        scope.open(self.store.as_ref()).await?;
        Ok(scope)
    }

    /// Run `work` in its own scope, replaying it on conflict.
    pub async fn execute<W: UnitOfWork>(&self, work: &W) -> CatalogResult<W::Output> {
        let mut attempt = 1;
        loop {
            match self.run_once(work).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::debug!(
                        "{}: conflict on attempt {}/{}, retrying: {}",
                        work.label(),
                        attempt,
                        self.max_attempts,
                        e
                    );
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::warn!(
                            "{}: giving up after {} attempts: {}",
                            work.label(),
                            attempt,
                            e
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn run_once<W: UnitOfWork>(&self, work: &W) -> CatalogResult<W::Output> {
        let mut scope = self.begin(work.label()).await?;

        let result = match scope.store() {
            Ok(store) => work.run(store).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(output) => {
                scope.commit().await?;
                Ok(output)
            }
            Err(e) => {
                if let Err(abort_err) = scope.abort().await {
                    tracing::warn!("{}: abort failed: {}", work.label(), abort_err);
                }
                Err(e)
            }
        }
    }
}
