//! Ephemeral verification-code store.
//!
//! Holds `code -> identity id` mappings with a per-key TTL. Expired keys
//! read as absent. Backends:
//! - [`MemoryCodeStore`]: DashMap with lazy expiry
//! - [`RedbCodeStore`]: redb file, survives restarts

mod memory;
mod redb_store;

pub use self::memory::MemoryCodeStore;
pub use self::redb_store::RedbCodeStore;

use crate::store::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Code store faults.
#[derive(Debug, Error)]
pub enum CodeStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] ::redb::Error),

    #[error("database error: {0}")]
    Database(#[from] ::redb::DatabaseError),

    #[error("table error: {0}")]
    Table(#[from] ::redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] ::redb::StorageError),

    #[error("transaction error: {0}")]
    Transaction(#[from] ::redb::TransactionError),

    #[error("commit error: {0}")]
    Commit(#[from] ::redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<CodeStoreError> for StoreError {
    fn from(err: CodeStoreError) -> Self {
        StoreError::Cache(err.to_string())
    }
}

/// Key-value store with per-key expiry, used only for in-flight codes.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CodeStoreError>;

    /// Read a live entry. Absent and expired keys both yield `None`.
    async fn get(&self, key: &str) -> Result<Option<i64>, CodeStoreError>;

    /// Remove an entry. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, CodeStoreError>;

    /// Drop expired entries. Returns how many were removed.
    async fn prune_expired(&self) -> Result<usize, CodeStoreError>;
}

/// Spawn the expired-code reaper.
///
/// Runs every `interval` until `shutdown` is cancelled.
pub fn spawn_prune_task(
    store: Arc<dyn CodeStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Code reaper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match store.prune_expired().await {
                        Ok(0) => {}
                        Ok(removed) => debug!(count = removed, "Pruned expired codes"),
                        Err(e) => warn!(error = %e, "Failed to prune expired codes"),
                    }
                }
            }
        }
    })
}
