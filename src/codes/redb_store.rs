//! Redb-backed code store.
//!
//! Codes survive a restart of the issuing process, so a code handed out
//! just before a redeploy can still be verified.
//!
//! # Schema
//!
//! ```text
//! AUTH_CODES: code -> StoredCode (serde_json)
//! ```
//!
//! Expiry uses wall-clock milliseconds because entries outlive the process.

use super::{CodeStore, CodeStoreError};
use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Redb table for pending codes.
const AUTH_CODES: TableDefinition<&str, &[u8]> = TableDefinition::new("auth_codes");

/// Serialized code entry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCode {
    /// Identity id the code vouches for.
    value: i64,
    /// Unix epoch milliseconds after which the entry is dead.
    expires_at_ms: i64,
}

impl StoredCode {
    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodeStoreError> {
        serde_json::from_slice(bytes).map_err(|e| CodeStoreError::Serialization(e.to_string()))
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Redb-backed code store.
#[derive(Clone)]
pub struct RedbCodeStore {
    db: Arc<Database>,
}

impl RedbCodeStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CodeStoreError> {
        let db = Database::create(path.as_ref())?;
        Self::new(Arc::new(db))
    }

    /// Wrap an existing Redb database, creating the table if needed.
    pub fn new(db: Arc<Database>) -> Result<Self, CodeStoreError> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(AUTH_CODES)?;
        }
        write_txn.commit()?;

        info!("Code store initialized");
        Ok(Self { db })
    }

    fn set_blocking(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CodeStoreError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let stored = StoredCode {
            value,
            expires_at_ms: now_ms().saturating_add(ttl_ms),
        };
        let bytes =
            serde_json::to_vec(&stored).map_err(|e| CodeStoreError::Serialization(e.to_string()))?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(AUTH_CODES)?;
            table.insert(key, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_blocking(&self, key: &str) -> Result<Option<i64>, CodeStoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUTH_CODES)?;
        let Some(guard) = table.get(key)? else {
            return Ok(None);
        };
        let stored = StoredCode::decode(guard.value())?;
        if stored.is_expired(now_ms()) {
            return Ok(None);
        }
        Ok(Some(stored.value))
    }

    fn delete_blocking(&self, key: &str) -> Result<bool, CodeStoreError> {
        let now = now_ms();
        let write_txn = self.db.begin_write()?;
        let live = {
            let mut table = write_txn.open_table(AUTH_CODES)?;
            let removed = table.remove(key)?;
            match removed {
                Some(guard) => StoredCode::decode(guard.value())
                    .map(|stored| !stored.is_expired(now))
                    .unwrap_or(false),
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(live)
    }

    fn prune_blocking(&self) -> Result<usize, CodeStoreError> {
        let now = now_ms();
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(AUTH_CODES)?;
            let mut expired = Vec::new();
            for item in table.iter()? {
                let (key, value) = item?;
                match StoredCode::decode(value.value()) {
                    Ok(stored) if !stored.is_expired(now) => {}
                    Ok(_) => expired.push(key.value().to_string()),
                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable code entry");
                        expired.push(key.value().to_string());
                    }
                }
            }
            for key in &expired {
                table.remove(key.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

#[async_trait]
impl CodeStore for RedbCodeStore {
    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CodeStoreError> {
        let store = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.set_blocking(&key, value, ttl)).await?
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, CodeStoreError> {
        let store = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.get_blocking(&key)).await?
    }

    async fn delete(&self, key: &str) -> Result<bool, CodeStoreError> {
        let store = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.delete_blocking(&key)).await?
    }

    async fn prune_expired(&self) -> Result<usize, CodeStoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.prune_blocking()).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (RedbCodeStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = RedbCodeStore::open(dir.path().join("codes.redb")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let (store, _dir) = create_test_store();
        store.set("483920", 999, Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("483920").await.unwrap(), Some(999));
        assert!(store.delete("483920").await.unwrap());
        assert_eq!(store.get("483920").await.unwrap(), None);
        assert!(!store.delete("483920").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_and_pruned() {
        let (store, _dir) = create_test_store();
        store.set("old", 1, Duration::from_millis(10)).await.unwrap();
        store.set("fresh", 2, Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.get("old").await.unwrap(), None);
        assert_eq!(store.prune_expired().await.unwrap(), 1);
        assert_eq!(store.get("fresh").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("codes.redb");
        {
            let store = RedbCodeStore::open(&path).unwrap();
            store.set("123456", 42, Duration::from_secs(60)).await.unwrap();
        }

        let reopened = RedbCodeStore::open(&path).unwrap();
        assert_eq!(reopened.get("123456").await.unwrap(), Some(42));
    }
}
