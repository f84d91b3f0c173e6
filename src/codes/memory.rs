//! In-memory code store.
//!
//! Entries carry their own deadline; expiry is checked at lookup time
//! (lazy expiration) and swept by the reaper.

use super::{CodeStore, CodeStoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct CachedCode {
    value: i64,
    expires_at: Instant,
}

impl CachedCode {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// DashMap-backed code store.
#[derive(Debug, Default)]
pub struct MemoryCodeStore {
    codes: DashMap<String, CachedCode>,
}

impl MemoryCodeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet pruned.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the store holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CodeStoreError> {
        self.codes.insert(
            key.to_string(),
            CachedCode {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, CodeStoreError> {
        let now = Instant::now();
        let cached = self.codes.get(key).map(|entry| *entry.value());
        match cached {
            Some(code) if code.is_expired(now) => {
                self.codes.remove_if(key, |_, c| c.is_expired(now));
                Ok(None)
            }
            Some(code) => Ok(Some(code.value)),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, CodeStoreError> {
        let now = Instant::now();
        Ok(self
            .codes
            .remove(key)
            .is_some_and(|(_, code)| !code.is_expired(now)))
    }

    async fn prune_expired(&self) -> Result<usize, CodeStoreError> {
        let now = Instant::now();
        let mut removed = 0;
        self.codes.retain(|_, code| {
            if code.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryCodeStore::new();
        store.set("123456", 999, Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("123456").await.unwrap(), Some(999));
        assert!(store.delete("123456").await.unwrap());
        assert_eq!(store.get("123456").await.unwrap(), None);
        assert!(!store.delete("123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_replaces_value() {
        let store = MemoryCodeStore::new();
        store.set("k", 1, Duration::from_secs(60)).await.unwrap();
        store.set("k", 2, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_expired_reads_as_absent() {
        let store = MemoryCodeStore::new();
        store.set("k", 7, Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let store = MemoryCodeStore::new();
        store.set("short", 1, Duration::from_millis(10)).await.unwrap();
        store.set("long", 2, Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.prune_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long").await.unwrap(), Some(2));
    }
}
