//! In-process store
//!
//! Substitute for Redis with the same per-key atomicity. Used by the test
//! suites and by the `memory` backend when no Redis server is available.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KvStore, StoreError, StoreResult};

/// Reply Redis sends for a successful SET
const OK: &str = "OK";

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn add(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut entries = self.entries.write().await;

        let current = match entries.get(key) {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                StoreError::Command("value is not an integer or out of range".to_string())
            })?,
            None => 0,
        };
        let next = current.checked_add(delta).ok_or_else(|| {
            StoreError::Command("increment or decrement would overflow".to_string())
        })?;

        entries.insert(key.to_string(), next.to_string());
        Ok(next)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(Some(OK.to_string()))
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.add(key, 1).await
    }

    async fn decr(&self, key: &str) -> StoreResult<i64> {
        self.add(key, -1).await
    }
}
