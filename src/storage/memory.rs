//! Memory Storage Module
//!
//! In-process backend: a mutex-guarded map of expiring entries. The mutex
//! makes `lock` atomic, so it satisfies the contract for a single process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::storage::{current_timestamp_ms, KeySpace, Storage, StorageStats, StoredEntry};

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, StoredEntry>,
    stats: StorageStats,
}

impl MemoryState {
    /// Returns the live entry under `key`, dropping it first if expired.
    fn live(&mut self, key: &str) -> Option<&StoredEntry> {
        if self.entries.get(key).is_some_and(StoredEntry::is_expired) {
            self.entries.remove(key);
        }
        self.entries.get(key)
    }

    fn sync_len(&mut self) {
        let len = self.entries.len();
        self.stats.set_total_entries(len);
    }
}

// == Memory Storage ==
/// Cloneable handle to a shared in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
    keys: KeySpace,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStorage {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            keys: KeySpace::new(namespace),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    // == Outage Simulation ==
    /// While set, every operation fails with [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("memory storage marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    // == Inspection ==
    /// Whether a live lock exists for `key`. Not counted in stats.
    pub async fn is_locked(&self, key: &str) -> bool {
        let lock_key = self.keys.lock_key(key);
        self.state.lock().await.live(&lock_key).is_some()
    }

    /// Whether a live cached response exists for `key`. Not counted in stats.
    pub async fn has_response(&self, key: &str) -> bool {
        let response_key = self.keys.response_key(key);
        self.state.lock().await.live(&response_key).is_some()
    }

    /// Returns current statistics.
    pub async fn stats(&self) -> StorageStats {
        let state = self.state.lock().await;
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut state = self.state.lock().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired_at(now));
        state.sync_len();
        before - state.entries.len()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn lock(&self, key: &str, ttl: Duration) -> StorageResult<bool> {
        self.ensure_available()?;
        let lock_key = self.keys.lock_key(key);
        let mut state = self.state.lock().await;

        let acquired = state.live(&lock_key).is_none();
        if acquired {
            let marker = current_timestamp_ms().to_string().into_bytes();
            state.entries.insert(lock_key, StoredEntry::new(marker, ttl));
            state.sync_len();
        }
        state.stats.record_lock(acquired);
        Ok(acquired)
    }

    async fn unlock(&self, key: &str) -> StorageResult<()> {
        self.ensure_available()?;
        let lock_key = self.keys.lock_key(key);
        let mut state = self.state.lock().await;

        state.entries.remove(&lock_key);
        state.stats.record_unlock();
        state.sync_len();
        Ok(())
    }

    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.ensure_available()?;
        let response_key = self.keys.response_key(key);
        let mut state = self.state.lock().await;

        let value = state.live(&response_key).map(|entry| entry.value.clone());
        match value {
            Some(_) => state.stats.record_hit(),
            None => state.stats.record_miss(),
        }
        state.sync_len();
        Ok(value)
    }

    async fn write(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        self.ensure_available()?;
        let response_key = self.keys.response_key(key);
        let mut state = self.state.lock().await;

        state.entries.insert(response_key, StoredEntry::new(payload, ttl));
        state.stats.record_write();
        state.sync_len();
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let storage = MemoryStorage::new();

        assert!(storage.lock("key1", TTL).await.unwrap());
        assert!(!storage.lock("key1", TTL).await.unwrap());
        assert!(storage.lock("key2", TTL).await.unwrap());

        let stats = storage.stats().await;
        assert_eq!(stats.locks_acquired, 2);
        assert_eq!(stats.locks_contended, 1);
    }

    #[tokio::test]
    async fn test_unlock_allows_relock() {
        let storage = MemoryStorage::new();

        storage.lock("key1", TTL).await.unwrap();
        storage.unlock("key1").await.unwrap();

        assert!(!storage.is_locked("key1").await);
        assert!(storage.lock("key1", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_absent_key_is_ok() {
        let storage = MemoryStorage::new();
        assert!(storage.unlock("never-locked").await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_lock_is_reacquirable() {
        let storage = MemoryStorage::new();

        assert!(storage.lock("key1", Duration::from_millis(100)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(storage.lock("key1", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let storage = MemoryStorage::new();

        assert_eq!(storage.read("key1").await.unwrap(), None);
        storage.write("key1", b"payload".to_vec(), TTL).await.unwrap();
        assert_eq!(storage.read("key1").await.unwrap(), Some(b"payload".to_vec()));

        let stats = storage.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let storage = MemoryStorage::new();

        storage.write("key1", b"first".to_vec(), TTL).await.unwrap();
        storage.write("key1", b"second".to_vec(), TTL).await.unwrap();

        assert_eq!(storage.read("key1").await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_lock_and_response_do_not_collide() {
        let storage = MemoryStorage::new();

        storage.lock("key1", TTL).await.unwrap();
        assert_eq!(storage.read("key1").await.unwrap(), None);
        storage.write("key1", b"done".to_vec(), TTL).await.unwrap();
        storage.unlock("key1").await.unwrap();

        assert!(storage.has_response("key1").await);
    }

    #[tokio::test]
    async fn test_keys_are_case_normalized() {
        let storage = MemoryStorage::new();

        storage.write(" ABC ", b"v".to_vec(), TTL).await.unwrap();
        assert_eq!(storage.read("abc").await.unwrap(), Some(b"v".to_vec()));
        assert!(storage.lock("Abc", TTL).await.unwrap());
        assert!(!storage.lock("aBC", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_response_ttl_expiration() {
        let storage = MemoryStorage::new();

        storage
            .write("key1", b"v".to_vec(), Duration::from_millis(100))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(storage.read("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let storage = MemoryStorage::new();

        storage.write("short", b"v".to_vec(), Duration::from_millis(100)).await.unwrap();
        storage.write("long", b"v".to_vec(), TTL).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(storage.cleanup_expired().await, 1);
        assert_eq!(storage.len().await, 1);
        assert!(storage.has_response("long").await);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_operation() {
        let storage = MemoryStorage::new();
        storage.set_unavailable(true);

        assert!(matches!(storage.lock("k", TTL).await, Err(StorageError::Unavailable(_))));
        assert!(storage.unlock("k").await.is_err());
        assert!(storage.read("k").await.is_err());
        assert!(storage.write("k", Vec::new(), TTL).await.is_err());

        storage.set_unavailable(false);
        assert!(storage.lock("k", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let storage = MemoryStorage::new();
        let other = storage.clone();

        assert!(storage.lock("shared", TTL).await.unwrap());
        assert!(!other.lock("shared", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_lock_single_winner() {
        let storage = MemoryStorage::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move { storage.lock("race", TTL).await.unwrap() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
