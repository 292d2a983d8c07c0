//! Storage Module
//!
//! The key-value contract the idempotency protocol runs on, plus an
//! in-process backend and a Redis backend.
//!
//! Only [`Storage::lock`] needs to be atomic: it is the single point where
//! concurrent requests for the same key are serialized.

mod entry;
mod memory;
mod redis;
mod stats;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

pub use self::redis::RedisStorage;
pub use entry::{current_timestamp_ms, StoredEntry};
pub use memory::MemoryStorage;
pub use stats::StorageStats;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "idempotency_keys";

// == Storage Trait ==
/// Backend operations used by the request manager.
///
/// Every method takes the logical idempotency key; backends map it to their
/// own lock and response locations through [`KeySpace`]. A zero `ttl` means
/// the record never expires.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Creates the lock record if absent. `true` means the caller now holds it.
    async fn lock(&self, key: &str, ttl: Duration) -> StorageResult<bool>;

    /// Deletes the lock record. Deleting an absent lock is not an error.
    async fn unlock(&self, key: &str) -> StorageResult<()>;

    /// Reads the stored response payload.
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores the response payload, replacing any previous value.
    async fn write(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> StorageResult<()>;
}

// == Key Space ==
/// Maps idempotency keys to namespaced, case-normalized storage keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Location of the cached response: `<namespace>:<key>`, lower-cased.
    pub fn response_key(&self, key: &str) -> String {
        self.join(key.trim())
    }

    /// Location of the lock record: `<namespace>:lock:<key>`, lower-cased.
    pub fn lock_key(&self, key: &str) -> String {
        self.join(&format!("lock:{}", key.trim()))
    }

    fn join(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_lowercase()
        } else {
            format!("{}:{}", self.namespace, key).to_lowercase()
        }
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
