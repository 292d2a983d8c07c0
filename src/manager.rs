//! Request Manager
//!
//! Runs the per-key protocol on top of a [`Storage`]: read the cached
//! response, take the lock, store the handler's result, release the lock.
//! Executing the handler is left to the caller, between [`RequestManager::lock`]
//! and [`LockGuard::release`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, StorageResult};
use crate::models::CachedResponse;
use crate::storage::Storage;

// == Request Manager ==
pub struct RequestManager {
    storage: Arc<dyn Storage>,
    key: String,
    expire_time: Duration,
}

impl RequestManager {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>, expire_time: Duration) -> Self {
        Self {
            storage,
            key: key.into(),
            expire_time,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn expire_time(&self) -> Duration {
        self.expire_time
    }

    // == Read ==
    /// Returns the cached response for this key.
    ///
    /// Backend and decoding failures are logged and reported as a miss.
    pub async fn read(&self) -> Option<CachedResponse> {
        let payload = match self.storage.read(&self.key).await {
            Ok(Some(payload)) if !payload.is_empty() => payload,
            Ok(_) => return None,
            Err(err) => {
                warn!(key = %self.key, error = %err, "Idempotency read failed, treating as miss");
                return None;
            }
        };

        match CachedResponse::from_payload(&payload) {
            Ok(cached) => {
                debug!(key = %self.key, status = cached.status, "Idempotent response found");
                Some(cached)
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "Discarding undecodable cached response");
                None
            }
        }
    }

    // == Lock ==
    /// `Ok(true)` when this request now holds the key.
    pub async fn lock(&self) -> StorageResult<bool> {
        self.storage.lock(&self.key, self.expire_time).await
    }

    /// Guard that releases the lock when dropped or explicitly released.
    pub fn lock_guard(&self) -> LockGuard {
        LockGuard {
            storage: Arc::clone(&self.storage),
            key: self.key.clone(),
            released: false,
        }
    }

    // == Unlock ==
    pub async fn unlock(&self) -> StorageResult<()> {
        self.storage.unlock(&self.key).await
    }

    // == Write ==
    /// Stores `response` if its status is cacheable. Returns whether it was stored.
    pub async fn write(&self, response: &CachedResponse) -> Result<bool> {
        if !response.is_cacheable() {
            debug!(key = %self.key, status = response.status, "Response not cacheable");
            return Ok(false);
        }

        let payload = response.to_payload()?;
        self.storage
            .write(&self.key, payload, self.expire_time)
            .await?;
        Ok(true)
    }
}

// == Lock Guard ==
/// Releases the key's lock exactly once.
///
/// The normal path awaits [`LockGuard::release`]. If the guard is dropped
/// first (handler panic, cancelled request future) the unlock is spawned on
/// the current tokio runtime; without a runtime the lock TTL bounds it.
pub struct LockGuard {
    storage: Arc<dyn Storage>,
    key: String,
    released: bool,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn release(mut self) -> StorageResult<()> {
        let result = self.storage.unlock(&self.key).await;
        self.released = true;
        result
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let storage = Arc::clone(&self.storage);
                handle.spawn(async move {
                    match storage.unlock(&key).await {
                        Ok(()) => debug!(%key, "Released abandoned idempotency lock"),
                        Err(err) => warn!(%key, error = %err, "Failed to release abandoned lock"),
                    }
                });
            }
            Err(_) => warn!(%key, "No runtime to release idempotency lock, waiting for TTL"),
        }
    }
}
