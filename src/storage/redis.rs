//! Redis Storage Module
//!
//! Networked backend. `SET NX` gives the atomic conditional create; expiry
//! is delegated to Redis with `PX`.

use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::{Client, Cmd};
use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageResult;
use crate::storage::{current_timestamp_ms, KeySpace, Storage};

// == Redis Storage ==
/// Storage backed by a Redis server through a reconnecting connection.
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
    keys: KeySpace,
}

impl RedisStorage {
    // == Constructor ==
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str, namespace: impl Into<String>) -> StorageResult<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!(url, "Connected to Redis");
        Ok(Self::from_connection(conn, namespace))
    }

    pub fn from_connection(conn: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            keys: KeySpace::new(namespace),
        }
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }
}

/// Appends `PX <ms>` for a non-zero TTL.
fn with_expiry(mut cmd: Cmd, ttl: Duration) -> Cmd {
    let ttl_ms = ttl.as_millis() as u64;
    if ttl_ms > 0 {
        cmd.arg("PX").arg(ttl_ms);
    }
    cmd
}

#[async_trait]
impl Storage for RedisStorage {
    async fn lock(&self, key: &str, ttl: Duration) -> StorageResult<bool> {
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(self.keys.lock_key(key))
            .arg(current_timestamp_ms())
            .arg("NX");
        let reply: Option<String> = with_expiry(cmd, ttl)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(reply.is_some())
    }

    async fn unlock(&self, key: &str) -> StorageResult<()> {
        let _: i64 = ::redis::cmd("DEL")
            .arg(self.keys.lock_key(key))
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(())
    }

    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = ::redis::cmd("GET")
            .arg(self.keys.response_key(key))
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(value)
    }

    async fn write(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(self.keys.response_key(key)).arg(payload);
        let _: () = with_expiry(cmd, ttl)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(())
    }
}
