//! TTL Cleanup Task
//!
//! Background task that periodically removes expired entries from the
//! in-memory storage. Reads already ignore expired entries; this only
//! bounds memory held by keys that are never requested again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::storage::MemoryStorage;

/// Spawns a background task that sweeps expired entries every
/// `cleanup_interval_secs` seconds.
///
/// Returns the JoinHandle so the caller can abort the task on shutdown.
///
/// # Example
/// ```ignore
/// let storage = MemoryStorage::new();
/// let cleanup_handle = spawn_cleanup_task(storage.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(storage: MemoryStorage, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = storage.cleanup_expired().await;
            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
