//! Per-request diagnostics.

use std::fmt;

// == Outcome ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Cached response returned; the handler did not run
    Replayed,
    /// Handler ran. `exclusive` is false when the lock could not be taken
    /// because storage failed and the layer failed open.
    Executed { exclusive: bool },
    /// Another request holds the lock; rejection returned
    Concurrent,
    /// Lock failed on storage error and the layer failed closed
    StorageUnavailable,
    /// Handler response body errored while being read
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Replayed => "replayed",
            Outcome::Executed { exclusive: true } => "executed",
            Outcome::Executed { exclusive: false } => "executed_without_lock",
            Outcome::Concurrent => "concurrent",
            Outcome::StorageUnavailable => "storage_unavailable",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Processing Context ==
/// What happened to one request. Inserted into the response extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingContext {
    pub key: String,
    pub outcome: Option<Outcome>,
    /// Set when the lock call failed on a storage error
    pub lock_error: Option<String>,
    /// Set when storing the response failed
    pub write_error: Option<String>,
    /// Response was stored for replay
    pub cached: bool,
    /// Lock release succeeded
    pub unlocked: bool,
}

impl ProcessingContext {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            outcome: None,
            lock_error: None,
            write_error: None,
            cached: false,
            unlocked: false,
        }
    }
}
