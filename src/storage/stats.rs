//! Storage Statistics Module
//!
//! Counts the operations served by the in-memory backend.

use serde::Serialize;

// == Storage Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Reads that found a live response
    pub hits: u64,
    /// Reads that found nothing or an expired response
    pub misses: u64,
    /// Lock attempts that created the lock record
    pub locks_acquired: u64,
    /// Lock attempts that found an existing lock record
    pub locks_contended: u64,
    /// Response payloads written
    pub writes: u64,
    /// Unlock calls, whether or not a lock existed
    pub unlocks: u64,
    /// Current number of live records (locks and responses)
    pub total_entries: usize,
}

impl StorageStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing has been read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total number of storage calls served.
    pub fn operations(&self) -> u64 {
        self.hits + self.misses + self.locks_acquired + self.locks_contended + self.writes + self.unlocks
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_lock(&mut self, acquired: bool) {
        if acquired {
            self.locks_acquired += 1;
        } else {
            self.locks_contended += 1;
        }
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_unlock(&mut self) {
        self.unlocks += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
