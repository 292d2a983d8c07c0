//! Stored Entry Module
//!
//! A single value held by the in-memory backend, with optional expiry.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Stored Entry ==
/// Represents a stored payload or lock marker with its metadata.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// The stored bytes
    pub value: Vec<u8>,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates a new entry. A zero `ttl` means the entry never expires.
    pub fn new(value: Vec<u8>, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        let ttl_ms = ttl.as_millis() as u64;
        let expires_at = (ttl_ms > 0).then(|| now + ttl_ms);

        Self { value, expires_at }
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_zero_ttl_never_expires() {
        let entry = StoredEntry::new(b"v".to_vec(), Duration::ZERO);

        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = StoredEntry::new(b"v".to_vec(), Duration::from_millis(200));

        assert!(!entry.is_expired());
        sleep(Duration::from_millis(250));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_expiry_is_now_plus_ttl() {
        let before = current_timestamp_ms();
        let entry = StoredEntry::new(b"v".to_vec(), Duration::from_secs(10));
        let after = current_timestamp_ms();

        let expires_at = entry.expires_at.unwrap();
        assert!(expires_at >= before + 10_000);
        assert!(expires_at <= after + 10_000);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ms();
        let entry = StoredEntry {
            value: Vec::new(),
            expires_at: Some(now),
        };

        assert!(entry.is_expired_at(now), "Entry should be expired at boundary");
        assert!(!entry.is_expired_at(now - 1));
    }
}
