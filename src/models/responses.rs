//! Response DTOs
//!
//! Error bodies owned by the idempotency layer plus the bodies returned by
//! the demo API.

use serde::Serialize;

use crate::storage::StorageStats;

// == Error Body ==
/// `{"error": {"type": .., "message": .., "code": ..}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub code: String,
}

impl ErrorBody {
    pub fn new(
        kind: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorDetail {
                kind: kind.into(),
                message: message.into(),
                code: code.into(),
            },
        }
    }

    /// Body sent when another request holds the lock for the same key.
    pub fn too_many_requests() -> Self {
        Self::new(
            "TooManyRequests",
            "Concurrent requests detected",
            "too_many_requests",
        )
    }

    /// Body sent when the lock cannot be taken and the layer fails closed.
    pub fn storage_unavailable() -> Self {
        Self::new(
            "ServiceUnavailable",
            "Idempotency storage unavailable",
            "storage_unavailable",
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("InternalServerError", message, "internal_error")
    }
}

// == Demo API Bodies ==
/// Response body for `POST /orders`
#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub order_id: u64,
    pub item: String,
    pub quantity: u32,
    pub created_at: String,
}

/// Response body for `POST /payments/:id`
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub payment_id: String,
    pub amount_cents: u64,
    pub status: String,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub locks_acquired: u64,
    pub locks_contended: u64,
    pub writes: u64,
    pub unlocks: u64,
    pub total_entries: usize,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl From<StorageStats> for StatsResponse {
    fn from(stats: StorageStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            locks_acquired: stats.locks_acquired,
            locks_contended: stats.locks_contended,
            writes: stats.writes,
            unlocks: stats.unlocks,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
