//! API Handlers
//!
//! Demo endpoints with side effects, used to exercise the idempotency layer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::models::{
    CreateOrderRequest, ErrorBody, HealthResponse, OrderResponse, PaymentRequest,
    PaymentResponse, StatsResponse,
};
use crate::storage::MemoryStorage;

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorBody>);

fn invalid_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorBody::new("InvalidRequest", message, "invalid_request")),
    )
}

/// Application state shared across all handlers.
#[derive(Clone, Default)]
pub struct AppState {
    /// Monotonic order id; each executed order consumes one
    pub orders: Arc<AtomicU64>,
    /// Present when the in-memory backend is used, for `/stats`
    pub memory: Option<MemoryStorage>,
}

impl AppState {
    pub fn new(memory: Option<MemoryStorage>) -> Self {
        Self {
            orders: Arc::new(AtomicU64::new(0)),
            memory,
        }
    }

    /// Number of orders actually created.
    pub fn orders_created(&self) -> u64 {
        self.orders.load(Ordering::SeqCst)
    }
}

/// Handler for POST /orders
pub async fn create_order_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    if let Some(error_msg) = req.validate() {
        return Err(invalid_request(error_msg));
    }

    let order_id = state.orders.fetch_add(1, Ordering::SeqCst) + 1;
    info!(order_id, item = %req.item, "Order created");

    Ok((
        StatusCode::CREATED,
        Json(OrderResponse {
            order_id,
            item: req.item,
            quantity: req.quantity,
            created_at: chrono::Utc::now().to_rfc3339(),
        }),
    ))
}

/// Handler for POST /payments/:id
pub async fn create_payment_handler(
    Path(payment_id): Path<String>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    if req.amount_cents == 0 {
        return Err(invalid_request("Amount must be positive"));
    }

    info!(%payment_id, amount_cents = req.amount_cents, "Payment captured");
    Ok(Json(PaymentResponse {
        payment_id,
        amount_cents: req.amount_cents,
        status: "captured".to_string(),
    }))
}

/// Handler for GET /stats
///
/// Only available with the in-memory backend.
pub async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, ApiError> {
    match state.memory {
        Some(memory) => Ok(Json(StatsResponse::from(memory.stats().await))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new(
                "NotFound",
                "Stats are only tracked for in-memory storage",
                "not_found",
            )),
        )),
    }
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_order_increments_counter() {
        let state = AppState::new(None);
        let req = CreateOrderRequest {
            item: "book".to_string(),
            quantity: 2,
        };

        let (status, Json(order)) = create_order_handler(State(state.clone()), Json(req))
            .await
            .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order.order_id, 1);
        assert_eq!(state.orders_created(), 1);
    }

    #[tokio::test]
    async fn test_create_order_invalid() {
        let state = AppState::new(None);
        let req = CreateOrderRequest {
            item: String::new(),
            quantity: 1,
        };

        let result = create_order_handler(State(state.clone()), Json(req)).await;
        assert_eq!(result.unwrap_err().0, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.orders_created(), 0);
    }

    #[tokio::test]
    async fn test_payment_zero_amount() {
        let result = create_payment_handler(
            Path("p1".to_string()),
            Json(PaymentRequest { amount_cents: 0 }),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stats_without_memory_storage() {
        let result = stats_handler(State(AppState::new(None))).await;
        assert_eq!(result.unwrap_err().0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
