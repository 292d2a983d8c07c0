//! API Routes
//!
//! Configures the Axum router with the demo endpoints behind the
//! idempotency middleware.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    create_order_handler, create_payment_handler, health_handler, stats_handler, AppState,
};
use crate::coordinator::{idempotency_middleware, Coordinator};

/// Creates the main router.
///
/// # Endpoints
/// - `POST /orders` - Create an order
/// - `POST /payments/:id` - Capture a payment
/// - `GET /stats` - Storage statistics (in-memory backend only)
/// - `GET /health` - Health check endpoint
///
/// Every route sits behind the idempotency middleware; the coordinator's
/// policy decides which of them are actually processed.
pub fn create_router(state: AppState, coordinator: Arc<Coordinator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/orders", post(create_order_handler))
        .route("/payments/:id", post(create_payment_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(
            coordinator,
            idempotency_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
