//! API Module
//!
//! Demo HTTP handlers and routing.
//!
//! # Endpoints
//! - `POST /orders` - Create an order
//! - `POST /payments/:id` - Capture a payment
//! - `GET /stats` - Storage statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
