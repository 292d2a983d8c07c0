//! Data models
//!
//! The persisted cached-response record and the DTOs used for HTTP bodies.

pub mod cached_response;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use cached_response::{body_from_chunks, CachedResponse};
pub use requests::{CreateOrderRequest, PaymentRequest};
pub use responses::{
    ErrorBody, ErrorDetail, HealthResponse, OrderResponse, PaymentResponse, StatsResponse,
};
