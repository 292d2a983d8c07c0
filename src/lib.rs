//! Idempotent Request - idempotency-key middleware for axum
//!
//! Requests carrying an idempotency key on an eligible route run their
//! handler at most once at a time per key; the first successful response is
//! cached and replayed to later requests with the same key.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod manager;
pub mod models;
pub mod policy;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use config::{IdempotencyConfig, LockFailurePolicy, RouteConfig, ServerConfig};
pub use coordinator::{
    idempotency_middleware, Coordinator, CoordinatorSettings, IdempotencyEvent,
    IdempotencyObserver, Outcome, ProcessingContext,
};
pub use error::{ConfigError, IdempotencyError, RouteError, StorageError};
pub use manager::{LockGuard, RequestManager};
pub use models::CachedResponse;
pub use policy::{Policy, RequestInfo, RoutePolicy, RouteRule};
pub use storage::{KeySpace, MemoryStorage, RedisStorage, Storage};
pub use tasks::spawn_cleanup_task;
