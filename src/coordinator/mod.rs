//! Coordinator Module
//!
//! Wires the policy, the request manager and the downstream handler into an
//! axum middleware.
//!
//! # Flow
//! 1. Read the idempotency key header; no key or ineligible route passes
//!    straight through without touching storage
//! 2. Cached response found: replay it with the replay header
//! 3. Lock held by another request: answer with the concurrent rejection
//! 4. Lock taken: read once more, since a request that finished in between
//!    has already stored its response
//! 5. Otherwise run the handler, store a cacheable result, release the lock

mod context;
mod observer;

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use tracing::{debug, warn};

use crate::config::{IdempotencyConfig, LockFailurePolicy};
use crate::error::{ConfigError, IdempotencyError};
use crate::manager::{LockGuard, RequestManager};
use crate::models::{body_from_chunks, CachedResponse, ErrorBody};
use crate::policy::{Policy, RequestInfo, RoutePolicy};
use crate::storage::Storage;

pub use context::{Outcome, ProcessingContext};
pub use observer::{
    IdempotencyEvent, IdempotencyObserver, NoopObserver, RecordingObserver, TracingObserver,
};

// == Settings ==
/// Validated header names and statuses used per request.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub key_header: HeaderName,
    pub replayed_header: HeaderName,
    pub concurrent_status: StatusCode,
    pub lock_failure: LockFailurePolicy,
}

impl CoordinatorSettings {
    pub fn from_config(config: &IdempotencyConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            key_header: config.key_header()?,
            replayed_header: config.replayed_header()?,
            concurrent_status: config.concurrent_status()?,
            lock_failure: config.lock_failure,
        })
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            key_header: HeaderName::from_static("idempotency-key"),
            replayed_header: HeaderName::from_static("idempotency-replayed"),
            concurrent_status: StatusCode::TOO_MANY_REQUESTS,
            lock_failure: LockFailurePolicy::FailOpen,
        }
    }
}

// == Coordinator ==
pub struct Coordinator {
    policy: Arc<dyn Policy>,
    storage: Arc<dyn Storage>,
    settings: CoordinatorSettings,
    observer: Arc<dyn IdempotencyObserver>,
}

impl Coordinator {
    pub fn new(
        policy: Arc<dyn Policy>,
        storage: Arc<dyn Storage>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            policy,
            storage,
            settings,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Builds a coordinator with a [`RoutePolicy`] compiled from `config`.
    pub fn from_config(
        config: &IdempotencyConfig,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            Arc::new(RoutePolicy::from_config(config)?),
            storage,
            CoordinatorSettings::from_config(config)?,
        ))
    }

    pub fn with_observer(mut self, observer: Arc<dyn IdempotencyObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// The trimmed key header value, if present, non-empty and valid UTF-8.
    pub fn idempotency_key(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(&self.settings.key_header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }

    // == Handle ==
    /// Processes one request; `run` invokes the downstream handler.
    pub async fn handle<F, Fut>(&self, request: Request, run: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let method = request.method().as_str().to_string();
        let path = request.uri().path().to_string();
        let info = RequestInfo::new(&method, &path);

        let Some(key) = self
            .idempotency_key(request.headers())
            .filter(|_| self.policy.should(&info))
        else {
            return run(request).await;
        };

        let manager = RequestManager::new(
            Arc::clone(&self.storage),
            key.clone(),
            self.policy.expire_time_for(&info),
        );
        let mut context = ProcessingContext::new(key.clone());
        let mut response = self.process(&manager, &mut context, request, run).await;

        if let Some(outcome) = context.outcome {
            debug!(%method, %path, %key, %outcome, "Idempotent request processed");
            self.observer.on_event(&IdempotencyEvent {
                method,
                path,
                key,
                outcome,
            });
        }
        response.extensions_mut().insert(context);
        response
    }

    async fn process<F, Fut>(
        &self,
        manager: &RequestManager,
        context: &mut ProcessingContext,
        request: Request,
        run: F,
    ) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        if let Some(cached) = manager.read().await {
            context.outcome = Some(Outcome::Replayed);
            return cached.into_response(Some(&self.settings.replayed_header));
        }

        let exclusive = match manager.lock().await {
            Ok(true) => true,
            Ok(false) => {
                context.outcome = Some(Outcome::Concurrent);
                return self.concurrent_response();
            }
            Err(err) => {
                warn!(key = %manager.key(), error = %err, "Failed to lock the key");
                context.lock_error = Some(err.to_string());
                match self.settings.lock_failure {
                    LockFailurePolicy::FailOpen => false,
                    LockFailurePolicy::FailClosed => {
                        context.outcome = Some(Outcome::StorageUnavailable);
                        return storage_unavailable_response();
                    }
                }
            }
        };

        // Dropping the guard (panic, cancellation) still releases the lock.
        // Without the lock there is nothing of ours to release.
        let guard = exclusive.then(|| manager.lock_guard());

        // Another request may have finished between our read and our lock.
        if exclusive {
            if let Some(cached) = manager.read().await {
                context.outcome = Some(Outcome::Replayed);
                release_lock(guard, manager, context).await;
                return cached.into_response(Some(&self.settings.replayed_header));
            }
        }

        let (parts, body) = run(request).await.into_parts();

        let response = match collect_chunks(body).await {
            Ok(chunks) => {
                let cached = CachedResponse::from_parts(parts.status, &parts.headers, chunks);
                match manager.write(&cached).await {
                    Ok(stored) => context.cached = stored,
                    Err(err) => {
                        warn!(key = %manager.key(), error = %err, "Failed to store idempotent response");
                        context.write_error = Some(err.to_string());
                    }
                }
                context.outcome = Some(Outcome::Executed { exclusive });
                Response::from_parts(parts, body_from_chunks(cached.response))
            }
            Err(err) => {
                warn!(key = %manager.key(), error = %err, "Handler response body failed");
                context.outcome = Some(Outcome::Failed);
                IdempotencyError::Body(err.to_string()).into_response()
            }
        };

        release_lock(guard, manager, context).await;
        response
    }

    fn concurrent_response(&self) -> Response {
        (
            self.settings.concurrent_status,
            Json(ErrorBody::too_many_requests()),
        )
            .into_response()
    }
}

async fn release_lock(
    guard: Option<LockGuard>,
    manager: &RequestManager,
    context: &mut ProcessingContext,
) {
    let Some(guard) = guard else {
        return;
    };
    match guard.release().await {
        Ok(()) => context.unlocked = true,
        Err(err) => warn!(key = %manager.key(), error = %err, "Failed to unlock the key"),
    }
}

fn storage_unavailable_response() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorBody::storage_unavailable()),
    )
        .into_response()
}

async fn collect_chunks(body: Body) -> Result<Vec<Bytes>, axum::Error> {
    body.into_data_stream().try_collect().await
}

// == Middleware ==
/// Axum middleware entry point.
///
/// ```ignore
/// let coordinator = Arc::new(Coordinator::from_config(&config, storage)?);
/// let app = Router::new()
///     .route("/orders", post(create_order))
///     .layer(middleware::from_fn_with_state(coordinator, idempotency_middleware));
/// ```
pub async fn idempotency_middleware(
    State(coordinator): State<Arc<Coordinator>>,
    request: Request,
    next: Next,
) -> Response {
    coordinator.handle(request, |request| next.run(request)).await
}
