//! Idempotent Request demo server
//!
//! Serves a small order/payment API behind the idempotency middleware.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use idempotent_request::{
    api::{create_router, AppState},
    coordinator::TracingObserver,
    spawn_cleanup_task, Coordinator, IdempotencyConfig, MemoryStorage, RedisStorage, RouteConfig,
    ServerConfig, Storage,
};

/// Main entry point for the demo server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load server settings from the environment, idempotency settings from file
/// 3. Connect storage (Redis when `REDIS_URL` is set, memory otherwise)
/// 4. Build the coordinator and router
/// 5. Serve until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idempotent_request=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting idempotent request demo server");

    let server = ServerConfig::from_env();
    let config = match &server.config_path {
        Some(path) => IdempotencyConfig::from_file(path, &server.app_env)
            .with_context(|| format!("loading idempotency config from {path}"))?,
        None => demo_config(),
    };
    info!(
        "Configuration loaded: routes={}, default_ttl={}s, port={}",
        config.routes.len(),
        config.default_expire_time().as_secs(),
        server.server_port
    );

    let mut cleanup_handle = None;
    let (storage, memory): (Arc<dyn Storage>, Option<MemoryStorage>) = match &server.redis_url {
        Some(url) => {
            let redis = RedisStorage::connect(url, config.namespace.clone())
                .await
                .context("connecting to Redis")?;
            info!("Using Redis storage");
            (Arc::new(redis), None)
        }
        None => {
            let memory = MemoryStorage::with_namespace(config.namespace.clone());
            cleanup_handle = Some(spawn_cleanup_task(memory.clone(), server.cleanup_interval));
            info!("Using in-memory storage");
            (Arc::new(memory.clone()), Some(memory))
        }
    };

    let coordinator = Coordinator::from_config(&config, storage)
        .context("building idempotency coordinator")?
        .with_observer(Arc::new(TracingObserver));
    let app = create_router(AppState::new(memory), Arc::new(coordinator));

    let addr = SocketAddr::from(([0, 0, 0, 0], server.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("serving HTTP")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Routes used when no config file is given.
fn demo_config() -> IdempotencyConfig {
    IdempotencyConfig {
        routes: vec![
            RouteConfig::new("/orders", "POST").with_expire_time(180),
            RouteConfig::new("/payments/*", "POST"),
        ],
        ..IdempotencyConfig::default()
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the cleanup task.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
