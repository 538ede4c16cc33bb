//! KV Facade - A small HTTP front for a remote key-value store
//!
//! Exposes a JSON cache and named integer counters over HTTP, backed by a
//! single supervised Redis connection.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kv_facade::api::create_router_with_assets;
use kv_facade::config::{StoreBackend, SERVER_PORT};
use kv_facade::{AppState, Config, KvStore, MemoryStore, RedisStore};

/// Main entry point for the server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Start connecting to the store in the background
/// 4. Create Axum router with all endpoints
/// 5. Start HTTP server on port 3000
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kv_facade=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: backend={:?}, static_dir={}, max_retry_attempts={}",
        config.backend,
        config.static_dir.display(),
        config.retry.max_attempts
    );

    let (store, connector): (Arc<dyn KvStore>, Option<(RedisStore, JoinHandle<()>)>) =
        match config.backend {
            StoreBackend::Redis => {
                let (store, handle) = RedisStore::connect(&config.redis_url, config.retry)
                    .with_context(|| format!("cannot use REDIS_URL {}", config.redis_url))?;
                (Arc::new(store.clone()), Some((store, handle)))
            }
            StoreBackend::Memory => {
                warn!("Using in-memory store; data is lost on restart");
                (Arc::new(MemoryStore::new()), None)
            }
        };

    let state = AppState::new(store);
    let app = create_router_with_assets(state, &config.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], SERVER_PORT));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on port {}!", SERVER_PORT);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(connector))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, closes the store connector so in-flight requests
/// waiting for a connection fail instead of holding up graceful shutdown.
async fn shutdown_signal(connector: Option<(RedisStore, JoinHandle<()>)>) {
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

    if let Some((store, handle)) = connector {
        store.close();
        handle.abort();
        warn!("Store connector stopped");
    }
}
