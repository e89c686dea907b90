//! Stripe Cache - A memcached-style key-value cache server
//!
//! Serves a sharded LRU cache over HTTP, running every storage operation on
//! a watermark-scaled thread pool.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stripe_cache::api::{create_router, AppState};
use stripe_cache::{Config, Executor, ShardedLru};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the sharded cache and start the thread pool
/// 4. Create Axum router with all endpoints
/// 5. Start HTTP server on configured port
/// 6. On SIGINT/SIGTERM stop accepting connections, then drain the pool
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stripe_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Stripe Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: stripes={}, max_size={}, port={}, workers={}..{}, max_queue={}, idle_timeout={}ms",
        config.stripe_count,
        config.max_size,
        config.server_port,
        config.low_watermark,
        config.high_watermark,
        config.max_queue_size,
        config.idle_timeout_ms
    );

    let cache = ShardedLru::build(config.stripe_count, config.max_size)
        .context("invalid cache sizing")?;
    let executor =
        Executor::new(config.executor_config()).context("failed to start worker pool")?;

    let state = AppState::new(cache, executor);
    let executor = Arc::clone(&state.executor);
    let pool = executor.config();
    info!(
        "Worker pool '{}' ready: {}..{} threads, idle timeout {:?}",
        pool.name, pool.low_watermark, pool.high_watermark, pool.idle_timeout
    );

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Let queued requests finish before the process exits
    tokio::task::spawn_blocking(move || executor.stop(true))
        .await
        .context("worker pool shutdown panicked")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
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
                tracing::error!("Failed to install SIGTERM handler: {}", err);
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
}
