use crate::config::Config;
use crate::streaming::FragmentLocator;
use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;

mod dispatch;
mod error;

pub use dispatch::dispatch;
pub use error::ServeError;

/// How often expired fragment indexes are pruned.
const CACHE_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub locator: FragmentLocator,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let locator = FragmentLocator::from_config(&config.index);
        Self {
            config: Arc::new(config),
            locator,
        }
    }
}

/// Create the Axum router
///
/// `/health` is fixed; every other path goes through the manifest dispatcher.
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext::new(config);
    ctx.locator.spawn_cleanup(CACHE_CLEANUP_INTERVAL_SECS);

    tracing::info!(
        file_root = %ctx.config.server.file_root.display(),
        url_root = %ctx.config.server.url_root,
        strategy = ?ctx.locator.strategy(),
        "Serving streams"
    );

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
