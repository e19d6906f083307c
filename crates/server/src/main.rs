//! Quill server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use quill_api::{AppState, app};
use quill_common::Config;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting quill server...");

    // QUILL_CONFIG names a single file in place of the config/ directory
    let config = match std::env::var("QUILL_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration file");
            Config::from_file(&path)
        }
        Err(_) => Config::load(),
    }
    .context("failed to load configuration")?;

    let db = quill_db::init(&config)
        .await
        .context("failed to connect to database")?;
    info!("Connected to database");

    info!("Running database migrations...");
    quill_db::migrate(&db)
        .await
        .context("failed to run migrations")?;
    info!("Migrations completed");

    let state = AppState::new(Arc::new(db), &config);
    let app = app(state).layer(TraceLayer::new_for_http());

    let host = config
        .server
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("invalid server.host {:?}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    info!(public_url = %config.server.url, "Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}
