//! # Mostrador API
//!
//! Starts the REST server.
//!
//! ```text
//! load config ──► init tracing ──► open SQLite + migrate ──► serve /api
//!                                                              │
//!                                          Ctrl+C / SIGTERM ───┘ graceful stop
//! ```

use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mostrador_api::auth::JwtManager;
use mostrador_api::{build_router, ApiConfig, AppState};
use mostrador_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::load().context("Failed to load configuration")?;

    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting Mostrador API server...");
    info!(
        addr = %config.listen_addr(),
        db = %config.database.path.display(),
        "Configuration loaded"
    );

    let db_config = DbConfig::new(&config.database.path)
        .max_connections(config.database.max_connections)
        .busy_timeout(Duration::from_millis(config.database.busy_timeout_ms))
        .password_cost(config.auth.password_cost);
    let db = Database::new(db_config)
        .await
        .context("Failed to open database")?;

    let jwt = JwtManager::new(&config.auth.jwt_secret, config.auth.token_lifetime_secs);
    let app = build_router(AppState::new(db.clone(), jwt));

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr()))?;
    info!(addr = %config.listen_addr(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
