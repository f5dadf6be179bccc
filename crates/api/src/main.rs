use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamvault_api::router::build_app_router;
use streamvault_api::sessions::manager::SessionManager;
use streamvault_api::state::AppState;
use streamvault_core::config::{AppConfig, DEFAULT_CONFIG_PATH};

/// How long in-flight HTTP requests may drain after shutdown begins.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamvault=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config_path = PathBuf::from(
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
    );
    let cfg = AppConfig::load(&config_path).expect("Failed to load configuration");
    tracing::info!(path = %config_path.display(), "Configuration loaded");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url.clone());
    let pool = streamvault_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    streamvault_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    streamvault_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- State ---
    let server_port = cfg.server_port;
    let config = Arc::new(RwLock::new(cfg));
    let sessions = Arc::new(SessionManager::new(pool.clone(), Arc::clone(&config)));

    let state = AppState {
        pool,
        config,
        config_path: Arc::new(config_path),
        sessions: Arc::clone(&sessions),
    };
    let app = build_app_router(state);

    // --- Serve ---
    let listener = TcpListener::bind(("0.0.0.0", server_port))
        .await
        .unwrap_or_else(|e| panic!("Failed to bind port {server_port}: {e}"));
    tracing::info!(port = server_port, "Starting server");

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                tracing::info!("Received shutdown signal, shutting down server");
                sessions.shutdown().await;
                let _ = drain_tx.send(());
            })
            .await
    };

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server error");
            }
        }
        _ = async {
            let _ = drain_rx.await;
            tokio::time::sleep(DRAIN_TIMEOUT).await;
        } => {
            tracing::warn!("Drain timeout elapsed, exiting with requests in flight");
        }
    }

    tracing::info!("Server shut down");
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
