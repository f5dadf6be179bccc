use std::path::PathBuf;
use std::sync::Arc;

use streamvault_core::config::SharedConfig;

use crate::sessions::manager::SessionManager;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable; inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: streamvault_db::DbPool,
    /// Live runtime configuration. Sessions snapshot it at start.
    pub config: SharedConfig,
    /// Backing file the configuration is written through to on update.
    pub config_path: Arc<PathBuf>,
    /// The set of live sessions and their lifecycle operations.
    pub sessions: Arc<SessionManager>,
}
