//! Processing log entity model. The table is append-only.

use serde::Serialize;
use sqlx::FromRow;
use streamvault_core::types::Timestamp;

/// Informational log line.
pub const LEVEL_INFO: &str = "info";
/// Non-fatal problem (preview or integrity failures, missing metadata).
pub const LEVEL_WARNING: &str = "warning";
/// Fatal pipeline failure.
pub const LEVEL_ERROR: &str = "error";

/// A row from the `processing_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProcessingLog {
    pub id: i64,
    pub session_id: String,
    pub session_name: String,
    pub message: String,
    pub level: String,
    pub created_at: Timestamp,
}
