//! Stream metadata entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use streamvault_core::types::Timestamp;

/// A row from the `stream_metadata` table. One row per session, written at
/// session start; the duration is updated when the session ends.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StreamMetadata {
    pub session_id: String,
    pub session_name: String,
    /// Recorded duration in whole seconds; 0 while the session runs.
    pub duration: i32,
    /// `"<width>x<height>"` as reported by the probe, when known.
    pub resolution: Option<String>,
    pub format: String,
    pub created_at: Timestamp,
    pub preview_path: Option<String>,
}

/// DTO for inserting (or replacing) a stream metadata row.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStreamMetadata {
    pub session_id: String,
    pub session_name: String,
    pub duration: i32,
    pub resolution: Option<String>,
    pub format: String,
    pub preview_path: Option<String>,
}
