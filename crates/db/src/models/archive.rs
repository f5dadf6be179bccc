//! Archive entity model. Rows are immutable after creation.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use streamvault_core::types::Timestamp;

/// A row from the `archive` table: the permanent record of a terminated
/// session, retrievable by id or (newest wins) by name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArchiveEntry {
    pub id: i64,
    pub session_id: String,
    pub session_name: String,
    pub status: String,
    pub duration: i32,
    pub playlist_path: String,
    pub archived_at: Timestamp,
}

/// DTO for inserting an archive row. Duplicate inserts on the same
/// `session_id` are silently ignored by the repository.
#[derive(Debug, Clone, Deserialize)]
pub struct NewArchiveEntry {
    pub session_id: String,
    pub session_name: String,
    pub status: String,
    pub duration: i32,
    pub playlist_path: String,
    pub archived_at: Timestamp,
}
