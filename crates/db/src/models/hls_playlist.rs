//! HLS playlist record entity model.

use serde::Serialize;
use sqlx::FromRow;
use streamvault_core::types::Timestamp;

/// A row from the `hls_playlists` table, recording where a session's
/// playlist lives on disk.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HlsPlaylist {
    pub id: i64,
    pub session_id: String,
    pub session_name: String,
    pub playlist_path: String,
    pub created_at: Timestamp,
}
