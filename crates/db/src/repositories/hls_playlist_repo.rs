//! Repository for the `hls_playlists` table.

use sqlx::PgPool;

use crate::models::hls_playlist::HlsPlaylist;

const COLUMNS: &str = "id, session_id, session_name, playlist_path, created_at";

/// Persistence for HLS playlist records.
pub struct HlsPlaylistRepo;

impl HlsPlaylistRepo {
    /// Record the playlist produced for a session.
    pub async fn insert(
        pool: &PgPool,
        session_id: &str,
        session_name: &str,
        playlist_path: &str,
    ) -> Result<HlsPlaylist, sqlx::Error> {
        let query = format!(
            "INSERT INTO hls_playlists (session_id, session_name, playlist_path)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HlsPlaylist>(&query)
            .bind(session_id)
            .bind(session_name)
            .bind(playlist_path)
            .fetch_one(pool)
            .await
    }

    /// Find the playlist record for a session.
    pub async fn find_by_session(
        pool: &PgPool,
        session_id: &str,
    ) -> Result<Option<HlsPlaylist>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM hls_playlists
             WHERE session_id = $1
             ORDER BY created_at DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, HlsPlaylist>(&query)
            .bind(session_id)
            .fetch_optional(pool)
            .await
    }
}
