//! Repository for the `archive` table.

use sqlx::PgPool;

use crate::models::archive::{ArchiveEntry, NewArchiveEntry};

const COLUMNS: &str =
    "id, session_id, session_name, status, duration, playlist_path, archived_at";

/// Persistence for the permanent archive of terminated sessions.
pub struct ArchiveRepo;

impl ArchiveRepo {
    /// Insert an archive row. A second insert for the same `session_id` is
    /// silently ignored and returns `None`.
    pub async fn insert(
        pool: &PgPool,
        body: &NewArchiveEntry,
    ) -> Result<Option<ArchiveEntry>, sqlx::Error> {
        let query = format!(
            "INSERT INTO archive
                 (session_id, session_name, status, duration, playlist_path, archived_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (session_id) DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ArchiveEntry>(&query)
            .bind(&body.session_id)
            .bind(&body.session_name)
            .bind(&body.status)
            .bind(body.duration)
            .bind(&body.playlist_path)
            .bind(body.archived_at)
            .fetch_optional(pool)
            .await
    }

    /// Find an archive row by session id.
    pub async fn find_by_id(
        pool: &PgPool,
        session_id: &str,
    ) -> Result<Option<ArchiveEntry>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM archive WHERE session_id = $1");
        sqlx::query_as::<_, ArchiveEntry>(&query)
            .bind(session_id)
            .fetch_optional(pool)
            .await
    }

    /// Find the most recently archived row for a session name. Names are
    /// not unique across the archive; the newest entry wins.
    pub async fn find_by_name(
        pool: &PgPool,
        session_name: &str,
    ) -> Result<Option<ArchiveEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM archive
             WHERE session_name = $1
             ORDER BY archived_at DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, ArchiveEntry>(&query)
            .bind(session_name)
            .fetch_optional(pool)
            .await
    }

    /// List all archive rows, newest first.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<ArchiveEntry>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM archive ORDER BY archived_at DESC");
        sqlx::query_as::<_, ArchiveEntry>(&query)
            .fetch_all(pool)
            .await
    }
}
