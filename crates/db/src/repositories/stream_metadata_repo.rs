//! Repository for the `stream_metadata` table.

use sqlx::PgPool;

use crate::models::stream_metadata::{NewStreamMetadata, StreamMetadata};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "session_id, session_name, duration, resolution, format, created_at, preview_path";

/// Provides persistence for per-session stream metadata.
pub struct StreamMetadataRepo;

impl StreamMetadataRepo {
    /// Insert a metadata row, replacing all mutable fields when a row for
    /// the same `session_id` already exists.
    pub async fn upsert(
        pool: &PgPool,
        body: &NewStreamMetadata,
    ) -> Result<StreamMetadata, sqlx::Error> {
        let query = format!(
            "INSERT INTO stream_metadata
                 (session_id, session_name, duration, resolution, format, preview_path)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (session_id) DO UPDATE SET
                 session_name = EXCLUDED.session_name,
                 duration = EXCLUDED.duration,
                 resolution = EXCLUDED.resolution,
                 format = EXCLUDED.format,
                 preview_path = EXCLUDED.preview_path
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StreamMetadata>(&query)
            .bind(&body.session_id)
            .bind(&body.session_name)
            .bind(body.duration)
            .bind(&body.resolution)
            .bind(&body.format)
            .bind(&body.preview_path)
            .fetch_one(pool)
            .await
    }

    /// Update only the recorded duration of a session.
    pub async fn update_duration(
        pool: &PgPool,
        session_id: &str,
        duration: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE stream_metadata SET duration = $2 WHERE session_id = $1")
            .bind(session_id)
            .bind(duration)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Find a metadata row by session id.
    pub async fn find_by_id(
        pool: &PgPool,
        session_id: &str,
    ) -> Result<Option<StreamMetadata>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM stream_metadata WHERE session_id = $1");
        sqlx::query_as::<_, StreamMetadata>(&query)
            .bind(session_id)
            .fetch_optional(pool)
            .await
    }

    /// Find the most recently created metadata row for a session name.
    pub async fn find_by_name(
        pool: &PgPool,
        session_name: &str,
    ) -> Result<Option<StreamMetadata>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM stream_metadata
             WHERE session_name = $1
             ORDER BY created_at DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, StreamMetadata>(&query)
            .bind(session_name)
            .fetch_optional(pool)
            .await
    }
}
