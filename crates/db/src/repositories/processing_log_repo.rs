//! Repository for the append-only `processing_logs` table.

use sqlx::PgPool;

use crate::models::processing_log::ProcessingLog;

const COLUMNS: &str = "id, session_id, session_name, message, level, created_at";

/// Append-only persistence for processing log lines.
pub struct ProcessingLogRepo;

impl ProcessingLogRepo {
    /// Append one log line for a session.
    pub async fn append(
        pool: &PgPool,
        session_id: &str,
        session_name: &str,
        message: &str,
        level: &str,
    ) -> Result<ProcessingLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO processing_logs (session_id, session_name, message, level)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProcessingLog>(&query)
            .bind(session_id)
            .bind(session_name)
            .bind(message)
            .bind(level)
            .fetch_one(pool)
            .await
    }

    /// List all log lines for a session in insertion order.
    pub async fn list_for_session(
        pool: &PgPool,
        session_id: &str,
    ) -> Result<Vec<ProcessingLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM processing_logs
             WHERE session_id = $1
             ORDER BY id"
        );
        sqlx::query_as::<_, ProcessingLog>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }
}
