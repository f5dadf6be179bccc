//! Repository for the `hls_merkle_proofs` table.

use sqlx::PgPool;

use crate::models::segment_proof::SegmentProof;

const COLUMNS: &str = "id, session_id, session_name, segment_index, proof_blob, created_at";

/// Persistence for per-segment inclusion proofs.
pub struct SegmentProofRepo;

impl SegmentProofRepo {
    /// Insert the proof for one segment.
    pub async fn insert(
        pool: &PgPool,
        session_id: &str,
        session_name: &str,
        segment_index: i32,
        proof_blob: &str,
    ) -> Result<SegmentProof, sqlx::Error> {
        let query = format!(
            "INSERT INTO hls_merkle_proofs (session_id, session_name, segment_index, proof_blob)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SegmentProof>(&query)
            .bind(session_id)
            .bind(session_name)
            .bind(segment_index)
            .bind(proof_blob)
            .fetch_one(pool)
            .await
    }

    /// Find the proof for one segment of a session.
    pub async fn find_by_index(
        pool: &PgPool,
        session_id: &str,
        segment_index: i32,
    ) -> Result<Option<SegmentProof>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM hls_merkle_proofs
             WHERE session_id = $1 AND segment_index = $2"
        );
        sqlx::query_as::<_, SegmentProof>(&query)
            .bind(session_id)
            .bind(segment_index)
            .fetch_optional(pool)
            .await
    }

    /// List all proofs for a session ordered by segment index.
    pub async fn list_for_session(
        pool: &PgPool,
        session_id: &str,
    ) -> Result<Vec<SegmentProof>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM hls_merkle_proofs
             WHERE session_id = $1
             ORDER BY segment_index"
        );
        sqlx::query_as::<_, SegmentProof>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }
}
