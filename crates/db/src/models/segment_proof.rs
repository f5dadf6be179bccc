//! Segment inclusion proof entity model.

use serde::Serialize;
use sqlx::FromRow;
use streamvault_core::types::Timestamp;

/// A row from the `hls_merkle_proofs` table.
///
/// `proof_blob` holds the serialized sibling path from leaf to root: a JSON
/// array of `{"hash": "<hex>", "is_left": bool}` objects.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SegmentProof {
    pub id: i64,
    pub session_id: String,
    pub session_name: String,
    pub segment_index: i32,
    pub proof_blob: String,
    pub created_at: Timestamp,
}
