//! Segment integrity builder: hash the session's segment files in order,
//! build the hash tree, and persist one inclusion proof per segment plus
//! the playlist record.

use std::path::Path;

use streamvault_core::error::StreamError;
use streamvault_core::hashing;
use streamvault_core::merkle::MerkleTree;
use streamvault_core::playlist;
use streamvault_db::repositories::{HlsPlaylistRepo, SegmentProofRepo};
use streamvault_db::DbPool;

use crate::sessions::manager::LiveSession;

/// Build and persist integrity proofs for a finished session. Returns the
/// number of segments covered.
///
/// Individual unreadable segments are logged and skipped; an empty result
/// set fails with `NoSegments`.
pub async fn build_and_persist(
    pool: &DbPool,
    session: &LiveSession,
) -> Result<usize, StreamError> {
    let dir = session.playlist_path.parent().ok_or_else(|| {
        StreamError::Internal(format!(
            "playlist path has no parent directory: {}",
            session.playlist_path.display()
        ))
    })?;

    let names = segment_files(dir, &session.session_id).await?;
    if names.is_empty() {
        return Err(StreamError::NoSegments(dir.to_path_buf()));
    }

    // One 32-byte block per segment: the SHA-256 of its contents. The tree
    // hashes the blocks again to form its leaves.
    let mut blocks: Vec<[u8; 32]> = Vec::with_capacity(names.len());
    for name in &names {
        match tokio::fs::read(dir.join(name)).await {
            Ok(data) => blocks.push(hashing::sha256(&data)),
            Err(e) => {
                tracing::warn!(
                    session_id = %session.session_id,
                    segment = %name,
                    error = %e,
                    "Failed to read HLS segment, skipping",
                );
            }
        }
    }
    if blocks.is_empty() {
        return Err(StreamError::NoSegments(dir.to_path_buf()));
    }

    streamvault_db::health_check(pool)
        .await
        .map_err(|e| StreamError::Persistence(e.to_string()))?;

    let tree = MerkleTree::build(&blocks)?;
    let mut persisted = 0usize;
    for i in 0..tree.leaf_count() {
        let proof = tree.prove(i)?;
        let blob = serde_json::to_string(&proof.path)
            .map_err(|e| StreamError::Internal(format!("failed to serialize proof: {e}")))?;
        match SegmentProofRepo::insert(
            pool,
            &session.session_id,
            &session.session_name,
            i as i32,
            &blob,
        )
        .await
        {
            Ok(_) => persisted += 1,
            Err(e) => {
                tracing::warn!(
                    session_id = %session.session_id,
                    segment_index = i,
                    error = %e,
                    "Failed to persist segment proof",
                );
            }
        }
    }

    HlsPlaylistRepo::insert(
        pool,
        &session.session_id,
        &session.session_name,
        &session.playlist_path.display().to_string(),
    )
    .await
    .map_err(|e| StreamError::Persistence(e.to_string()))?;

    Ok(persisted)
}

/// List the session's segment files in index order. The zero-padded index
/// makes the lexicographic sort the index sort.
async fn segment_files(dir: &Path, session_id: &str) -> Result<Vec<String>, StreamError> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if playlist::is_segment_of(&name, session_id) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
