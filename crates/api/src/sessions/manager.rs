//! The live-session set and its lifecycle operations.
//!
//! Sessions are keyed by session id with a secondary lookup by name; both
//! live under one readers/writer lock. Writers (start, stop, shutdown) take
//! the exclusive side, readers (list, resolve) the shared side. The lock is
//! never held across an await and the database is never touched under it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use streamvault_core::config::{ensure_directory, SharedConfig};
use streamvault_core::error::StreamError;
use streamvault_core::probe;
use streamvault_core::types::{SessionStatus, Timestamp};
use streamvault_db::models::archive::NewArchiveEntry;
use streamvault_db::models::processing_log::{LEVEL_INFO, LEVEL_WARNING};
use streamvault_db::models::stream_metadata::NewStreamMetadata;
use streamvault_db::repositories::{ArchiveRepo, ProcessingLogRepo, StreamMetadataRepo};
use streamvault_db::DbPool;

use crate::error::AppResult;
use crate::sessions::pipeline;

/// File name of the per-session HLS playlist.
pub const PLAYLIST_FILE_NAME: &str = "index.m3u8";

/// One live streaming session. Exists iff its transcoder child has been
/// launched and not yet reaped.
#[derive(Debug, Clone)]
pub struct LiveSession {
    pub session_id: String,
    pub session_name: String,
    pub source_url: String,
    pub playlist_path: PathBuf,
    pub started_at: Timestamp,
    pub status: SessionStatus,
    pub(crate) cancel: CancellationToken,
}

impl LiveSession {
    /// Seconds elapsed since the session started.
    pub fn elapsed_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}

/// Owns the set of live sessions and drives their lifecycle.
pub struct SessionManager {
    pool: DbPool,
    config: SharedConfig,
    live: RwLock<HashMap<String, LiveSession>>,
    shutdown: CancellationToken,
}

impl SessionManager {
    pub fn new(pool: DbPool, config: SharedConfig) -> Self {
        Self {
            pool,
            config,
            live: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Synthesize a globally unique session id from the caller-chosen name.
    fn synthesize_session_id(session_name: &str) -> String {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        format!("{}_{}_{}", Uuid::new_v4(), session_name, timestamp)
    }

    /// Start a new session: probe the source, persist initial metadata,
    /// install the live session, and launch the pipeline task.
    ///
    /// Returns the new session id. Probe failures abort before any live
    /// session exists; no archive row is written for them.
    pub async fn start(
        self: &Arc<Self>,
        source_url: String,
        session_name: String,
    ) -> AppResult<String> {
        if self.resolve_name(&session_name).is_some() {
            return Err(StreamError::DuplicateName(session_name).into());
        }

        let session_id = Self::synthesize_session_id(&session_name);
        let cfg = self.config.read().expect("config lock poisoned").clone();

        let session_dir = Path::new(&cfg.hls_dir).join(&session_id);
        ensure_directory(&session_dir)?;
        let playlist_path = session_dir.join(PLAYLIST_FILE_NAME);

        let cancel = self.shutdown.child_token();

        probe::resolve(&source_url).await?;
        probe::reach(&cancel, &source_url).await?;
        let info = probe::describe(&cancel, &source_url).await?;

        // Preview failure is logged but never aborts the session.
        let preview_path = match probe::snapshot(&cancel, &source_url, &session_dir).await {
            Ok(path) => Some(path.display().to_string()),
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "Preview extraction failed");
                let _ = ProcessingLogRepo::append(
                    &self.pool,
                    &session_id,
                    &session_name,
                    &format!("Preview extraction failed: {e}"),
                    LEVEL_WARNING,
                )
                .await;
                None
            }
        };

        streamvault_db::health_check(&self.pool).await?;
        StreamMetadataRepo::upsert(
            &self.pool,
            &NewStreamMetadata {
                session_id: session_id.clone(),
                session_name: session_name.clone(),
                duration: 0,
                resolution: info.resolution.clone(),
                format: "hls".to_string(),
                preview_path,
            },
        )
        .await?;
        ProcessingLogRepo::append(
            &self.pool,
            &session_id,
            &session_name,
            "Started processing RTSP stream",
            LEVEL_INFO,
        )
        .await?;

        let session = LiveSession {
            session_id: session_id.clone(),
            session_name: session_name.clone(),
            source_url,
            playlist_path,
            started_at: Utc::now(),
            status: SessionStatus::Running,
            cancel,
        };

        {
            let mut live = self.live.write().expect("live set lock poisoned");
            // Re-check under the write lock: of two concurrent starts with
            // the same name, exactly one wins.
            if live.values().any(|s| s.session_name == session_name) {
                return Err(StreamError::DuplicateName(session_name).into());
            }
            live.insert(session_id.clone(), session.clone());
        }

        tracing::info!(
            %session_id,
            %session_name,
            rtsp_url = %session.source_url,
            has_audio = info.has_audio,
            "Session started",
        );

        pipeline::launch(Arc::clone(self), session, cfg, info.has_audio);

        Ok(session_id)
    }

    /// Stop a session by name or id. Cancels the transcoder, writes the
    /// archive row, and removes the session from the live set; supervisor
    /// teardown completes in the background.
    pub async fn stop(&self, name_or_id: &str) -> AppResult<()> {
        let session = self
            .resolve(name_or_id)
            .ok_or_else(|| StreamError::NotFound(name_or_id.to_string()))?;

        session.cancel.cancel();

        self.write_archive(&session, SessionStatus::Completed, session.elapsed_secs())
            .await?;
        self.remove(&session.session_id);

        tracing::info!(
            session_id = %session.session_id,
            session_name = %session.session_name,
            "Session stopped",
        );
        Ok(())
    }

    /// A snapshot of all live sessions.
    pub fn list(&self) -> Vec<LiveSession> {
        self.live
            .read()
            .expect("live set lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Look up a live session by name.
    pub fn resolve_name(&self, session_name: &str) -> Option<LiveSession> {
        self.live
            .read()
            .expect("live set lock poisoned")
            .values()
            .find(|s| s.session_name == session_name)
            .cloned()
    }

    /// Look up a live session by id.
    pub fn resolve_id(&self, session_id: &str) -> Option<LiveSession> {
        self.live
            .read()
            .expect("live set lock poisoned")
            .get(session_id)
            .cloned()
    }

    /// Look up a live session by name, falling back to id.
    pub fn resolve(&self, name_or_id: &str) -> Option<LiveSession> {
        self.resolve_name(name_or_id)
            .or_else(|| self.resolve_id(name_or_id))
    }

    /// Cancel every live session, archive them all, and clear the set.
    /// Called on process shutdown.
    pub async fn shutdown(&self) {
        let sessions: Vec<LiveSession> = {
            let mut live = self.live.write().expect("live set lock poisoned");
            live.drain().map(|(_, s)| s).collect()
        };

        for session in &sessions {
            session.cancel.cancel();
            if let Err(e) = self
                .write_archive(session, SessionStatus::Completed, session.elapsed_secs())
                .await
            {
                tracing::error!(
                    session_id = %session.session_id,
                    error = %e,
                    "Failed to archive session during shutdown",
                );
            }
        }

        if !sessions.is_empty() {
            tracing::info!(count = sessions.len(), "All live sessions shut down");
        }
    }

    /// Write the archive row for a terminated session. A row already
    /// present for the same session id is left untouched.
    pub(crate) async fn write_archive(
        &self,
        session: &LiveSession,
        status: SessionStatus,
        duration_secs: i64,
    ) -> Result<(), sqlx::Error> {
        let entry = NewArchiveEntry {
            session_id: session.session_id.clone(),
            session_name: session.session_name.clone(),
            status: status.as_str().to_string(),
            duration: duration_secs as i32,
            playlist_path: session.playlist_path.display().to_string(),
            archived_at: Utc::now(),
        };

        match ArchiveRepo::insert(&self.pool, &entry).await? {
            Some(_) => {
                tracing::info!(
                    session_id = %session.session_id,
                    status = %status,
                    duration_secs,
                    "Session archived",
                );
                // An archive row without matching metadata is tolerated but
                // must leave a warning trail.
                match StreamMetadataRepo::find_by_id(&self.pool, &session.session_id).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        tracing::warn!(
                            session_id = %session.session_id,
                            "Archived session has no stream metadata",
                        );
                        let _ = ProcessingLogRepo::append(
                            &self.pool,
                            &session.session_id,
                            &session.session_name,
                            "No stream metadata found for archived session",
                            LEVEL_WARNING,
                        )
                        .await;
                    }
                    Err(e) => tracing::warn!(
                        session_id = %session.session_id,
                        error = %e,
                        "Failed to check stream metadata for archived session",
                    ),
                }
            }
            None => tracing::debug!(
                session_id = %session.session_id,
                "Session already archived",
            ),
        }
        Ok(())
    }

    /// Update the in-memory status of a live session, if still present.
    pub(crate) fn set_status(&self, session_id: &str, status: SessionStatus) {
        if let Some(s) = self
            .live
            .write()
            .expect("live set lock poisoned")
            .get_mut(session_id)
        {
            s.status = status;
        }
    }

    /// Remove a session from the live set.
    pub(crate) fn remove(&self, session_id: &str) {
        self.live
            .write()
            .expect("live set lock poisoned")
            .remove(session_id);
    }
}
