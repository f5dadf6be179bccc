//! The per-session background task: supervise the transcoder, update the
//! recorded duration, build segment integrity proofs, archive the session,
//! and remove it from the live set.
//!
//! Within one session the stages run strictly in sequence; sessions run
//! concurrently with each other.

use std::sync::Arc;

use streamvault_core::config::AppConfig;
use streamvault_core::transcoder;
use streamvault_core::types::SessionStatus;
use streamvault_db::models::processing_log::{LEVEL_ERROR, LEVEL_INFO, LEVEL_WARNING};
use streamvault_db::repositories::{ProcessingLogRepo, StreamMetadataRepo};
use streamvault_db::DbPool;

use crate::sessions::integrity;
use crate::sessions::manager::{LiveSession, SessionManager};

/// Launch the pipeline task for a freshly started session.
///
/// A watcher task observes the pipeline and converts a panic into a
/// `failed` archive entry so no session can vanish without a record.
pub fn launch(
    manager: Arc<SessionManager>,
    session: LiveSession,
    cfg: AppConfig,
    has_audio: bool,
) {
    let watcher_manager = Arc::clone(&manager);
    let watcher_session = session.clone();

    let task = tokio::spawn(run(manager, session, cfg, has_audio));

    tokio::spawn(async move {
        if let Err(join_err) = task.await {
            if join_err.is_panic() {
                tracing::error!(
                    session_id = %watcher_session.session_id,
                    "Session pipeline panicked",
                );
                log_line(
                    watcher_manager.pool(),
                    &watcher_session,
                    "Stream processing panicked",
                    LEVEL_ERROR,
                )
                .await;
                if let Err(e) = watcher_manager
                    .write_archive(
                        &watcher_session,
                        SessionStatus::Failed,
                        watcher_session.elapsed_secs(),
                    )
                    .await
                {
                    tracing::error!(
                        session_id = %watcher_session.session_id,
                        error = %e,
                        "Failed to archive panicked session",
                    );
                }
                watcher_manager.remove(&watcher_session.session_id);
            }
        }
    });
}

async fn run(manager: Arc<SessionManager>, session: LiveSession, cfg: AppConfig, has_audio: bool) {
    let pool = manager.pool().clone();

    let result = transcoder::run(
        &session.cancel,
        &cfg.ffmpeg,
        &session.source_url,
        &session.session_id,
        &session.playlist_path,
        has_audio,
    )
    .await;

    // Cancellation is a normal completion; only a natural transcoder
    // failure flips the session to failed.
    let status = match &result {
        Ok(_) => SessionStatus::Completed,
        Err(_) if session.cancel.is_cancelled() => SessionStatus::Completed,
        Err(_) => SessionStatus::Failed,
    };
    let duration_secs = match &result {
        Ok(d) => *d as i64,
        Err(_) => session.elapsed_secs(),
    };
    manager.set_status(&session.session_id, status);

    if let Err(e) =
        StreamMetadataRepo::update_duration(&pool, &session.session_id, duration_secs as i32).await
    {
        tracing::error!(
            session_id = %session.session_id,
            error = %e,
            "Failed to update stream duration",
        );
    }

    match &result {
        Ok(_) => {
            // Builder failure is non-fatal: the session archives without
            // proof rows.
            match integrity::build_and_persist(&pool, &session).await {
                Ok(count) => {
                    tracing::info!(
                        session_id = %session.session_id,
                        segments = count,
                        "Segment integrity proofs persisted",
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %session.session_id,
                        error = %e,
                        "Segment integrity build failed",
                    );
                    log_line(
                        &pool,
                        &session,
                        &format!("Segment integrity build failed: {e}"),
                        LEVEL_WARNING,
                    )
                    .await;
                }
            }
        }
        Err(e) => {
            tracing::error!(
                session_id = %session.session_id,
                error = %e,
                "Stream processing failed",
            );
            log_line(
                &pool,
                &session,
                &format!("Stream processing failed: {e}"),
                LEVEL_ERROR,
            )
            .await;
        }
    }

    if let Err(e) = manager
        .write_archive(&session, status, duration_secs)
        .await
    {
        tracing::error!(
            session_id = %session.session_id,
            error = %e,
            "Failed to archive session",
        );
    }

    if status == SessionStatus::Completed {
        log_line(
            &pool,
            &session,
            "Successfully processed RTSP stream",
            LEVEL_INFO,
        )
        .await;
    }

    manager.remove(&session.session_id);
}

/// Append a processing log line, downgrading persistence failures to a
/// tracing warning so logging can never take a session down.
async fn log_line(pool: &DbPool, session: &LiveSession, message: &str, level: &str) {
    if let Err(e) = ProcessingLogRepo::append(
        pool,
        &session.session_id,
        &session.session_name,
        message,
        level,
    )
    .await
    {
        tracing::warn!(
            session_id = %session.session_id,
            error = %e,
            "Failed to append processing log line",
        );
    }
}
