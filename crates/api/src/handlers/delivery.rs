//! Delivery endpoints: live and archive playlists, TS segments, seek
//! rewriting, and preview images.
//!
//! Live and archive paths are symmetric; only the name resolution differs.
//! `/stream/*` consults the session manager, `/archive/*` the archive
//! table (newest entry wins on name collision).

use std::path::{Path as FsPath, PathBuf};

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use streamvault_core::error::StreamError;
use streamvault_core::playlist::{self, SEGMENT_INFIX};
use streamvault_db::models::archive::ArchiveEntry;
use streamvault_db::repositories::{ArchiveRepo, StreamMetadataRepo};

use crate::error::{AppError, AppResult};
use crate::sessions::manager::LiveSession;
use crate::state::AppState;

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// Optional seek offset on playlist requests, in whole seconds.
#[derive(Debug, Deserialize)]
pub struct SeekParams {
    pub time: Option<i64>,
}

// ---------------------------------------------------------------------------
// Live endpoints
// ---------------------------------------------------------------------------

/// GET /stream/{name}[?time=N]
///
/// `name` is normally a session name; the deprecated short form passes a
/// bare segment file name instead, with the session name recovered from
/// the segment's id prefix.
pub async fn stream_entry(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<SeekParams>,
) -> AppResult<Response> {
    if is_segment_request(&name) {
        let session_name = playlist::session_name_from_segment(&name)
            .ok_or_else(|| AppError::BadRequest("Invalid segment name format".to_string()))?;
        let session = resolve_live(&state, session_name)?;
        return serve_segment(&session.playlist_path, &session.session_id, &name).await;
    }

    let session = resolve_live(&state, &name)?;
    serve_playlist(&state, &session.session_id, &session.playlist_path, params.time).await
}

/// GET /stream/{name}/{segment}
pub async fn stream_segment(
    State(state): State<AppState>,
    Path((name, segment)): Path<(String, String)>,
) -> AppResult<Response> {
    let session = resolve_live(&state, &name)?;
    serve_segment(&session.playlist_path, &session.session_id, &segment).await
}

// ---------------------------------------------------------------------------
// Archive endpoints
// ---------------------------------------------------------------------------

/// GET /archive/{name}[?time=N]
pub async fn archive_entry(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<SeekParams>,
) -> AppResult<Response> {
    if is_segment_request(&name) {
        let session_name = playlist::session_name_from_segment(&name)
            .ok_or_else(|| AppError::BadRequest("Invalid segment name format".to_string()))?;
        let entry = resolve_archive(&state, session_name).await?;
        return serve_segment(FsPath::new(&entry.playlist_path), &entry.session_id, &name).await;
    }

    let entry = resolve_archive(&state, &name).await?;
    serve_playlist(
        &state,
        &entry.session_id,
        FsPath::new(&entry.playlist_path),
        params.time,
    )
    .await
}

/// GET /archive/{name}/{segment}
pub async fn archive_segment(
    State(state): State<AppState>,
    Path((name, segment)): Path<(String, String)>,
) -> AppResult<Response> {
    let entry = resolve_archive(&state, &name).await?;
    serve_segment(FsPath::new(&entry.playlist_path), &entry.session_id, &segment).await
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// GET /preview/{name}
///
/// Resolves the live set first, then the archive; serves the JPEG captured
/// at session start.
pub async fn preview(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Response> {
    let meta = if let Some(session) = state.sessions.resolve_name(&name) {
        StreamMetadataRepo::find_by_id(&state.pool, &session.session_id).await?
    } else if ArchiveRepo::find_by_name(&state.pool, &name).await?.is_some() {
        StreamMetadataRepo::find_by_name(&state.pool, &name).await?
    } else {
        None
    };

    let preview_path = meta
        .and_then(|m| m.preview_path)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| StreamError::PreviewUnavailable(name.clone()))?;

    match serve_file(FsPath::new(&preview_path), "image/jpeg").await {
        Err(AppError::Stream(StreamError::FileNotFound(_))) => {
            Err(StreamError::PreviewUnavailable(name).into())
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Shared serving logic
// ---------------------------------------------------------------------------

fn is_segment_request(name: &str) -> bool {
    name.contains(SEGMENT_INFIX) && name.ends_with(".ts")
}

fn resolve_live(state: &AppState, name: &str) -> AppResult<LiveSession> {
    state
        .sessions
        .resolve_name(name)
        .ok_or_else(|| StreamError::NotFound(name.to_string()).into())
}

async fn resolve_archive(state: &AppState, name: &str) -> AppResult<ArchiveEntry> {
    ArchiveRepo::find_by_name(&state.pool, name)
        .await?
        .ok_or_else(|| StreamError::NotFound(name.to_string()).into())
}

/// Serve a playlist, rewriting it when a positive seek offset is given.
/// `time=0` is equivalent to the plain playlist and is served verbatim.
async fn serve_playlist(
    state: &AppState,
    session_id: &str,
    playlist_path: &FsPath,
    time: Option<i64>,
) -> AppResult<Response> {
    match time {
        Some(t) if t < 0 => Err(AppError::BadRequest("Invalid seek time".to_string())),
        Some(t) if t > 0 => {
            let segment_duration = state
                .config
                .read()
                .expect("config lock poisoned")
                .segment_duration_secs();
            let index = playlist::segment_index_for(t as u64, segment_duration);
            let segment = playlist::segment_file_name(session_id, index);

            let dir = playlist_dir(playlist_path)?;
            if tokio::fs::metadata(dir.join(&segment)).await.is_err() {
                return Err(
                    StreamError::SegmentNotFound(format!("no segment for time {t}")).into(),
                );
            }

            let source = read_playlist(playlist_path).await?;
            let body = playlist::rewrite_from_segment(&source, &segment).ok_or_else(|| {
                StreamError::SegmentNotFound(format!("no segment for time {t}"))
            })?;

            tracing::info!(session_id, seek_time = t, "Serving seek playlist");
            Ok(([(header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)], body).into_response())
        }
        _ => serve_file(playlist_path, PLAYLIST_CONTENT_TYPE).await,
    }
}

/// Validate and serve one TS segment belonging to `session_id`.
async fn serve_segment(
    playlist_path: &FsPath,
    session_id: &str,
    segment_name: &str,
) -> AppResult<Response> {
    if !playlist::is_segment_of(segment_name, session_id) {
        return Err(AppError::BadRequest("Invalid segment name format".to_string()));
    }
    let dir = playlist_dir(playlist_path)?;
    serve_file(&dir.join(segment_name), SEGMENT_CONTENT_TYPE).await
}

fn playlist_dir(playlist_path: &FsPath) -> AppResult<PathBuf> {
    playlist_path
        .parent()
        .map(FsPath::to_path_buf)
        .ok_or_else(|| {
            AppError::InternalError(format!(
                "playlist path has no parent directory: {}",
                playlist_path.display()
            ))
        })
}

async fn read_playlist(playlist_path: &FsPath) -> AppResult<String> {
    tokio::fs::read_to_string(playlist_path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::Stream(StreamError::FileNotFound(playlist_path.to_path_buf()))
            }
            _ => AppError::InternalError(format!(
                "failed to read playlist {}: {e}",
                playlist_path.display()
            )),
        })
}

/// Read a file fully and serve it with the given content type.
async fn serve_file(path: &FsPath, content_type: &'static str) -> AppResult<Response> {
    let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            AppError::Stream(StreamError::FileNotFound(path.to_path_buf()))
        }
        _ => AppError::InternalError(format!("failed to read {}: {e}", path.display())),
    })?;
    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}
