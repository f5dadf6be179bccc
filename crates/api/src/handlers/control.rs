//! Control endpoints: health, start/stop/list, archive listing, and runtime
//! configuration.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use streamvault_core::config::AppConfig;
use streamvault_core::error::StreamError;
use streamvault_core::types::Timestamp;
use streamvault_db::models::archive::ArchiveEntry;
use streamvault_db::models::processing_log::LEVEL_INFO;
use streamvault_db::models::stream_metadata::StreamMetadata;
use streamvault_db::repositories::{ArchiveRepo, ProcessingLogRepo, StreamMetadataRepo};

use crate::error::{AppError, AppResult};
use crate::sessions::manager::LiveSession;
use crate::state::AppState;

/// Public description of a session, live or archived.
#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub id: String,
    pub stream_name: String,
    pub rtsp_url: String,
    pub hls_url: String,
    pub hls_path: String,
    pub duration: i32,
    pub started_at: Timestamp,
    pub status: String,
    pub preview_url: String,
}

impl StreamResponse {
    fn live(session: &LiveSession, meta: Option<&StreamMetadata>) -> Self {
        Self {
            id: session.session_id.clone(),
            stream_name: session.session_name.clone(),
            rtsp_url: session.source_url.clone(),
            hls_url: format!("/stream/{}", session.session_name),
            hls_path: session.playlist_path.display().to_string(),
            duration: meta.map(|m| m.duration).unwrap_or(0),
            started_at: session.started_at,
            status: session.status.to_string(),
            preview_url: format!("/preview/{}", session.session_name),
        }
    }

    fn archived(entry: &ArchiveEntry, meta: Option<&StreamMetadata>) -> Self {
        let has_preview = meta
            .and_then(|m| m.preview_path.as_deref())
            .is_some_and(|p| !p.is_empty());
        Self {
            id: entry.session_id.clone(),
            stream_name: entry.session_name.clone(),
            rtsp_url: if meta.is_some() {
                "archived_stream".to_string()
            } else {
                "unknown".to_string()
            },
            hls_url: format!("/archive/{}", entry.session_name),
            hls_path: entry.playlist_path.clone(),
            duration: entry.duration,
            started_at: meta.map(|m| m.created_at).unwrap_or(entry.archived_at),
            status: entry.status.clone(),
            preview_url: if has_preview {
                format!("/preview/{}", entry.session_name)
            } else {
                String::new()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Form types
// ---------------------------------------------------------------------------

/// Form body for `POST /start-stream`. The `stream_id` field carries the
/// caller-chosen session name.
#[derive(Debug, Deserialize)]
pub struct StartStreamForm {
    pub rtsp_url: Option<String>,
    pub stream_id: Option<String>,
}

/// Form body for `POST /stop-stream`.
#[derive(Debug, Deserialize)]
pub struct StopStreamForm {
    pub stream_id: Option<String>,
}

/// Query string for `POST /update-video-params`.
#[derive(Debug, Deserialize)]
pub struct VideoParamsQuery {
    pub stream_id: Option<String>,
}

/// Requested encoding changes for a session.
#[derive(Debug, Deserialize)]
pub struct VideoParamsRequest {
    pub video_bitrate: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub quality: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> &'static str {
    "Server is running"
}

/// POST /start-stream
pub async fn start_stream(
    State(state): State<AppState>,
    Form(form): Form<StartStreamForm>,
) -> AppResult<Json<serde_json::Value>> {
    let rtsp_url = form
        .rtsp_url
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing rtsp_url parameter".to_string()))?;
    let session_name = form
        .stream_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing stream_id parameter".to_string()))?;

    let session_id = state.sessions.start(rtsp_url, session_name).await?;

    Ok(Json(json!({
        "message": "Stream started",
        "session_id": session_id,
    })))
}

/// POST /stop-stream
pub async fn stop_stream(
    State(state): State<AppState>,
    Form(form): Form<StopStreamForm>,
) -> AppResult<Json<serde_json::Value>> {
    let session_name = form
        .stream_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing stream_id parameter".to_string()))?;

    state.sessions.stop(&session_name).await?;

    Ok(Json(json!({"message": "Stream stopped"})))
}

/// GET /list-streams
///
/// The live set is snapshotted first; metadata reads happen outside the
/// lock, and a metadata miss degrades the entry rather than failing the
/// listing.
pub async fn list_streams(
    State(state): State<AppState>,
) -> AppResult<Json<HashMap<String, StreamResponse>>> {
    let mut map = HashMap::new();
    for session in state.sessions.list() {
        let meta = match StreamMetadataRepo::find_by_id(&state.pool, &session.session_id).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(
                    session_id = %session.session_id,
                    error = %e,
                    "Failed to load metadata for live session",
                );
                None
            }
        };
        map.insert(
            session.session_id.clone(),
            StreamResponse::live(&session, meta.as_ref()),
        );
    }
    Ok(Json(map))
}

/// GET /archive/list
pub async fn list_archive(
    State(state): State<AppState>,
) -> AppResult<Json<HashMap<String, StreamResponse>>> {
    let archives = ArchiveRepo::list_all(&state.pool).await?;

    let mut map = HashMap::new();
    for entry in &archives {
        let meta = match StreamMetadataRepo::find_by_id(&state.pool, &entry.session_id).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(
                    session_id = %entry.session_id,
                    error = %e,
                    "Failed to load metadata for archived session",
                );
                None
            }
        };
        map.insert(
            entry.session_id.clone(),
            StreamResponse::archived(entry, meta.as_ref()),
        );
    }
    Ok(Json(map))
}

/// POST /update-video-params?stream_id={name}
///
/// Records requested encoding changes for a running session. Transcoder
/// parameters never change under a running child; the recorded values take
/// effect when a session is next started with updated configuration.
pub async fn update_video_params(
    State(state): State<AppState>,
    Query(query): Query<VideoParamsQuery>,
    Json(params): Json<VideoParamsRequest>,
) -> AppResult<&'static str> {
    let session_name = query
        .stream_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing stream_id parameter".to_string()))?;

    let session = state
        .sessions
        .resolve_name(&session_name)
        .ok_or_else(|| StreamError::NotFound(session_name.clone()))?;

    tracing::info!(
        session_id = %session.session_id,
        params = ?params,
        "Received video parameter update request",
    );
    if let Err(e) = ProcessingLogRepo::append(
        &state.pool,
        &session.session_id,
        &session.session_name,
        "Video parameter update requested",
        LEVEL_INFO,
    )
    .await
    {
        tracing::warn!(
            session_id = %session.session_id,
            error = %e,
            "Failed to record video parameter update",
        );
    }

    Ok("Video parameters updated successfully")
}

/// GET /get-config
pub async fn get_config(State(state): State<AppState>) -> Json<AppConfig> {
    Json(state.config.read().expect("config lock poisoned").clone())
}

/// POST /update-config
///
/// Parses and validates the replacement configuration, writes it through to
/// the backing file, and swaps it in under the writer lock. Running
/// sessions keep the snapshot they started with.
pub async fn update_config(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<&'static str> {
    let new_cfg = AppConfig::from_update(&body)?;
    new_cfg.persist(&state.config_path)?;

    {
        let mut cfg = state.config.write().expect("config lock poisoned");
        *cfg = new_cfg;
    }

    tracing::info!("Configuration updated");
    Ok("Configuration updated successfully")
}
