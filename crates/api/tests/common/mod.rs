// All functions in this module are shared test helpers. Not every test
// binary uses every helper, so we suppress dead_code warnings at the
// module level.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use streamvault_api::router::build_app_router;
use streamvault_api::sessions::manager::SessionManager;
use streamvault_api::state::AppState;
use streamvault_core::config::AppConfig;
use streamvault_db::models::archive::NewArchiveEntry;
use streamvault_db::models::stream_metadata::NewStreamMetadata;
use streamvault_db::repositories::{ArchiveRepo, StreamMetadataRepo};

/// Everything a test needs: the router, the state for seeding fixtures, and
/// the temp directory guard that owns the on-disk HLS tree.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub tmp: tempfile::TempDir,
}

/// Build the full application router against a throwaway HLS directory,
/// using the same middleware stack production uses.
pub async fn build_test_app(pool: PgPool) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();

    let mut cfg = AppConfig::default();
    cfg.video_dir = tmp.path().join("videos").display().to_string();
    cfg.thumbnail_dir = tmp.path().join("thumbnails").display().to_string();
    cfg.hls_dir = tmp.path().join("hls").display().to_string();
    cfg.ensure_dirs().unwrap();

    let config = Arc::new(RwLock::new(cfg));
    let sessions = Arc::new(SessionManager::new(pool.clone(), Arc::clone(&config)));
    let state = AppState {
        pool,
        config,
        config_path: Arc::new(tmp.path().join("config.json")),
        sessions,
    };
    let app = build_app_router(state.clone());

    TestApp { app, state, tmp }
}

/// Seed a fake archived session: `segments` two-second TS files plus a
/// playlist and preview on disk, with archive and metadata rows persisted.
/// Returns the session id.
pub async fn seed_archived_session(
    state: &AppState,
    session_name: &str,
    segments: usize,
) -> String {
    let session_id = format!("{}_{}_20260802120000", uuid::Uuid::new_v4(), session_name);

    let hls_dir = state
        .config
        .read()
        .unwrap()
        .hls_dir
        .clone();
    let dir = PathBuf::from(hls_dir).join(&session_id);
    std::fs::create_dir_all(&dir).unwrap();

    let playlist_path = dir.join("index.m3u8");
    let mut playlist = String::from(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:2\n#EXT-X-MEDIA-SEQUENCE:0\n",
    );
    for i in 0..segments {
        let name = format!("{session_id}_segment_{i:03}.ts");
        std::fs::write(dir.join(&name), format!("ts-payload-{i}")).unwrap();
        playlist.push_str("#EXTINF:2.000000,\n");
        playlist.push_str(&name);
        playlist.push('\n');
    }
    playlist.push_str("#EXT-X-ENDLIST\n");
    std::fs::write(&playlist_path, &playlist).unwrap();

    let preview_path = dir.join("preview.jpg");
    std::fs::write(&preview_path, b"\xFF\xD8\xFF\xE0 jpeg bytes").unwrap();

    ArchiveRepo::insert(
        &state.pool,
        &NewArchiveEntry {
            session_id: session_id.clone(),
            session_name: session_name.to_string(),
            status: "completed".to_string(),
            duration: (segments * 2) as i32,
            playlist_path: playlist_path.display().to_string(),
            archived_at: chrono::Utc::now(),
        },
    )
    .await
    .unwrap();

    StreamMetadataRepo::upsert(
        &state.pool,
        &NewStreamMetadata {
            session_id: session_id.clone(),
            session_name: session_name.to_string(),
            duration: (segments * 2) as i32,
            resolution: Some("1920x1080".to_string()),
            format: "hls".to_string(),
            preview_path: Some(preview_path.display().to_string()),
        },
    )
    .await
    .unwrap();

    session_id
}

// ---------------------------------------------------------------------------
// Shared HTTP test helpers
// ---------------------------------------------------------------------------

/// Send a GET request.
pub async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Send a POST with a urlencoded form body.
pub async fn post_form(app: Router, uri: &str, body: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST with a JSON body.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect the response body into a `serde_json::Value`.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect the response body into a `String`.
pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Collect the raw response body bytes (for binary payloads).
pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
