//! Integration tests for the control endpoints: start/stop validation,
//! listings, and configuration round-trips.

mod common;

use axum::http::StatusCode;
use common::{body_json, body_text, get, post_form, post_json};
use sqlx::PgPool;

async fn archive_count(pool: &PgPool) -> i64 {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM archive")
        .fetch_one(pool)
        .await
        .unwrap();
    count.0
}

// ---------------------------------------------------------------------------
// /start-stream boundaries
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_without_rtsp_url_is_400_with_no_side_effects(pool: PgPool) {
    let test = common::build_test_app(pool.clone()).await;
    let response = post_form(test.app, "/start-stream", "stream_id=camA").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("Missing rtsp_url parameter"));

    // No rows were written and no session exists.
    assert_eq!(archive_count(&pool).await, 0);
    let metadata: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stream_metadata")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(metadata.0, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_without_stream_id_is_400(pool: PgPool) {
    let test = common::build_test_app(pool).await;
    let response = post_form(
        test.app,
        "/start-stream",
        "rtsp_url=rtsp%3A%2F%2Fcam.local%2Flive",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_with_non_rtsp_scheme_is_400(pool: PgPool) {
    let test = common::build_test_app(pool).await;
    let response = post_form(
        test.app,
        "/start-stream",
        "rtsp_url=http%3A%2F%2Fcam.local%2Flive&stream_id=camA",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("rtsp"));
}

// ---------------------------------------------------------------------------
// /stop-stream boundaries
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn stop_of_unknown_name_is_404_without_archive_row(pool: PgPool) {
    let test = common::build_test_app(pool.clone()).await;
    let response = post_form(test.app, "/stop-stream", "stream_id=ghost").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(archive_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stop_without_stream_id_is_400(pool: PgPool) {
    let test = common::build_test_app(pool).await;
    let response = post_form(test.app, "/stop-stream", "").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// /update-video-params boundaries
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn video_params_for_unknown_stream_is_404(pool: PgPool) {
    let test = common::build_test_app(pool).await;
    let response = post_json(
        test.app,
        "/update-video-params?stream_id=ghost",
        serde_json::json!({"video_bitrate": "4000k"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn video_params_without_stream_id_is_400(pool: PgPool) {
    let test = common::build_test_app(pool).await;
    let response = post_json(
        test.app,
        "/update-video-params",
        serde_json::json!({"quality": "high"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_streams_is_empty_map_without_sessions(pool: PgPool) {
    let test = common::build_test_app(pool).await;
    let response = get(test.app, "/list-streams").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json, serde_json::json!({}));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn archive_list_includes_seeded_session(pool: PgPool) {
    let test = common::build_test_app(pool).await;
    let session_id = common::seed_archived_session(&test.state, "camA", 3).await;

    let response = get(test.app, "/archive/list").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let entry = &json[&session_id];
    assert_eq!(entry["stream_name"], "camA");
    assert_eq!(entry["status"], "completed");
    assert_eq!(entry["duration"], 6);
    assert_eq!(entry["hls_url"], "/archive/camA");
    assert_eq!(entry["preview_url"], "/preview/camA");
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn get_config_returns_current_settings(pool: PgPool) {
    let test = common::build_test_app(pool).await;
    let response = get(test.app, "/get-config").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["server_port"], 8080);
    assert_eq!(json["ffmpeg"]["hls_segment_time"], "2");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_config_round_trips(pool: PgPool) {
    let test = common::build_test_app(pool).await;

    // Fetch the current config, change a value, post it back.
    let mut cfg = body_json(get(test.app.clone(), "/get-config").await).await;
    cfg["server_port"] = serde_json::json!(9090);
    cfg["ffmpeg"]["video_bitrate"] = serde_json::json!("4000k");

    let response = post_json(test.app.clone(), "/update-config", cfg.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "Configuration updated successfully"
    );

    // Reading back yields the posted configuration.
    let after = body_json(get(test.app.clone(), "/get-config").await).await;
    assert_eq!(after, cfg);

    // The update was written through to the backing file.
    let on_disk: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(test.state.config_path.as_ref()).unwrap(),
    )
    .unwrap();
    assert_eq!(on_disk, cfg);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_config_rejects_malformed_json(pool: PgPool) {
    let test = common::build_test_app(pool).await;

    let request = axum::http::Request::builder()
        .method(axum::http::Method::POST)
        .uri("/update-config")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(test.app, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_config_rejects_out_of_range_port(pool: PgPool) {
    let test = common::build_test_app(pool).await;

    let mut cfg = body_json(get(test.app.clone(), "/get-config").await).await;
    cfg["server_port"] = serde_json::json!(0);

    let response = post_json(test.app, "/update-config", cfg).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
