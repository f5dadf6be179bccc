//! Shared application router builder.
//!
//! Provides [`build_app_router`] so both the production binary and the
//! integration tests use the exact same middleware stack.

use std::time::Duration;

use axum::extract::Request;
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers::{control, delivery};
use crate::state::AppState;

/// HTTP request timeout. Generous because `/start-stream` probes the RTSP
/// source synchronously before responding.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the full application [`Router`] with all middleware layers.
///
/// The middleware stack is applied bottom-up:
///
/// 1. CORS (adds headers everywhere, short-circuits `OPTIONS` with 204)
/// 2. Set request ID on incoming requests
/// 3. Structured request/response tracing
/// 4. Propagate request ID to response
/// 5. Request timeout
/// 6. Panic recovery (catch panics, return 500)
pub fn build_app_router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(control::health))
        .route("/start-stream", post(control::start_stream))
        .route("/stop-stream", post(control::stop_stream))
        .route("/list-streams", get(control::list_streams))
        .route("/stream/{name}", get(delivery::stream_entry))
        .route("/stream/{name}/{segment}", get(delivery::stream_segment))
        .route("/archive/list", get(control::list_archive))
        .route("/archive/{name}", get(delivery::archive_entry))
        .route("/archive/{name}/{segment}", get(delivery::archive_segment))
        .route("/preview/{name}", get(delivery::preview))
        .route("/update-video-params", post(control::update_video_params))
        .route("/get-config", get(control::get_config))
        .route("/update-config", post(control::update_config))
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Permissive CORS for the delivery and control surfaces: every response
/// carries `Access-Control-Allow-Origin: *`, and preflight `OPTIONS`
/// requests short-circuit with 204 before routing.
async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(&mut response);
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(&mut response);
    response
}

fn apply_cors_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
}
