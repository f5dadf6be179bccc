use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use streamvault_core::error::StreamError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`StreamError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `streamvault_core`.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Stream(err) => classify_stream_error(err),
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PERSISTENCE_ERROR",
                    "A persistence error occurred".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a domain error onto an HTTP status, error code, and message.
///
/// Validation problems map to 400, missing resources to 404; everything the
/// caller cannot fix by changing the request maps to 500.
fn classify_stream_error(err: &StreamError) -> (StatusCode, &'static str, String) {
    match err {
        StreamError::InvalidInput(_)
        | StreamError::InvalidUrl(_)
        | StreamError::InvalidScheme(_)
        | StreamError::InvalidIndex(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_INPUT", err.to_string())
        }

        StreamError::NotFound(_) | StreamError::NoSegments(_) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
        }

        StreamError::SegmentNotFound(_) => {
            (StatusCode::NOT_FOUND, "SEGMENT_NOT_FOUND", err.to_string())
        }

        StreamError::FileNotFound(_) => {
            (StatusCode::NOT_FOUND, "FILE_NOT_FOUND", err.to_string())
        }

        StreamError::PreviewUnavailable(_) => {
            (StatusCode::NOT_FOUND, "PREVIEW_NOT_FOUND", err.to_string())
        }

        // The message carries "already exists" so concurrent starters can
        // tell the loser apart.
        StreamError::DuplicateName(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "DUPLICATE_NAME",
            err.to_string(),
        ),

        StreamError::UnresolvableHost(_)
        | StreamError::SourceUnavailable(_)
        | StreamError::NoVideoStream => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "SOURCE_UNAVAILABLE",
            err.to_string(),
        ),

        StreamError::TranscoderFailed { .. } => {
            tracing::error!(error = %err, "Transcoder failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TRANSCODER_FAILED",
                err.to_string(),
            )
        }

        StreamError::Persistence(_) => {
            tracing::error!(error = %err, "Persistence failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_ERROR",
                "A persistence error occurred".to_string(),
            )
        }

        StreamError::Io(_) | StreamError::Internal(_) => {
            tracing::error!(error = %err, "Internal error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: StreamError) -> StatusCode {
        classify_stream_error(&err).0
    }

    #[test]
    fn validation_errors_map_to_400() {
        assert_eq!(
            status_of(StreamError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StreamError::InvalidScheme("http".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StreamError::InvalidUrl("x".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_resources_map_to_404() {
        assert_eq!(
            status_of(StreamError::NotFound("camA".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StreamError::SegmentNotFound("no segment for time 9".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StreamError::FileNotFound("x.ts".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StreamError::PreviewUnavailable("camA".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn duplicate_name_is_500_with_telltale_message() {
        let (status, _, message) =
            classify_stream_error(&StreamError::DuplicateName("camB".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(message.contains("already exists"));
    }

    #[test]
    fn runtime_failures_map_to_500() {
        assert_eq!(
            status_of(StreamError::SourceUnavailable("timeout".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(StreamError::NoVideoStream),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(StreamError::TranscoderFailed {
                exit_code: Some(1),
                diagnostic: "boom".into(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
