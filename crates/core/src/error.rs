use std::path::PathBuf;

/// Domain error for the streaming pipeline.
///
/// Variants map one-to-one onto the failure kinds surfaced to API callers;
/// the HTTP layer decides status codes.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session '{0}' already exists")]
    DuplicateName(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid RTSP URL: {0}")]
    InvalidUrl(String),

    #[error("URL scheme must be 'rtsp', got '{0}'")]
    InvalidScheme(String),

    #[error("Failed to resolve hostname '{0}'")]
    UnresolvableHost(String),

    #[error("RTSP source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No video stream found in RTSP source")]
    NoVideoStream,

    #[error("No valid HLS segments found in {0}")]
    NoSegments(PathBuf),

    #[error("Segment not found: {0}")]
    SegmentNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid leaf index: {0}")]
    InvalidIndex(usize),

    #[error("Transcoder exited with status {exit_code:?}: {diagnostic}")]
    TranscoderFailed {
        exit_code: Option<i32>,
        diagnostic: String,
    },

    #[error("Preview unavailable: {0}")]
    PreviewUnavailable(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
