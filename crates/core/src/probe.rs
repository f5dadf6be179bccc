//! RTSP source probing via the external `ffprobe`/`ffmpeg` tools: URL
//! validation and DNS resolution, a short test ingest, stream composition,
//! and still-frame preview extraction.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::StreamError;

/// Upper bound for a single probe-tool invocation.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// File name of the per-session preview image.
pub const PREVIEW_FILE_NAME: &str = "preview.jpg";

/// Composition of an RTSP source as reported by ffprobe.
#[derive(Debug, Clone, Default)]
pub struct StreamInfo {
    pub has_video: bool,
    pub has_audio: bool,
    /// `"<width>x<height>"` of the first video stream, when reported.
    pub resolution: Option<String>,
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-show_streams -print_format json`).
#[derive(Debug, Deserialize)]
struct FfprobeReport {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
}

impl FfprobeReport {
    fn into_stream_info(self) -> StreamInfo {
        let mut info = StreamInfo::default();
        for stream in &self.streams {
            match stream.codec_type.as_deref() {
                Some("video") => {
                    if !info.has_video {
                        if let (Some(w), Some(h)) = (stream.width, stream.height) {
                            info.resolution = Some(format!("{w}x{h}"));
                        }
                    }
                    info.has_video = true;
                }
                Some("audio") => info.has_audio = true,
                _ => {}
            }
        }
        info
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse and validate an RTSP URL: scheme must be `rtsp`, a host is
/// required, and the hostname must resolve.
pub async fn resolve(source_url: &str) -> Result<Url, StreamError> {
    let parsed =
        Url::parse(source_url).map_err(|e| StreamError::InvalidUrl(e.to_string()))?;

    if parsed.scheme() != "rtsp" {
        return Err(StreamError::InvalidScheme(parsed.scheme().to_string()));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| StreamError::InvalidUrl("URL must contain a host".to_string()))?;
    let port = parsed.port().unwrap_or(554);

    {
        let mut addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|_| StreamError::UnresolvableHost(host.to_string()))?;
        if addrs.next().is_none() {
            return Err(StreamError::UnresolvableHost(host.to_string()));
        }
    }

    Ok(parsed)
}

/// Check the source is reachable by ingesting one second of it into the
/// null muxer.
pub async fn reach(cancel: &CancellationToken, source_url: &str) -> Result<(), StreamError> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-rtsp_transport", "tcp", "-i", source_url, "-t", "1", "-f", "null", "-"]);

    let output = run_tool(cancel, cmd)
        .await
        .map_err(StreamError::SourceUnavailable)?;

    if !output.status.success() {
        return Err(StreamError::SourceUnavailable(format!(
            "test ingest failed (exit {:?}): {}",
            output.status.code(),
            stderr_tail(&output.stderr),
        )));
    }
    Ok(())
}

/// Query stream composition. Fails when the source carries no video stream.
pub async fn describe(
    cancel: &CancellationToken,
    source_url: &str,
) -> Result<StreamInfo, StreamError> {
    let mut cmd = Command::new("ffprobe");
    cmd.args([
        "-rtsp_transport",
        "tcp",
        "-show_streams",
        "-print_format",
        "json",
        source_url,
    ]);

    let output = run_tool(cancel, cmd)
        .await
        .map_err(StreamError::SourceUnavailable)?;

    if !output.status.success() {
        return Err(StreamError::SourceUnavailable(format!(
            "ffprobe failed (exit {:?}): {}",
            output.status.code(),
            stderr_tail(&output.stderr),
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let report: FfprobeReport = serde_json::from_str(&stdout)
        .map_err(|e| StreamError::SourceUnavailable(format!("bad ffprobe output: {e}")))?;

    let info = report.into_stream_info();
    if !info.has_video {
        return Err(StreamError::NoVideoStream);
    }
    Ok(info)
}

/// Extract a single still frame into `<out_dir>/preview.jpg`. Skips the
/// first second of the source to get past any initial corrupt frames.
pub async fn snapshot(
    cancel: &CancellationToken,
    source_url: &str,
    out_dir: &Path,
) -> Result<PathBuf, StreamError> {
    let preview_path = out_dir.join(PREVIEW_FILE_NAME);

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-i", source_url, "-rtsp_transport", "tcp", "-vframes", "1", "-ss", "00:00:01"])
        .args(["-f", "image2"])
        .arg(&preview_path);

    let output = run_tool(cancel, cmd)
        .await
        .map_err(StreamError::PreviewUnavailable)?;

    if !output.status.success() {
        return Err(StreamError::PreviewUnavailable(format!(
            "frame extraction failed (exit {:?}): {}",
            output.status.code(),
            stderr_tail(&output.stderr),
        )));
    }

    if tokio::fs::metadata(&preview_path).await.is_err() {
        return Err(StreamError::PreviewUnavailable(format!(
            "preview file was not created at {}",
            preview_path.display()
        )));
    }

    Ok(preview_path)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run a probe tool with output capture, bounded by [`PROBE_TIMEOUT`] and
/// the caller's cancellation token. The error is a human-readable reason;
/// call sites wrap it in the appropriate [`StreamError`] kind.
async fn run_tool(
    cancel: &CancellationToken,
    mut cmd: Command,
) -> Result<std::process::Output, String> {
    cmd.stdin(Stdio::null()).kill_on_drop(true);

    tokio::select! {
        _ = cancel.cancelled() => Err("probe cancelled".to_string()),
        result = tokio::time::timeout(PROBE_TIMEOUT, cmd.output()) => match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(format!("failed to run probe tool: {e}")),
            Err(_) => Err(format!("probe timed out after {}s", PROBE_TIMEOUT.as_secs())),
        },
    }
}

/// Last kilobyte of captured stderr, for error messages.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    match trimmed.char_indices().nth_back(1023) {
        Some((idx, _)) => trimmed[idx..].to_string(),
        None => trimmed.to_string(),
    }
}
