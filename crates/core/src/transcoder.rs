//! Supervisor for the external ffmpeg transcoder child.
//!
//! Spawns ffmpeg with the RTSP input, encoding, and HLS packaging argument
//! groups, then blocks until the child exits or the session is cancelled.
//! Cancellation first requests graceful termination by writing `q` to the
//! child's stdin (the pipe is attached before the child starts, so the
//! write cannot race the spawn); if the child has not exited within
//! [`SOFT_QUIT_TIMEOUT`] it is killed. A graceful exit lets ffmpeg finalize
//! the playlist, which is what makes the recorded artifacts valid.
//!
//! The child's stderr is captured into an in-memory buffer and tee'd to a
//! per-session `transcoder.log` next to the playlist.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStderr, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::FfmpegParams;
use crate::error::StreamError;
use crate::playlist::SEGMENT_INFIX;

/// How long a soft-quit request may take before the child is killed.
pub const SOFT_QUIT_TIMEOUT: Duration = Duration::from_millis(500);

/// File name of the per-session diagnostic output log.
pub const DIAGNOSTIC_LOG_NAME: &str = "transcoder.log";

/// Supervisor lifecycle, driven by cancellation, child exit, and the
/// soft-quit timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SupervisorState {
    Spawning,
    Running,
    SoftQuitting,
    HardKilling,
    Reaped,
}

// ---------------------------------------------------------------------------
// ffmpeg argument groups
// ---------------------------------------------------------------------------

/// RTSP input options.
#[derive(Debug, Clone)]
pub struct InputParams {
    pub source_url: String,
    pub buffer_size: String,
    pub timeout_us: String,
    pub rtsp_flags: String,
    pub transport: String,
}

impl InputParams {
    pub fn new(source_url: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            buffer_size: "8192k".to_string(),
            timeout_us: "5000000".to_string(),
            rtsp_flags: "prefer_tcp".to_string(),
            transport: "tcp".to_string(),
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        vec![
            "-fflags".into(),
            "+genpts+discardcorrupt".into(),
            "-use_wallclock_as_timestamps".into(),
            "1".into(),
            "-rtsp_transport".into(),
            self.transport.clone(),
            "-buffer_size".into(),
            self.buffer_size.clone(),
            "-rtsp_flags".into(),
            self.rtsp_flags.clone(),
            "-timeout".into(),
            self.timeout_us.clone(),
            "-i".into(),
            self.source_url.clone(),
        ]
    }
}

/// H.264 encoding options, tuned for low-latency live ingest.
#[derive(Debug, Clone)]
pub struct VideoEncodingParams {
    pub frame_rate: String,
    pub gop_size: u32,
    pub key_int_min: u32,
    pub bitrate: String,
    pub max_rate: String,
    pub min_rate: String,
    pub buf_size: String,
}

impl VideoEncodingParams {
    pub fn from_config(cfg: &FfmpegParams) -> Self {
        Self {
            frame_rate: cfg.frame_rate.clone(),
            gop_size: cfg.gop_size,
            key_int_min: cfg.key_int_min,
            bitrate: cfg.video_bitrate.clone(),
            max_rate: cfg.video_max_rate.clone(),
            min_rate: cfg.video_min_rate.clone(),
            buf_size: cfg.video_buf_size.clone(),
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        vec![
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "ultrafast".into(),
            "-tune".into(),
            "zerolatency".into(),
            "-profile:v".into(),
            "baseline".into(),
            "-level".into(),
            "3.0".into(),
            "-r".into(),
            self.frame_rate.clone(),
            "-g".into(),
            self.gop_size.to_string(),
            "-keyint_min".into(),
            self.key_int_min.to_string(),
            "-b:v".into(),
            self.bitrate.clone(),
            "-maxrate".into(),
            self.max_rate.clone(),
            "-minrate".into(),
            self.min_rate.clone(),
            "-bufsize".into(),
            self.buf_size.clone(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-vsync".into(),
            "1".into(),
            "-avoid_negative_ts".into(),
            "1".into(),
            "-x264-params".into(),
            "no-scenecut=1:bframes=0".into(),
            "-sc_threshold".into(),
            "0".into(),
        ]
    }
}

/// AAC audio encoding options, applied only when the probe reports audio.
#[derive(Debug, Clone)]
pub struct AudioEncodingParams {
    pub bitrate: String,
    pub sample_rate: String,
}

impl AudioEncodingParams {
    pub fn from_config(cfg: &FfmpegParams) -> Self {
        Self {
            bitrate: cfg.audio_bitrate.clone(),
            sample_rate: cfg.audio_sample_rate.clone(),
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        vec![
            "-map".into(),
            "0:a:0".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            self.bitrate.clone(),
            "-ar".into(),
            self.sample_rate.clone(),
        ]
    }
}

/// HLS packaging options. The MPEG-TS flags and PAT/SDT periods are fixed;
/// segment time and list size come from configuration.
#[derive(Debug, Clone)]
pub struct HlsParams {
    pub segment_time: String,
    pub list_size: String,
    pub segment_pattern: String,
    pub playlist_path: String,
}

impl HlsParams {
    pub fn new(cfg: &FfmpegParams, segment_pattern: String, playlist_path: String) -> Self {
        Self {
            segment_time: cfg.hls_segment_time.clone(),
            list_size: cfg.hls_list_size.clone(),
            segment_pattern,
            playlist_path,
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        vec![
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            self.segment_time.clone(),
            "-hls_list_size".into(),
            self.list_size.clone(),
            "-hls_flags".into(),
            "append_list+discont_start+split_by_time".into(),
            "-hls_segment_type".into(),
            "mpegts".into(),
            "-hls_segment_filename".into(),
            self.segment_pattern.clone(),
            "-hls_init_time".into(),
            "0".into(),
            "-mpegts_flags".into(),
            "+resend_headers".into(),
            "-pat_period".into(),
            "0.1".into(),
            "-sdt_period".into(),
            "0.1".into(),
            self.playlist_path.clone(),
        ]
    }
}

/// Assemble the full ffmpeg command line for one session.
pub fn build_args(
    cfg: &FfmpegParams,
    source_url: &str,
    session_id: &str,
    playlist_path: &Path,
    has_audio: bool,
) -> Result<Vec<String>, StreamError> {
    let out_dir = playlist_path.parent().ok_or_else(|| {
        StreamError::InvalidInput(format!(
            "playlist path has no parent directory: {}",
            playlist_path.display()
        ))
    })?;

    let segment_pattern = out_dir
        .join(format!("{session_id}{SEGMENT_INFIX}%03d.ts"))
        .display()
        .to_string();

    let mut args = InputParams::new(source_url).to_args();
    args.extend(VideoEncodingParams::from_config(cfg).to_args());
    args.push("-map".into());
    args.push("0:v:0".into());
    if has_audio {
        args.extend(AudioEncodingParams::from_config(cfg).to_args());
    }
    args.extend(HlsParams::new(cfg, segment_pattern, playlist_path.display().to_string()).to_args());
    Ok(args)
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Run the transcoder child for one session.
///
/// Returns the wall-clock duration in seconds from entry to reap, soft-quit
/// inclusive. Cancellation is a normal outcome and returns `Ok`; a natural
/// exit with non-zero status returns [`StreamError::TranscoderFailed`]
/// carrying the captured diagnostic output.
pub async fn run(
    cancel: &CancellationToken,
    cfg: &FfmpegParams,
    source_url: &str,
    session_id: &str,
    playlist_path: &Path,
    has_audio: bool,
) -> Result<u64, StreamError> {
    let started = Instant::now();
    let out_dir = playlist_path
        .parent()
        .ok_or_else(|| {
            StreamError::InvalidInput(format!(
                "playlist path has no parent directory: {}",
                playlist_path.display()
            ))
        })?
        .to_path_buf();
    let args = build_args(cfg, source_url, session_id, playlist_path, has_audio)?;

    let mut state = SupervisorState::Spawning;
    tracing::info!(
        session_id,
        command = %format!("ffmpeg {}", args.join(" ")),
        "Launching transcoder",
    );

    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    // The stdin pipe is taken here, before anything awaits the child, so
    // the soft-quit write can never race the spawn.
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| StreamError::Internal("transcoder stdin was not piped".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| StreamError::Internal("transcoder stderr was not piped".to_string()))?;

    let diagnostic = Arc::new(Mutex::new(Vec::new()));
    let tee = tokio::spawn(tee_diagnostics(
        stderr,
        out_dir.join(DIAGNOSTIC_LOG_NAME),
        Arc::clone(&diagnostic),
    ));

    transition(&mut state, SupervisorState::Running, session_id);

    let natural_status = tokio::select! {
        status = child.wait() => {
            transition(&mut state, SupervisorState::Reaped, session_id);
            Some(status?)
        }
        _ = cancel.cancelled() => {
            transition(&mut state, SupervisorState::SoftQuitting, session_id);
            if let Err(e) = stdin.write_all(b"q\n").await {
                tracing::warn!(session_id, error = %e, "Failed to send soft-quit to transcoder");
            }
            match tokio::time::timeout(SOFT_QUIT_TIMEOUT, child.wait()).await {
                Ok(status) => {
                    transition(&mut state, SupervisorState::Reaped, session_id);
                    match status? {
                        s if s.success() => {
                            tracing::info!(session_id, "Transcoder exited gracefully after soft-quit")
                        }
                        s => tracing::warn!(
                            session_id,
                            exit_code = ?s.code(),
                            "Transcoder exited with error after soft-quit",
                        ),
                    }
                }
                Err(_) => {
                    transition(&mut state, SupervisorState::HardKilling, session_id);
                    tracing::warn!(
                        session_id,
                        timeout_ms = SOFT_QUIT_TIMEOUT.as_millis() as u64,
                        "Transcoder did not exit after soft-quit, killing process",
                    );
                    if let Err(e) = child.kill().await {
                        tracing::error!(session_id, error = %e, "Failed to kill transcoder");
                    }
                    transition(&mut state, SupervisorState::Reaped, session_id);
                }
            }
            None
        }
    };

    // Let the tee drain whatever stderr the child flushed before exiting.
    let _ = tee.await;
    let duration_secs = started.elapsed().as_secs();

    if let Some(status) = natural_status {
        if !status.success() {
            let diag = diagnostic.lock().await;
            return Err(StreamError::TranscoderFailed {
                exit_code: status.code(),
                diagnostic: tail_of(&diag),
            });
        }
    }

    Ok(duration_secs)
}

fn transition(state: &mut SupervisorState, next: SupervisorState, session_id: &str) {
    tracing::debug!(session_id, from = ?state, to = ?next, "Supervisor state change");
    *state = next;
}

/// Copy the child's stderr into the in-memory buffer and the on-disk
/// diagnostic log.
async fn tee_diagnostics(mut stderr: ChildStderr, log_path: PathBuf, buffer: Arc<Mutex<Vec<u8>>>) {
    let mut file = match tokio::fs::File::create(&log_path).await {
        Ok(f) => Some(f),
        Err(e) => {
            tracing::warn!(path = %log_path.display(), error = %e, "Failed to create transcoder log file");
            None
        }
    };

    let mut chunk = [0u8; 8192];
    loop {
        match stderr.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buffer.lock().await.extend_from_slice(&chunk[..n]);
                if let Some(f) = file.as_mut() {
                    if let Err(e) = f.write_all(&chunk[..n]).await {
                        tracing::warn!(error = %e, "Failed to write transcoder log");
                        file = None;
                    }
                }
            }
        }
    }

    if let Some(f) = file.as_mut() {
        let _ = f.flush().await;
    }
}

/// Last two kilobytes of the diagnostic buffer, for error payloads.
fn tail_of(diagnostic: &[u8]) -> String {
    const TAIL: usize = 2048;
    let start = diagnostic.len().saturating_sub(TAIL);
    String::from_utf8_lossy(&diagnostic[start..]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_for(has_audio: bool) -> Vec<String> {
        build_args(
            &FfmpegParams::default(),
            "rtsp://cam.local/live",
            "abc123_camA_20260802120000",
            Path::new("/tmp/hls/abc123_camA_20260802120000/index.m3u8"),
            has_audio,
        )
        .unwrap()
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn input_group_precedes_source_url() {
        let args = args_for(false);
        assert!(has_pair(&args, "-rtsp_transport", "tcp"));
        assert!(has_pair(&args, "-rtsp_flags", "prefer_tcp"));
        assert!(has_pair(&args, "-i", "rtsp://cam.local/live"));
    }

    #[test]
    fn video_group_uses_configured_rates() {
        let args = args_for(false);
        assert!(has_pair(&args, "-c:v", "libx264"));
        assert!(has_pair(&args, "-b:v", "2000k"));
        assert!(has_pair(&args, "-maxrate", "2500k"));
        assert!(has_pair(&args, "-g", "30"));
        assert!(has_pair(&args, "-x264-params", "no-scenecut=1:bframes=0"));
    }

    #[test]
    fn audio_group_only_when_source_has_audio() {
        let without = args_for(false);
        assert!(!without.contains(&"-c:a".to_string()));
        assert!(has_pair(&without, "-map", "0:v:0"));

        let with = args_for(true);
        assert!(has_pair(&with, "-c:a", "aac"));
        assert!(has_pair(&with, "-b:a", "128k"));
        assert!(has_pair(&with, "-map", "0:a:0"));
    }

    #[test]
    fn hls_group_targets_session_artifacts() {
        let args = args_for(false);
        assert!(has_pair(&args, "-f", "hls"));
        assert!(has_pair(&args, "-hls_time", "2"));
        assert!(has_pair(&args, "-hls_list_size", "0"));
        assert!(has_pair(
            &args,
            "-hls_segment_filename",
            "/tmp/hls/abc123_camA_20260802120000/abc123_camA_20260802120000_segment_%03d.ts",
        ));
        // The playlist path is the final positional argument.
        assert_eq!(
            args.last().unwrap(),
            "/tmp/hls/abc123_camA_20260802120000/index.m3u8"
        );
    }

    #[test]
    fn playlist_without_parent_is_rejected() {
        let err = build_args(
            &FfmpegParams::default(),
            "rtsp://cam.local/live",
            "id",
            Path::new("/"),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, StreamError::InvalidInput(_)));
    }
}
