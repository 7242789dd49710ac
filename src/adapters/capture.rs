//! Microphone capture contract and ffmpeg-backed implementation.
//!
//! A capture session exclusively owns the hardware microphone while it is
//! live and must release it on every exit path, including errors.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Errors that can occur while capturing audio
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("no capture device available: {0}")]
    DeviceUnavailable(String),

    #[error("capture already ended")]
    AlreadyEnded,

    #[error("capture IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A finite audio recording handed to the transcriber.
///
/// Ownership transfers with the value; the capture session discards its
/// buffer once `end` returns.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Raw encoded audio bytes
    pub bytes: Vec<u8>,

    /// MIME content type of `bytes` (e.g. `audio/wav`)
    pub content_type: String,
}

/// Factory for capture sessions.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Request microphone access and start streaming immediately.
    async fn begin(&self) -> Result<Box<dyn CaptureSession>, CaptureError>;
}

/// A live microphone session.
///
/// Dropping a session must release the device even if `end` was never
/// called.
#[async_trait]
pub trait CaptureSession: Send {
    /// Stop capture, release the device, and return the accumulated audio.
    ///
    /// Calling `end` a second time returns [`CaptureError::AlreadyEnded`].
    async fn end(&mut self) -> Result<Recording, CaptureError>;

    /// Release the device without producing a recording.
    async fn abort(&mut self);
}

/// Records from the platform microphone via an ffmpeg subprocess.
///
/// The input format and device are platform-specific (`alsa`/`default` on
/// Linux, `avfoundation`/`:0` on macOS) and configurable.
pub struct FfmpegCapture {
    input_format: String,
    device: String,
    ffmpeg_bin: String,
}

impl FfmpegCapture {
    pub fn new(input_format: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            input_format: input_format.into(),
            device: device.into(),
            ffmpeg_bin: "ffmpeg".to_string(),
        }
    }

    /// Override the ffmpeg binary path.
    pub fn with_binary(mut self, bin: impl Into<String>) -> Self {
        self.ffmpeg_bin = bin.into();
        self
    }
}

#[async_trait]
impl AudioCapture for FfmpegCapture {
    async fn begin(&self) -> Result<Box<dyn CaptureSession>, CaptureError> {
        let dir = TempDir::new()?;
        let path = dir.path().join("capture.wav");

        let child = Command::new(&self.ffmpeg_bin)
            .args(["-f", &self.input_format, "-i", &self.device])
            .args(["-ac", "1", "-ar", "16000", "-y"])
            .arg(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    CaptureError::PermissionDenied(e.to_string())
                }
                std::io::ErrorKind::NotFound => CaptureError::DeviceUnavailable(format!(
                    "{} not found (install ffmpeg)",
                    self.ffmpeg_bin
                )),
                _ => CaptureError::Io(e),
            })?;

        debug!(device = %self.device, "microphone capture started");

        Ok(Box::new(FfmpegSession {
            child: Some(child),
            _dir: dir,
            path,
        }))
    }
}

struct FfmpegSession {
    /// `None` once the session has ended or been aborted
    child: Option<Child>,
    /// Temp dir holding the capture file; removed when the session drops
    _dir: TempDir,
    path: PathBuf,
}

#[async_trait]
impl CaptureSession for FfmpegSession {
    async fn end(&mut self) -> Result<Recording, CaptureError> {
        let mut child = self.child.take().ok_or(CaptureError::AlreadyEnded)?;

        // Ask ffmpeg to finalize the container; fall back to killing it if
        // it does not exit promptly.
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(b"q").await;
        }
        if tokio::time::timeout(Duration::from_secs(2), child.wait())
            .await
            .is_err()
        {
            warn!("capture process did not exit cleanly, killing");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }

        let bytes = tokio::fs::read(&self.path).await?;
        if bytes.is_empty() {
            return Err(CaptureError::DeviceUnavailable(
                "capture produced no audio".to_string(),
            ));
        }

        debug!(size = bytes.len(), "microphone capture ended");

        Ok(Recording {
            bytes,
            content_type: "audio/wav".to_string(),
        })
    }

    async fn abort(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
            debug!("microphone capture aborted");
        }
    }
}
