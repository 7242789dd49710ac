//! Audio playback contract and ffplay-backed implementation.
//!
//! At most one playback handle is ever live; the orchestrator retires the
//! previous handle before starting a new one. Stopping must release all
//! resources (kill the player, remove the local buffer) even mid-stream.

use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Errors that can occur when starting playback
#[derive(Debug, Error)]
pub enum PlayError {
    #[error("audio fetch failed: {0}")]
    Fetch(String),

    #[error("audio player unavailable: {0}")]
    PlayerUnavailable(String),

    #[error("playback IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a playback ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackResult {
    /// Audio played to the end
    Completed,

    /// Stopped early via the handle
    Stopped,

    /// Ended abnormally
    Errored(String),
}

/// Handle to one in-flight playback.
///
/// Waiting is cancellation-safe: if a `wait` future is dropped the handle
/// still owns the playback task and can be stopped later.
pub struct PlaybackHandle {
    stop_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<PlaybackResult>>,
}

impl PlaybackHandle {
    pub fn new(stop_tx: mpsc::Sender<()>, task: JoinHandle<PlaybackResult>) -> Self {
        Self {
            stop_tx,
            task: Some(task),
        }
    }

    /// Wait for playback to finish.
    pub async fn wait(&mut self) -> PlaybackResult {
        match self.task.as_mut() {
            Some(task) => {
                let result = match task.await {
                    Ok(result) => result,
                    Err(e) => PlaybackResult::Errored(format!("playback task failed: {}", e)),
                };
                self.task = None;
                result
            }
            None => PlaybackResult::Completed,
        }
    }

    /// Stop playback and wait for the player to release its resources.
    pub async fn stop(mut self) -> PlaybackResult {
        let _ = self.stop_tx.try_send(());
        self.wait().await
    }
}

/// Plays a synthesized-audio URL and reports completion or failure.
#[async_trait]
pub trait Playback: Send + Sync {
    async fn play(&self, audio_url: &str) -> Result<PlaybackHandle, PlayError>;
}

/// Fetches the audio URL over HTTP and plays it through an ffplay
/// subprocess.
///
/// Relative URLs (e.g. `/audio/1.mp3`) are resolved against the configured
/// base. The fetched bytes live in a temp dir owned by the playback task,
/// so they are removed on every exit path.
pub struct HttpPlayback {
    client: reqwest::Client,
    base_url: String,
    player_bin: String,
}

impl HttpPlayback {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            player_bin: "ffplay".to_string(),
        }
    }

    /// Override the player binary path.
    pub fn with_binary(mut self, bin: impl Into<String>) -> Self {
        self.player_bin = bin.into();
        self
    }

    fn resolve(&self, audio_url: &str) -> String {
        if audio_url.starts_with("http://") || audio_url.starts_with("https://") {
            audio_url.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                audio_url.trim_start_matches('/')
            )
        }
    }
}

#[async_trait]
impl Playback for HttpPlayback {
    async fn play(&self, audio_url: &str) -> Result<PlaybackHandle, PlayError> {
        let url = self.resolve(audio_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PlayError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PlayError::Fetch(format!(
                "audio endpoint returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlayError::Fetch(e.to_string()))?;

        let dir = TempDir::new()?;
        let path = dir.path().join("reply.mp3");
        tokio::fs::write(&path, &bytes).await?;

        let mut child = Command::new(&self.player_bin)
            .args(["-nodisp", "-autoexit", "-loglevel", "quiet"])
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PlayError::PlayerUnavailable(format!(
                    "{} not found (install ffmpeg)",
                    self.player_bin
                )),
                _ => PlayError::Io(e),
            })?;

        debug!(url = %url, size = bytes.len(), "playback started");

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            // Temp dir removed when the task exits, on every path
            let _dir = dir;
            tokio::select! {
                status = child.wait() => match status {
                    Ok(s) if s.success() => PlaybackResult::Completed,
                    Ok(s) => PlaybackResult::Errored(format!("player exited with {}", s)),
                    Err(e) => PlaybackResult::Errored(e.to_string()),
                },
                _ = stop_rx.recv() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    PlaybackResult::Stopped
                }
            }
        });

        Ok(PlaybackHandle::new(stop_tx, task))
    }
}
