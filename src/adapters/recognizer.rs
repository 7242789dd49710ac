//! Lightweight continuous speech recognition for interruption detection.
//!
//! While the assistant is speaking, a recognizer runs in the background and
//! reports candidate utterances. The interruption policy decides which of
//! them actually cut off playback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::capture::{AudioCapture, CaptureError};
use super::transcriber::{TranscribeError, Transcriber};

/// Errors that can occur while recognizing speech
#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("recognizer capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("recognizer transcription failed: {0}")]
    Transcribe(#[from] TranscribeError),
}

/// A candidate utterance heard by the recognizer.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,

    /// Recognizer confidence in `[0, 1]`
    pub confidence: f32,
}

/// Continuous listener used while the assistant is speaking.
///
/// `recognize_once` is awaited inside a cancellable monitor loop, so
/// implementations must release the microphone when the future is dropped.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Listen for one utterance. `Ok(None)` means silence.
    async fn recognize_once(&self) -> Result<Option<Utterance>, RecognizerError>;
}

/// Recognizes speech by transcribing short fixed-length capture windows.
///
/// Reuses the capture and transcriber collaborators rather than a separate
/// streaming engine. The backing transcription endpoint reports no
/// per-utterance confidence, so utterances carry a confidence of 1.0 and
/// filtering falls to the length/filler thresholds.
pub struct WindowedRecognizer {
    capture: Arc<dyn AudioCapture>,
    transcriber: Arc<dyn Transcriber>,
    window: Duration,
}

impl WindowedRecognizer {
    pub fn new(
        capture: Arc<dyn AudioCapture>,
        transcriber: Arc<dyn Transcriber>,
        window: Duration,
    ) -> Self {
        Self {
            capture,
            transcriber,
            window,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for WindowedRecognizer {
    async fn recognize_once(&self) -> Result<Option<Utterance>, RecognizerError> {
        let mut session = self.capture.begin().await?;
        tokio::time::sleep(self.window).await;
        let recording = session.end().await?;

        let transcript = match self.transcriber.transcribe(recording).await {
            Ok(t) => t,
            // A silent window is not an error for the recognizer
            Err(TranscribeError::EmptyAudio) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let text = transcript.text.trim().to_string();
        if text.is_empty() {
            return Ok(None);
        }

        Ok(Some(Utterance {
            text,
            confidence: 1.0,
        }))
    }
}
