//! Speech-to-text contract and HTTP implementation.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::capture::Recording;

/// Errors that can occur during transcription
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("transcription service unreachable: {0}")]
    Unreachable(String),

    #[error("unsupported audio format")]
    UnsupportedFormat,

    #[error("recording contained no audio")]
    EmptyAudio,

    #[error("malformed transcription response: {0}")]
    InvalidResponse(String),
}

/// Result of a successful transcription.
///
/// `text` may still be empty or whitespace-only; the orchestrator treats
/// that as a soft failure.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub duration_ms: u64,
}

/// Turns a finite recording into recognized text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, recording: Recording) -> Result<Transcript, TranscribeError>;
}

/// Wire format of the transcription endpoint response
#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
    #[serde(rename = "durationMs", default)]
    duration_ms: u64,
}

/// POSTs raw audio bytes to a transcription endpoint.
///
/// Request body is the recording bytes with its content type; the response
/// is `{ "text": "...", "durationMs": 1234 }`. Non-2xx statuses map onto
/// [`TranscribeError`] kinds.
pub struct HttpTranscriber {
    client: reqwest::Client,
    url: String,
}

impl HttpTranscriber {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, recording: Recording) -> Result<Transcript, TranscribeError> {
        if recording.bytes.is_empty() {
            return Err(TranscribeError::EmptyAudio);
        }

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, recording.content_type)
            .body(recording.bytes)
            .send()
            .await
            .map_err(|e| TranscribeError::Unreachable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                return Err(TranscribeError::UnsupportedFormat)
            }
            reqwest::StatusCode::UNPROCESSABLE_ENTITY => return Err(TranscribeError::EmptyAudio),
            status => {
                return Err(TranscribeError::Unreachable(format!(
                    "transcription endpoint returned {}",
                    status
                )))
            }
        }

        let parsed: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::InvalidResponse(e.to_string()))?;

        debug!(
            chars = parsed.text.len(),
            duration_ms = parsed.duration_ms,
            "transcription received"
        );

        Ok(Transcript {
            text: parsed.text,
            duration_ms: parsed.duration_ms,
        })
    }
}
