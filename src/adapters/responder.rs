//! Responder webhook contract and HTTP implementation.
//!
//! The responder is the external workflow engine that turns user text into
//! assistant text plus an optional synthesized-speech URL.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::SessionId;

/// Errors that can occur while dispatching to the responder
#[derive(Debug, Error)]
pub enum RespondError {
    #[error("responder unreachable: {0}")]
    Unreachable(String),

    #[error("responder timed out")]
    Timeout,

    #[error("responder returned an empty reply")]
    EmptyUpstreamResponse,

    #[error("malformed responder response: {0}")]
    InvalidResponse(String),
}

/// A reply from the responder service.
#[derive(Debug, Clone)]
pub struct ResponderReply {
    /// Assistant text
    pub text: String,

    /// URL of synthesized speech audio for the reply, if any
    pub audio_url: Option<String>,
}

/// Dispatches user text to the workflow engine and returns its reply.
#[async_trait]
pub trait ResponderService: Send + Sync {
    async fn respond(
        &self,
        text: &str,
        session: &SessionId,
    ) -> Result<ResponderReply, RespondError>;
}

/// Request payload for the responder webhook
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    message: &'a str,
    #[serde(rename = "sessionId")]
    session_id: &'a str,
}

/// Wire format of the responder webhook response
#[derive(Debug, Deserialize)]
struct WebhookResponse {
    #[serde(default)]
    text: String,
    #[serde(rename = "audioUrl", default)]
    audio_url: Option<String>,
}

/// POSTs `{ message, sessionId }` to a workflow webhook.
///
/// Auth is an optional bearer token. Request timeouts surface as
/// [`RespondError::Timeout`]; a literally empty reply surfaces as
/// [`RespondError::EmptyUpstreamResponse`] so the caller can substitute a
/// fallback message instead of a silent turn.
pub struct WebhookResponder {
    client: reqwest::Client,
    url: String,
    auth_token: Option<String>,
}

impl WebhookResponder {
    pub fn new(url: impl Into<String>, auth_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
            auth_token,
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }
}

#[async_trait]
impl ResponderService for WebhookResponder {
    async fn respond(
        &self,
        text: &str,
        session: &SessionId,
    ) -> Result<ResponderReply, RespondError> {
        let payload = WebhookPayload {
            message: text,
            session_id: session.as_str(),
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RespondError::Timeout
            } else {
                RespondError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RespondError::Unreachable(format!(
                "responder returned {}",
                status
            )));
        }

        let parsed: WebhookResponse = response
            .json()
            .await
            .map_err(|e| RespondError::InvalidResponse(e.to_string()))?;

        if parsed.text.trim().is_empty() && parsed.audio_url.is_none() {
            return Err(RespondError::EmptyUpstreamResponse);
        }

        debug!(chars = parsed.text.len(), has_audio = parsed.audio_url.is_some(), "responder reply received");

        Ok(ResponderReply {
            text: parsed.text,
            audio_url: parsed.audio_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_field_names() {
        let payload = WebhookPayload {
            message: "turn on the lights",
            session_id: "abc-123",
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["message"], "turn on the lights");
        assert_eq!(json["sessionId"], "abc-123");
    }

    #[test]
    fn test_response_parsing() {
        let parsed: WebhookResponse =
            serde_json::from_str(r#"{"text": "Done, sir.", "audioUrl": "/audio/1.mp3"}"#).unwrap();
        assert_eq!(parsed.text, "Done, sir.");
        assert_eq!(parsed.audio_url, Some("/audio/1.mp3".to_string()));

        let no_audio: WebhookResponse = serde_json::from_str(r#"{"text": "Done."}"#).unwrap();
        assert_eq!(no_audio.audio_url, None);
    }
}
