//! Turns and session identifiers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier correlating the turns of one conversation.
///
/// Generated once per client activation and immutable for its lifetime.
/// Used as the transcript key and forwarded to the responder service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session identifier (UUIDv4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a caller-supplied identifier. No validation beyond presence.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// One exchange unit in a conversation.
///
/// Immutable once created; appended to the transcript in arrival order and
/// never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who said it
    pub role: Role,

    /// The spoken/recognized text
    pub text: String,

    /// URL of synthesized speech audio, if any (assistant turns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// When the turn was created (ISO 8601)
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a user turn from recognized text.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            audio_url: None,
            created_at: Utc::now(),
        }
    }

    /// Create an assistant turn with optional speech audio.
    pub fn assistant(text: impl Into<String>, audio_url: Option<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            audio_url,
            created_at: Utc::now(),
        }
    }
}
