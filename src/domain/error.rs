//! Error taxonomy for the orchestrator boundary.
//!
//! Every collaborator failure is caught at the orchestrator and converted
//! into one of these kinds; none propagate as raw adapter errors.

use thiserror::Error;

/// Failure kinds surfaced by the conversation orchestrator.
#[derive(Debug, Clone, Error)]
pub enum ConversationError {
    /// Microphone unavailable or permission denied. Fatal to the current
    /// turn; the user must retry manually.
    #[error("microphone error: {0}")]
    Device(String),

    /// Network or service failure in the transcriber or responder.
    /// Recoverable, but ends conversation mode and returns to idle.
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// Empty transcription or empty upstream reply. Recoverable; treated
    /// as a no-op turn.
    #[error("empty result")]
    EmptyResult,

    /// Audio failed to start or ended abnormally. Recoverable; equivalent
    /// to normal playback completion for state-machine purposes.
    #[error("playback failed: {0}")]
    Playback(String),

    /// An operation was invoked in a state that does not permit it.
    #[error("{operation} not allowed while {mode}")]
    InvalidState {
        operation: &'static str,
        mode: String,
    },
}

impl ConversationError {
    /// Whether the conversation can continue after this error without
    /// manual intervention.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConversationError::EmptyResult | ConversationError::Playback(_)
        )
    }
}
