//! Status surface for whoever is driving the orchestrator.
//!
//! The state machine reports mode changes, progress lines, and error
//! notifications through this sink instead of printing directly, so the
//! CLI and tests can observe them.

use tracing::{info, warn};

use crate::domain::ConversationError;

use super::orchestrator::Mode;

/// Receives state changes and user-facing notifications.
pub trait StatusSink: Send + Sync {
    /// The state machine entered a new mode.
    fn state_changed(&self, mode: Mode);

    /// A progress line, e.g. "listening..." or "nothing heard".
    fn status(&self, text: &str);

    /// A turn failed. Called exactly once per failed turn.
    fn notify(&self, error: &ConversationError);
}

/// Default sink that routes everything through tracing.
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn state_changed(&self, mode: Mode) {
        info!(mode = %mode, "state changed");
    }

    fn status(&self, text: &str) {
        info!("{}", text);
    }

    fn notify(&self, error: &ConversationError) {
        warn!("turn failed: {}", error);
    }
}
