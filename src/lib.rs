//! jarvis - Voice conversation orchestrator
//!
//! Drives a hands-free conversation loop: record the user, transcribe
//! the recording, dispatch the text to a responder webhook, and speak
//! the synthesized reply, with the user able to interrupt playback by
//! talking over it.
//!
//! # Architecture
//!
//! The system is built around a single-owner state machine:
//! - One orchestrator owns one session and all device handles
//! - Transitions run on the caller's task; only playback and the
//!   interruption monitor run in the background, and both are torn
//!   down before their state is left
//! - Every turn is appended to a per-session transcript log
//!
//! # Modules
//!
//! - `adapters`: Device and service integrations (microphone, speech
//!   endpoints, responder webhook, audio player)
//! - `core`: Orchestration logic (state machine, interruption policy,
//!   transcript store)
//! - `domain`: Data structures (Turn, SessionId, errors)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # One turn: talk, get a spoken reply, done
//! jarvis talk
//!
//! # Keep talking until Ctrl+C
//! jarvis converse
//!
//! # Read back a session
//! jarvis transcript <session-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::core::{
    Collaborators, ConversationOrchestrator, InterruptPolicy, Mode, StopSwitch, TranscriptStore,
    TurnOutcome, TurnSettings,
};
pub use domain::{ConversationError, Role, SessionId, Turn};
