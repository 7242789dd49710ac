//! Orchestration core: the conversation state machine, interruption
//! policy, transcript store, and status surface.

pub mod interrupt;
pub mod orchestrator;
pub mod status;
pub mod transcript;

pub use interrupt::{InterruptMonitor, InterruptPolicy, MonitorState};
pub use orchestrator::{
    Collaborators, ConversationOrchestrator, EndOfSpeech, FixedWindow, Mode, StopSwitch,
    TurnOutcome, TurnSettings,
};
pub use status::{StatusSink, TracingStatus};
pub use transcript::{TranscriptError, TranscriptStore};
