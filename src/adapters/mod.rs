//! Collaborator contracts for the conversation orchestrator.
//!
//! Each submodule defines one contract (a trait plus its data and error
//! types) and the production implementation behind it. The orchestrator
//! only ever talks to the traits, so tests can substitute fakes.

pub mod capture;
pub mod playback;
pub mod recognizer;
pub mod responder;
pub mod transcriber;

pub use capture::{AudioCapture, CaptureError, CaptureSession, FfmpegCapture, Recording};
pub use playback::{HttpPlayback, PlayError, Playback, PlaybackHandle, PlaybackResult};
pub use recognizer::{RecognizerError, SpeechRecognizer, Utterance, WindowedRecognizer};
pub use responder::{ResponderReply, ResponderService, RespondError, WebhookResponder};
pub use transcriber::{HttpTranscriber, Transcriber, TranscribeError, Transcript};
