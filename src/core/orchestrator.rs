//! The conversation state machine.
//!
//! One orchestrator drives one session through the record -> transcribe ->
//! dispatch -> speak cycle. All transitions run on the caller's task; the
//! only background work is the playback task and the interruption monitor,
//! both owned here and both torn down before the state they belong to is
//! left. At most one capture session and one playback handle are ever live.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::adapters::{
    AudioCapture, CaptureError, CaptureSession, Playback, PlaybackHandle, PlaybackResult,
    Recording, RespondError, ResponderReply, ResponderService, SpeechRecognizer, TranscribeError,
    Transcriber, Utterance,
};
use crate::domain::{ConversationError, SessionId, Turn};

use super::interrupt::{InterruptMonitor, InterruptPolicy, MonitorState};
use super::status::StatusSink;
use super::transcript::TranscriptStore;

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Idle,
    Listening,
    Transcribing,
    Dispatching,
    Speaking,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Idle => "idle",
            Mode::Listening => "listening",
            Mode::Transcribing => "transcribing",
            Mode::Dispatching => "dispatching",
            Mode::Speaking => "speaking",
        };
        write!(f, "{}", name)
    }
}

/// How a single turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Both sides spoke and were recorded.
    Completed { user: Turn, assistant: Turn },

    /// Nothing usable was heard; no responder call was made.
    Empty,

    /// The user cut off playback; the reply was discarded and the
    /// orchestrator is already listening again.
    Interrupted,

    /// The stop switch fired; the orchestrator is idle.
    Stopped,
}

/// Clonable trigger that ends the current turn from anywhere.
///
/// Firing it interrupts whatever the orchestrator is awaiting, releases
/// the microphone and the player, and turns conversation mode off.
#[derive(Clone)]
pub struct StopSwitch {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSwitch {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Decides when the user has finished speaking during `Listening`.
#[async_trait]
pub trait EndOfSpeech: Send {
    async fn wait(&mut self);
}

/// End-of-speech after a fixed listening window.
pub struct FixedWindow(pub Duration);

#[async_trait]
impl EndOfSpeech for FixedWindow {
    async fn wait(&mut self) {
        tokio::time::sleep(self.0).await;
    }
}

/// Everything the orchestrator delegates to.
pub struct Collaborators {
    pub capture: Arc<dyn AudioCapture>,
    pub transcriber: Arc<dyn Transcriber>,
    pub responder: Arc<dyn ResponderService>,
    pub playback: Arc<dyn Playback>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub transcript: Arc<TranscriptStore>,
    pub status: Arc<dyn StatusSink>,
}

/// Tuning for turn handling.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    /// Interruption thresholds used while speaking
    pub interrupt: InterruptPolicy,

    /// Pause between turns in conversation mode
    pub settle_delay: Duration,

    /// Spoken when the responder returns nothing usable
    pub fallback_reply: String,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            interrupt: InterruptPolicy::default(),
            settle_delay: Duration::from_millis(750),
            fallback_reply: "I didn't get a response for that.".to_string(),
        }
    }
}

enum SpeakEnd {
    Finished(PlaybackResult),
    Interrupted(Utterance),
    Stopped,
}

/// Drives one session through its turns.
pub struct ConversationOrchestrator {
    session: SessionId,
    collab: Collaborators,
    settings: TurnSettings,
    mode: Mode,
    conversation_mode: bool,
    active_capture: Option<Box<dyn CaptureSession>>,
    active_playback: Option<PlaybackHandle>,
    monitor: MonitorState,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl ConversationOrchestrator {
    pub fn new(session: SessionId, collab: Collaborators, settings: TurnSettings) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            session,
            collab,
            settings,
            mode: Mode::Idle,
            conversation_mode: false,
            active_capture: None,
            active_playback: None,
            monitor: MonitorState::NotRunning,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn conversation_mode(&self) -> bool {
        self.conversation_mode
    }

    pub fn set_conversation_mode(&mut self, on: bool) {
        self.conversation_mode = on;
    }

    /// Whether the interruption monitor is running.
    pub fn recognizer_active(&self) -> bool {
        self.monitor.is_running()
    }

    /// Whether a playback handle is live.
    pub fn playback_active(&self) -> bool {
        self.active_playback.is_some()
    }

    /// Trigger that ends the current turn from another task.
    pub fn stop_switch(&self) -> StopSwitch {
        StopSwitch {
            tx: self.stop_tx.clone(),
        }
    }

    /// Enter `Listening` and open the microphone.
    ///
    /// A no-op when already listening; rejected from any mode that is
    /// mid-turn.
    pub async fn start_turn(&mut self) -> Result<(), ConversationError> {
        match self.mode {
            Mode::Listening => Ok(()),
            Mode::Idle => {
                self.set_mode(Mode::Listening);
                self.open_capture().await
            }
            other => Err(ConversationError::InvalidState {
                operation: "start_turn",
                mode: other.to_string(),
            }),
        }
    }

    /// Run one full turn: listen until end of speech, transcribe, dispatch
    /// to the responder, and speak the reply.
    pub async fn run_turn(
        &mut self,
        eos: &mut dyn EndOfSpeech,
    ) -> Result<TurnOutcome, ConversationError> {
        self.start_turn().await?;

        let stopped = tokio::select! {
            _ = eos.wait() => false,
            _ = self.stop_rx.wait_for(|stop| *stop) => true,
        };
        if stopped {
            self.end_turn().await;
            return Ok(TurnOutcome::Stopped);
        }

        self.set_mode(Mode::Transcribing);
        let recording = match self.close_capture().await {
            Ok(recording) => recording,
            Err(e) => return Err(self.fail(ConversationError::Device(e.to_string())).await),
        };

        let transcript = match self.collab.transcriber.transcribe(recording).await {
            Ok(t) => t,
            // A silent recording ends the turn without calling the responder
            Err(TranscribeError::EmptyAudio) => return Ok(self.soft_reset("nothing heard")),
            Err(e) => {
                return Err(self
                    .fail(ConversationError::UpstreamUnreachable(e.to_string()))
                    .await)
            }
        };

        let text = transcript.text.trim().to_string();
        if text.is_empty() {
            return Ok(self.soft_reset("nothing heard"));
        }

        let user_turn = Turn::user(&text);
        self.append_turn(user_turn.clone()).await;

        self.set_mode(Mode::Dispatching);
        let reply = match self.collab.responder.respond(&text, &self.session).await {
            Ok(reply) => reply,
            Err(RespondError::EmptyUpstreamResponse) => ResponderReply {
                text: self.settings.fallback_reply.clone(),
                audio_url: None,
            },
            Err(e) => {
                return Err(self
                    .fail(ConversationError::UpstreamUnreachable(e.to_string()))
                    .await)
            }
        };

        let reply_text = if reply.text.trim().is_empty() {
            self.settings.fallback_reply.clone()
        } else {
            reply.text.trim().to_string()
        };
        let audio_url = reply.audio_url.filter(|url| !url.trim().is_empty());

        let Some(url) = audio_url else {
            // Text-only reply: record it and go idle without speaking
            let assistant = Turn::assistant(&reply_text, None);
            self.append_turn(assistant.clone()).await;
            self.set_mode(Mode::Idle);
            return Ok(TurnOutcome::Completed {
                user: user_turn,
                assistant,
            });
        };

        self.set_mode(Mode::Speaking);
        let handle = match self.collab.playback.play(&url).await {
            Ok(handle) => handle,
            Err(e) => {
                // Playback failure does not lose the reply text
                self.collab
                    .status
                    .notify(&ConversationError::Playback(e.to_string()));
                let assistant = Turn::assistant(&reply_text, Some(url));
                self.append_turn(assistant.clone()).await;
                self.set_mode(Mode::Idle);
                return Ok(TurnOutcome::Completed {
                    user: user_turn,
                    assistant,
                });
            }
        };

        self.active_playback = Some(handle);
        self.monitor = MonitorState::Running(InterruptMonitor::spawn(
            self.collab.recognizer.clone(),
            self.settings.interrupt.clone(),
        ));

        let end = self.wait_speaking().await;
        self.teardown_monitor().await;

        match end {
            SpeakEnd::Finished(result) => {
                if let PlaybackResult::Errored(reason) = result {
                    self.collab
                        .status
                        .notify(&ConversationError::Playback(reason));
                }
                let assistant = Turn::assistant(&reply_text, Some(url));
                self.append_turn(assistant.clone()).await;
                self.set_mode(Mode::Idle);
                Ok(TurnOutcome::Completed {
                    user: user_turn,
                    assistant,
                })
            }
            SpeakEnd::Interrupted(utterance) => {
                // The cut-off reply is discarded, not recorded
                debug!(text = %utterance.text, "playback interrupted");
                self.collab.status.status("interrupted");
                self.set_mode(Mode::Listening);
                self.open_capture().await?;
                Ok(TurnOutcome::Interrupted)
            }
            SpeakEnd::Stopped => {
                self.end_turn().await;
                Ok(TurnOutcome::Stopped)
            }
        }
    }

    /// Keep running turns back to back until the stop switch fires, a turn
    /// fails, or conversation mode is switched off.
    pub async fn run_conversation(
        &mut self,
        eos: &mut dyn EndOfSpeech,
    ) -> Result<(), ConversationError> {
        self.conversation_mode = true;

        let result = loop {
            let outcome = match self.run_turn(eos).await {
                Ok(outcome) => outcome,
                Err(e) => break Err(e),
            };

            match outcome {
                TurnOutcome::Stopped => break Ok(()),
                // Already listening again; skip the settle delay
                TurnOutcome::Interrupted => continue,
                TurnOutcome::Completed { .. } | TurnOutcome::Empty => {}
            }

            if !self.conversation_mode {
                break Ok(());
            }

            let stopped = tokio::select! {
                _ = tokio::time::sleep(self.settings.settle_delay) => false,
                _ = self.stop_rx.wait_for(|stop| *stop) => true,
            };
            if stopped {
                self.end_turn().await;
                break Ok(());
            }
        };

        self.conversation_mode = false;
        result
    }

    /// Abandon whatever is in flight and return to `Idle`.
    pub async fn end_turn(&mut self) {
        self.abort_capture().await;
        self.retire_playback().await;
        self.teardown_monitor().await;
        self.conversation_mode = false;
        self.set_mode(Mode::Idle);
        // Rearm the switch so the orchestrator can be driven again
        let _ = self.stop_tx.send(false);
    }

    async fn wait_speaking(&mut self) -> SpeakEnd {
        let end = match (self.active_playback.as_mut(), self.monitor.running_mut()) {
            (Some(playback), Some(monitor)) => {
                Self::await_speaking(playback, monitor, &mut self.stop_rx).await
            }
            (Some(playback), None) => SpeakEnd::Finished(playback.wait().await),
            _ => SpeakEnd::Finished(PlaybackResult::Completed),
        };

        match &end {
            SpeakEnd::Finished(_) => {
                self.active_playback = None;
            }
            // Silence the player before moving on: no double voices
            SpeakEnd::Interrupted(_) | SpeakEnd::Stopped => {
                self.retire_playback().await;
            }
        }

        end
    }

    async fn await_speaking(
        playback: &mut PlaybackHandle,
        monitor: &mut InterruptMonitor,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> SpeakEnd {
        let mut monitor_open = true;
        loop {
            tokio::select! {
                result = playback.wait() => return SpeakEnd::Finished(result),
                heard = monitor.recv(), if monitor_open => match heard {
                    Some(utterance) => return SpeakEnd::Interrupted(utterance),
                    // Monitor loop exited on its own; playback continues
                    None => monitor_open = false,
                },
                _ = stop_rx.wait_for(|stop| *stop) => return SpeakEnd::Stopped,
            }
        }
    }

    async fn open_capture(&mut self) -> Result<(), ConversationError> {
        match self.collab.capture.begin().await {
            Ok(session) => {
                self.active_capture = Some(session);
                Ok(())
            }
            Err(e) => Err(self.fail(ConversationError::Device(e.to_string())).await),
        }
    }

    async fn close_capture(&mut self) -> Result<Recording, CaptureError> {
        match self.active_capture.take() {
            Some(mut session) => session.end().await,
            None => Err(CaptureError::AlreadyEnded),
        }
    }

    async fn abort_capture(&mut self) {
        if let Some(mut session) = self.active_capture.take() {
            session.abort().await;
        }
    }

    async fn retire_playback(&mut self) {
        if let Some(handle) = self.active_playback.take() {
            let _ = handle.stop().await;
        }
    }

    async fn teardown_monitor(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop().await;
        }
    }

    /// Tear everything down, turn conversation mode off, and surface the
    /// error exactly once.
    async fn fail(&mut self, err: ConversationError) -> ConversationError {
        self.abort_capture().await;
        self.retire_playback().await;
        self.teardown_monitor().await;
        self.conversation_mode = false;
        self.set_mode(Mode::Idle);
        self.collab.status.notify(&err);
        err
    }

    /// End the turn without treating it as a failure. Conversation mode is
    /// preserved.
    fn soft_reset(&mut self, why: &str) -> TurnOutcome {
        self.collab.status.status(why);
        self.set_mode(Mode::Idle);
        TurnOutcome::Empty
    }

    async fn append_turn(&self, turn: Turn) {
        if let Err(e) = self.collab.transcript.append(&self.session, turn).await {
            warn!("failed to record turn: {}", e);
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!(from = %self.mode, to = %mode, "mode change");
            self.mode = mode;
            self.collab.status.state_changed(mode);
        }
    }
}
