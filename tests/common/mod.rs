//! Shared fakes for orchestrator integration tests.
//!
//! Every fake counts the calls the invariants care about: live capture
//! sessions, concurrent playbacks, recognizer polls, responder calls.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use jarvis::adapters::{
    AudioCapture, CaptureError, CaptureSession, PlayError, Playback, PlaybackHandle,
    PlaybackResult, Recording, RecognizerError, RespondError, ResponderReply, ResponderService,
    SpeechRecognizer, TranscribeError, Transcriber, Transcript, Utterance,
};
use jarvis::core::{Collaborators, StatusSink, TranscriptStore};
use jarvis::{ConversationError, ConversationOrchestrator, Mode, SessionId, TurnSettings};

pub fn wav(bytes: &[u8]) -> Recording {
    Recording {
        bytes: bytes.to_vec(),
        content_type: "audio/wav".to_string(),
    }
}

pub fn utterance(text: &str, confidence: f32) -> Utterance {
    Utterance {
        text: text.to_string(),
        confidence,
    }
}

/// Microphone fake. Tracks how many sessions are live so tests can assert
/// the device is released.
pub struct FakeCapture {
    pub active: Arc<AtomicUsize>,
    pub begun: AtomicUsize,
    pub fail_begin: AtomicBool,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            begun: AtomicUsize::new(0),
            fail_begin: AtomicBool::new(false),
        }
    }

    pub fn deny(&self) {
        self.fail_begin.store(true, Ordering::SeqCst);
    }

    pub fn live_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioCapture for FakeCapture {
    async fn begin(&self) -> Result<Box<dyn CaptureSession>, CaptureError> {
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied(
                "test microphone denied".to_string(),
            ));
        }
        self.begun.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            active: self.active.clone(),
            open: true,
        }))
    }
}

struct FakeSession {
    active: Arc<AtomicUsize>,
    open: bool,
}

impl FakeSession {
    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl CaptureSession for FakeSession {
    async fn end(&mut self) -> Result<Recording, CaptureError> {
        if !self.open {
            return Err(CaptureError::AlreadyEnded);
        }
        self.release();
        Ok(wav(b"captured-audio"))
    }

    async fn abort(&mut self) {
        self.release();
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Transcriber fake driven by a script of results. An exhausted script
/// yields a fixed phrase.
pub struct FakeTranscriber {
    script: Mutex<VecDeque<Result<Transcript, TranscribeError>>>,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push_text(&self, text: &str) {
        self.push(Ok(Transcript {
            text: text.to_string(),
            duration_ms: 900,
        }));
    }

    pub fn push(&self, result: Result<Transcript, TranscribeError>) {
        self.script
            .lock()
            .unwrap()
            .push_back(result);
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _recording: Recording) -> Result<Transcript, TranscribeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Transcript {
                text: "hello there".to_string(),
                duration_ms: 900,
            }),
        }
    }
}

/// Responder fake with a scripted reply queue and a call count.
pub struct FakeResponder {
    script: Mutex<VecDeque<Result<ResponderReply, RespondError>>>,
    pub calls: AtomicUsize,
    pub last_message: Mutex<Option<String>>,
}

impl FakeResponder {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            last_message: Mutex::new(None),
        }
    }

    pub fn push_reply(&self, text: &str, audio_url: Option<&str>) {
        self.push(Ok(ResponderReply {
            text: text.to_string(),
            audio_url: audio_url.map(String::from),
        }));
    }

    pub fn push(&self, result: Result<ResponderReply, RespondError>) {
        self.script
            .lock()
            .unwrap()
            .push_back(result);
    }
}

#[async_trait]
impl ResponderService for FakeResponder {
    async fn respond(
        &self,
        text: &str,
        _session: &SessionId,
    ) -> Result<ResponderReply, RespondError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_message.lock().unwrap() = Some(text.to_string());
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(ResponderReply {
                text: "Done, sir.".to_string(),
                audio_url: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PlayMode {
    /// Playback completes after the given duration
    CompleteAfter(Duration),

    /// Playback never completes on its own; it must be stopped
    Never,
}

/// Playback fake producing real handles, with concurrency accounting.
pub struct FakePlayback {
    mode: Mutex<PlayMode>,
    pub fail_start: AtomicBool,
    pub started: AtomicUsize,
    pub stopped: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl FakePlayback {
    pub fn new(mode: PlayMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            fail_start: AtomicBool::new(false),
            started: AtomicUsize::new(0),
            stopped: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_mode(&self, mode: PlayMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn live_playbacks(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent playbacks ever observed.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Playback for FakePlayback {
    async fn play(&self, _audio_url: &str) -> Result<PlaybackHandle, PlayError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(PlayError::PlayerUnavailable(
                "test player unavailable".to_string(),
            ));
        }

        let mode = *self.mode.lock().unwrap();
        self.started.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let active = self.active.clone();
        let stopped = self.stopped.clone();
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let play = async {
                match mode {
                    PlayMode::CompleteAfter(d) => tokio::time::sleep(d).await,
                    PlayMode::Never => std::future::pending::<()>().await,
                }
            };
            let result = tokio::select! {
                _ = play => PlaybackResult::Completed,
                _ = stop_rx.recv() => {
                    stopped.fetch_add(1, Ordering::SeqCst);
                    PlaybackResult::Stopped
                }
            };
            active.fetch_sub(1, Ordering::SeqCst);
            result
        });

        Ok(PlaybackHandle::new(stop_tx, task))
    }
}

/// Recognizer fake. Scripted utterances are reported in order; once the
/// script is exhausted it stays silent.
pub struct FakeRecognizer {
    script: Mutex<VecDeque<Utterance>>,
    pub polls: AtomicUsize,
}

impl FakeRecognizer {
    pub fn silent() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn hearing(text: &str, confidence: f32) -> Self {
        let recognizer = Self::silent();
        recognizer.push(utterance(text, confidence));
        recognizer
    }

    pub fn push(&self, heard: Utterance) {
        self.script.lock().unwrap().push_back(heard);
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn recognize_once(&self) -> Result<Option<Utterance>, RecognizerError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(heard) => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(Some(heard))
            }
            None => {
                // Silence: park until the monitor cancels us
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
        }
    }
}

/// Status sink that records everything it is told.
pub struct RecordingStatus {
    pub modes: Mutex<Vec<Mode>>,
    pub lines: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<ConversationError>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self {
            modes: Mutex::new(Vec::new()),
            lines: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn saw_mode(&self, mode: Mode) -> bool {
        self.modes.lock().unwrap().contains(&mode)
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl StatusSink for RecordingStatus {
    fn state_changed(&self, mode: Mode) {
        self.modes.lock().unwrap().push(mode);
    }

    fn status(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }

    fn notify(&self, error: &ConversationError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

/// All the fakes, pre-wired into one orchestrator.
pub struct Harness {
    pub capture: Arc<FakeCapture>,
    pub transcriber: Arc<FakeTranscriber>,
    pub responder: Arc<FakeResponder>,
    pub playback: Arc<FakePlayback>,
    pub recognizer: Arc<FakeRecognizer>,
    pub transcript: Arc<TranscriptStore>,
    pub status: Arc<RecordingStatus>,
    pub session: SessionId,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            capture: Arc::new(FakeCapture::new()),
            transcriber: Arc::new(FakeTranscriber::new()),
            responder: Arc::new(FakeResponder::new()),
            playback: Arc::new(FakePlayback::new(PlayMode::CompleteAfter(
                Duration::from_millis(20),
            ))),
            recognizer: Arc::new(FakeRecognizer::silent()),
            transcript: Arc::new(TranscriptStore::in_memory()),
            status: Arc::new(RecordingStatus::new()),
            session: SessionId::generate(),
        }
    }

    pub fn orchestrator(&self) -> ConversationOrchestrator {
        self.orchestrator_with(test_settings())
    }

    pub fn orchestrator_with(&self, settings: TurnSettings) -> ConversationOrchestrator {
        let collab = Collaborators {
            capture: self.capture.clone(),
            transcriber: self.transcriber.clone(),
            responder: self.responder.clone(),
            playback: self.playback.clone(),
            recognizer: self.recognizer.clone(),
            transcript: self.transcript.clone(),
            status: self.status.clone(),
        };
        ConversationOrchestrator::new(self.session.clone(), collab, settings)
    }

    pub async fn turns(&self) -> Vec<jarvis::Turn> {
        self.transcript.list(&self.session).await
    }
}

/// Settings tuned for fast tests
pub fn test_settings() -> TurnSettings {
    TurnSettings {
        settle_delay: Duration::from_millis(10),
        ..TurnSettings::default()
    }
}
