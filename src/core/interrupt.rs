//! Interruption detection while the assistant is speaking.
//!
//! A background monitor runs the speech recognizer concurrently with
//! playback and forwards utterances that pass the interruption policy.
//! The monitor is the one legitimate background task in the system and
//! must be torn down whenever `Speaking` is exited, for any reason.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::adapters::{SpeechRecognizer, Utterance};

/// Thresholds deciding which utterances count as interruptions.
///
/// Utterances below the confidence or length threshold, or matching a
/// filler-word pattern, are discarded silently so background noise does
/// not cut off playback. The values are tuning parameters, not fixed
/// requirements, and are configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptPolicy {
    /// Minimum recognizer confidence
    pub min_confidence: f32,

    /// Minimum utterance length in characters
    pub min_chars: usize,

    /// Filler words that never count as interruptions
    pub filler_words: Vec<String>,
}

impl Default for InterruptPolicy {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            min_chars: 3,
            filler_words: [
                "uh", "um", "umm", "hmm", "hm", "mm", "mhm", "ah", "er", "huh", "uh-huh",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl InterruptPolicy {
    /// Whether an utterance should cut off assistant playback.
    pub fn is_interruption(&self, utterance: &Utterance) -> bool {
        if utterance.confidence < self.min_confidence {
            return false;
        }

        let text = utterance.text.trim();
        if text.chars().count() < self.min_chars {
            return false;
        }

        let normalized = text
            .to_lowercase()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_string();
        if self.filler_words.iter().any(|f| *f == normalized) {
            return false;
        }

        true
    }
}

/// Whether the interruption monitor is currently running.
///
/// Tagged so "torn down whenever Speaking ends" is checkable: the
/// orchestrator swaps in `NotRunning` and awaits the handle on every exit
/// path from `Speaking`.
pub enum MonitorState {
    NotRunning,
    Running(InterruptMonitor),
}

impl MonitorState {
    pub fn is_running(&self) -> bool {
        matches!(self, MonitorState::Running(_))
    }

    pub fn running_mut(&mut self) -> Option<&mut InterruptMonitor> {
        match self {
            MonitorState::Running(monitor) => Some(monitor),
            MonitorState::NotRunning => None,
        }
    }

    /// Take the monitor out, leaving `NotRunning`.
    pub fn take(&mut self) -> Option<InterruptMonitor> {
        match std::mem::replace(self, MonitorState::NotRunning) {
            MonitorState::Running(monitor) => Some(monitor),
            MonitorState::NotRunning => None,
        }
    }
}

/// Background task that listens for interruptions during playback.
pub struct InterruptMonitor {
    stop_tx: watch::Sender<bool>,
    events: mpsc::Receiver<Utterance>,
    task: JoinHandle<()>,
}

impl InterruptMonitor {
    /// Spawn the monitor loop.
    ///
    /// The loop re-checks the stop flag before every recognizer restart,
    /// so a monitor that was torn down can never resurrect a stale
    /// recognizer after the conversation has moved on.
    pub fn spawn(recognizer: Arc<dyn SpeechRecognizer>, policy: InterruptPolicy) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let (event_tx, events) = mpsc::channel::<Utterance>(8);

        let task = tokio::spawn(async move {
            loop {
                if *stop_rx.borrow() {
                    break;
                }

                let heard = tokio::select! {
                    heard = recognizer.recognize_once() => heard,
                    _ = stop_rx.wait_for(|stop| *stop) => break,
                };

                match heard {
                    Ok(Some(utterance)) => {
                        if policy.is_interruption(&utterance) {
                            if event_tx.send(utterance).await.is_err() {
                                break;
                            }
                        } else {
                            debug!(text = %utterance.text, "discarding utterance below interruption thresholds");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("interruption recognizer failed: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            stop_tx,
            events,
            task,
        }
    }

    /// Receive the next qualifying interruption, if any.
    ///
    /// Returns `None` once the monitor loop has exited.
    pub async fn recv(&mut self) -> Option<Utterance> {
        self.events.recv().await
    }

    /// Request teardown and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}
