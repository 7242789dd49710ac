//! Command-line interface for jarvis.
//!
//! Provides commands for one-shot turns, continuous conversation mode,
//! printing recorded transcripts, and inspecting configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::adapters::{
    AudioCapture, FfmpegCapture, HttpPlayback, HttpTranscriber, Transcriber, WebhookResponder,
    WindowedRecognizer,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    Collaborators, ConversationOrchestrator, EndOfSpeech, FixedWindow, Mode, StatusSink,
    TranscriptStore, TurnOutcome, TurnSettings,
};
use crate::domain::{ConversationError, Role, SessionId};

/// jarvis - Voice conversation orchestrator
#[derive(Parser, Debug)]
#[command(name = "jarvis")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record one turn, speak the reply, and exit
    Talk {
        /// Session ID (a new one is generated if not provided)
        #[arg(short, long, env = "JARVIS_SESSION")]
        session: Option<String>,

        /// Fixed listening window in seconds instead of waiting for Enter
        #[arg(short, long)]
        window: Option<u64>,
    },

    /// Run turns back to back until Ctrl+C
    Converse {
        /// Session ID (a new one is generated if not provided)
        #[arg(short, long, env = "JARVIS_SESSION")]
        session: Option<String>,

        /// Listening window per turn in seconds
        #[arg(short, long)]
        window: Option<u64>,
    },

    /// Print a recorded session transcript
    Transcript {
        /// Session ID
        session: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Talk { session, window } => execute_talk(session, window).await,
            Commands::Converse { session, window } => execute_converse(session, window).await,
            Commands::Transcript { session } => execute_transcript(session).await,
            Commands::Config => execute_config().await,
        }
    }
}

/// End-of-speech on Enter: the user talks, then presses a key.
struct EnterKey;

#[async_trait]
impl EndOfSpeech for EnterKey {
    async fn wait(&mut self) {
        let mut reader = BufReader::new(tokio::io::stdin());
        let mut line = String::new();
        let _ = reader.read_line(&mut line).await;
    }
}

/// Status sink that prints progress to the terminal.
struct ConsoleStatus;

impl StatusSink for ConsoleStatus {
    fn state_changed(&self, mode: Mode) {
        match mode {
            Mode::Listening => println!("🎙️  Listening..."),
            Mode::Transcribing => println!("📝 Transcribing..."),
            Mode::Dispatching => println!("🤖 Thinking..."),
            Mode::Speaking => println!("🔊 Speaking... (talk to interrupt)"),
            Mode::Idle => {}
        }
    }

    fn status(&self, text: &str) {
        println!("ℹ️  {}", text);
    }

    fn notify(&self, error: &ConversationError) {
        println!("❌ {}", error);
    }
}

fn resolve_session(arg: Option<String>) -> SessionId {
    match arg {
        Some(id) if !id.trim().is_empty() => SessionId::new(id),
        _ => SessionId::generate(),
    }
}

/// Wire the real adapters from configuration.
fn build_orchestrator(cfg: &ResolvedConfig, session: SessionId) -> Result<ConversationOrchestrator> {
    let capture: Arc<dyn AudioCapture> = Arc::new(
        FfmpegCapture::new(
            cfg.capture.input_format.as_str(),
            cfg.capture.device.as_str(),
        )
        .with_binary(cfg.capture.ffmpeg_bin.as_str()),
    );
    let transcriber: Arc<dyn Transcriber> =
        Arc::new(HttpTranscriber::new(cfg.transcribe_url.as_str()));
    let responder = Arc::new(WebhookResponder::new(
        cfg.respond_url.as_str(),
        cfg.webhook_token.clone(),
    ));
    let playback = Arc::new(
        HttpPlayback::new(cfg.audio_base_url.as_str())
            .with_binary(cfg.capture.player_bin.as_str()),
    );
    let recognizer = Arc::new(WindowedRecognizer::new(
        capture.clone(),
        transcriber.clone(),
        Duration::from_millis(cfg.conversation.recognizer_window_ms),
    ));
    let transcript = Arc::new(TranscriptStore::with_log_dir(config::sessions_dir()?));

    let mut settings = TurnSettings {
        interrupt: cfg.interrupt.clone(),
        settle_delay: Duration::from_millis(cfg.conversation.settle_delay_ms),
        ..TurnSettings::default()
    };
    if let Some(reply) = &cfg.conversation.fallback_reply {
        settings.fallback_reply = reply.clone();
    }

    let collab = Collaborators {
        capture,
        transcriber,
        responder,
        playback,
        recognizer,
        transcript,
        status: Arc::new(ConsoleStatus),
    };

    Ok(ConversationOrchestrator::new(session, collab, settings))
}

/// Fire the stop switch on Ctrl+C.
fn wire_ctrl_c(orchestrator: &ConversationOrchestrator) {
    let stop = orchestrator.stop_switch();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        stop.trigger();
    });
}

/// Run a single turn
async fn execute_talk(session: Option<String>, window: Option<u64>) -> Result<()> {
    let cfg = config::config()?;
    let session = resolve_session(session);
    println!("Session: {}", session);

    let mut orchestrator = build_orchestrator(cfg, session)?;
    wire_ctrl_c(&orchestrator);

    let mut eos: Box<dyn EndOfSpeech> = match window {
        Some(secs) => Box::new(FixedWindow(Duration::from_secs(secs))),
        None => {
            println!("Press Enter when you are done speaking");
            Box::new(EnterKey)
        }
    };

    let outcome = orchestrator
        .run_turn(eos.as_mut())
        .await
        .context("turn failed")?;

    match outcome {
        TurnOutcome::Completed { assistant, .. } => println!("🗣  {}", assistant.text),
        TurnOutcome::Empty => {}
        TurnOutcome::Interrupted => println!("(interrupted; run again to continue)"),
        TurnOutcome::Stopped => println!("👋 Stopped"),
    }

    Ok(())
}

/// Run conversation mode until stopped
async fn execute_converse(session: Option<String>, window: Option<u64>) -> Result<()> {
    let cfg = config::config()?;
    let session = resolve_session(session);
    println!("Session: {}", session);
    println!("🔁 Conversation mode. Press Ctrl+C to stop.");
    println!();

    let mut orchestrator = build_orchestrator(cfg, session)?;
    wire_ctrl_c(&orchestrator);

    let secs = window.unwrap_or(cfg.conversation.listen_window_secs);
    let mut eos = FixedWindow(Duration::from_secs(secs));

    orchestrator
        .run_conversation(&mut eos)
        .await
        .context("conversation ended with an error")?;

    println!();
    println!("👋 Conversation ended");
    Ok(())
}

/// Print a recorded transcript
async fn execute_transcript(session: String) -> Result<()> {
    let dir = config::sessions_dir()?;
    let session = SessionId::new(session);

    let turns = TranscriptStore::replay(&dir, &session)
        .await
        .context("failed to read transcript")?;

    if turns.is_empty() {
        println!("No transcript for session {}", session);
        return Ok(());
    }

    for turn in turns {
        let who = match turn.role {
            Role::User => "you",
            Role::Assistant => "jarvis",
        };
        let marker = match turn.audio_url {
            Some(_) => " 🔊",
            None => "",
        };
        println!(
            "[{}] {:>6}: {}{}",
            turn.created_at.format("%Y-%m-%d %H:%M:%S"),
            who,
            turn.text,
            marker
        );
    }

    Ok(())
}

/// Show configuration
async fn execute_config() -> Result<()> {
    let cfg = config::config()?;

    println!();
    println!("jarvis Configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("Home:            {}", cfg.home.display());
    println!("Sessions:        {}", config::sessions_dir()?.display());
    println!("Transcribe URL:  {}", cfg.transcribe_url);
    println!("Respond URL:     {}", cfg.respond_url);
    println!("Audio base URL:  {}", cfg.audio_base_url);
    println!(
        "Webhook token:   {}",
        if cfg.webhook_token.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!();
    println!("Capture:");
    println!("  Input format:  {}", cfg.capture.input_format);
    println!("  Device:        {}", cfg.capture.device);
    println!("  ffmpeg:        {}", cfg.capture.ffmpeg_bin);
    println!("  Player:        {}", cfg.capture.player_bin);
    println!();
    println!("Conversation:");
    println!("  Settle delay:      {} ms", cfg.conversation.settle_delay_ms);
    println!(
        "  Listen window:     {} s",
        cfg.conversation.listen_window_secs
    );
    println!(
        "  Recognizer window: {} ms",
        cfg.conversation.recognizer_window_ms
    );
    println!();
    println!("Interruption:");
    println!("  Min confidence: {}", cfg.interrupt.min_confidence);
    println!("  Min chars:      {}", cfg.interrupt.min_chars);
    println!("  Filler words:   {}", cfg.interrupt.filler_words.join(", "));
    println!();

    if let Some(path) = &cfg.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!("Config file: none (using defaults)");
    }

    Ok(())
}
