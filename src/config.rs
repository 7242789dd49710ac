//! Configuration for jarvis endpoints and audio devices.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (JARVIS_HOME, JARVIS_TRANSCRIBE_URL,
//!    JARVIS_RESPOND_URL, JARVIS_AUDIO_BASE_URL, JARVIS_WEBHOOK_TOKEN)
//! 2. Config file (.jarvis/config.yaml)
//! 3. Defaults (~/.jarvis, local endpoints on port 5678)
//!
//! Config file discovery searches the current directory and its parents
//! for .jarvis/config.yaml.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::InterruptPolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub interrupt: Option<InterruptConfig>,
    #[serde(default)]
    pub conversation: Option<ConversationConfig>,
    #[serde(default)]
    pub capture: Option<CaptureConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointsConfig {
    pub transcribe_url: Option<String>,
    pub respond_url: Option<String>,
    pub audio_base_url: Option<String>,
    pub webhook_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterruptConfig {
    pub min_confidence: Option<f32>,
    pub min_chars: Option<usize>,
    pub filler_words: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    pub settle_delay_ms: Option<u64>,
    pub listen_window_secs: Option<u64>,
    pub recognizer_window_ms: Option<u64>,
    pub fallback_reply: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    pub input_format: Option<String>,
    pub device: Option<String>,
    pub ffmpeg_bin: Option<String>,
    pub player_bin: Option<String>,
}

/// Resolved configuration with all defaults applied
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to jarvis home (session logs)
    pub home: PathBuf,
    /// Speech-to-text endpoint
    pub transcribe_url: String,
    /// Responder webhook endpoint
    pub respond_url: String,
    /// Base for relative audio URLs in responder replies
    pub audio_base_url: String,
    /// Bearer token for the responder webhook
    pub webhook_token: Option<String>,
    /// Interruption thresholds
    pub interrupt: InterruptPolicy,
    /// Conversation pacing
    pub conversation: ConversationSettings,
    /// Microphone and player binaries
    pub capture: CaptureSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ConversationSettings {
    pub settle_delay_ms: u64,
    pub listen_window_secs: u64,
    pub recognizer_window_ms: u64,
    pub fallback_reply: Option<String>,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 750,
            listen_window_secs: 6,
            recognizer_window_ms: 1200,
            fallback_reply: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub input_format: String,
    pub device: String,
    pub ffmpeg_bin: String,
    pub player_bin: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        #[cfg(target_os = "macos")]
        let (input_format, device) = ("avfoundation", ":0");
        #[cfg(not(target_os = "macos"))]
        let (input_format, device) = ("alsa", "default");

        Self {
            input_format: input_format.to_string(),
            device: device.to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            player_bin: "ffplay".to_string(),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".jarvis").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".jarvis");

    let config_file = find_config_file();
    let config = match config_file.as_deref() {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };

    let endpoints = config
        .as_ref()
        .map(|c| c.endpoints.clone())
        .unwrap_or_default();

    let home = env_override("JARVIS_HOME")
        .map(PathBuf::from)
        .unwrap_or(default_home);

    let transcribe_url = env_override("JARVIS_TRANSCRIBE_URL")
        .or(endpoints.transcribe_url)
        .unwrap_or_else(|| "http://127.0.0.1:5678/transcribe".to_string());

    let respond_url = env_override("JARVIS_RESPOND_URL")
        .or(endpoints.respond_url)
        .unwrap_or_else(|| "http://127.0.0.1:5678/respond".to_string());

    let audio_base_url = env_override("JARVIS_AUDIO_BASE_URL")
        .or(endpoints.audio_base_url)
        .unwrap_or_else(|| "http://127.0.0.1:5678".to_string());

    let webhook_token = env_override("JARVIS_WEBHOOK_TOKEN").or(endpoints.webhook_token);

    let defaults = InterruptPolicy::default();
    let interrupt = match config.as_ref().and_then(|c| c.interrupt.as_ref()) {
        Some(section) => InterruptPolicy {
            min_confidence: section.min_confidence.unwrap_or(defaults.min_confidence),
            min_chars: section.min_chars.unwrap_or(defaults.min_chars),
            filler_words: section
                .filler_words
                .clone()
                .unwrap_or(defaults.filler_words),
        },
        None => defaults,
    };

    let conv_defaults = ConversationSettings::default();
    let conversation = match config.as_ref().and_then(|c| c.conversation.as_ref()) {
        Some(section) => ConversationSettings {
            settle_delay_ms: section
                .settle_delay_ms
                .unwrap_or(conv_defaults.settle_delay_ms),
            listen_window_secs: section
                .listen_window_secs
                .unwrap_or(conv_defaults.listen_window_secs),
            recognizer_window_ms: section
                .recognizer_window_ms
                .unwrap_or(conv_defaults.recognizer_window_ms),
            fallback_reply: section.fallback_reply.clone(),
        },
        None => conv_defaults,
    };

    let cap_defaults = CaptureSettings::default();
    let capture = match config.as_ref().and_then(|c| c.capture.as_ref()) {
        Some(section) => CaptureSettings {
            input_format: section
                .input_format
                .clone()
                .unwrap_or(cap_defaults.input_format),
            device: section.device.clone().unwrap_or(cap_defaults.device),
            ffmpeg_bin: section.ffmpeg_bin.clone().unwrap_or(cap_defaults.ffmpeg_bin),
            player_bin: section.player_bin.clone().unwrap_or(cap_defaults.player_bin),
        },
        None => cap_defaults,
    };

    Ok(ResolvedConfig {
        home,
        transcribe_url,
        respond_url,
        audio_base_url,
        webhook_token,
        interrupt,
        conversation,
        capture,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the session log directory ($JARVIS_HOME/sessions)
pub fn sessions_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("sessions"))
}
