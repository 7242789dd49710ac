//! Append-only per-session transcript store.
//!
//! Turns are kept in memory for the lifetime of the process and, when a
//! log directory is configured, appended as JSON lines to
//! `<dir>/<session>.jsonl` so a session can be displayed later.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;

use crate::domain::{SessionId, Turn};

/// Errors that can occur persisting or replaying a transcript
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcript IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcript serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-session message log. Append-only; turns are never mutated or
/// deleted within a session's lifetime.
pub struct TranscriptStore {
    sessions: RwLock<HashMap<SessionId, Vec<Turn>>>,
    log_dir: Option<PathBuf>,
}

impl TranscriptStore {
    /// In-memory store with no file sink.
    pub fn in_memory() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            log_dir: None,
        }
    }

    /// Store that also appends each turn to `<dir>/<session>.jsonl`.
    pub fn with_log_dir(dir: PathBuf) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            log_dir: Some(dir),
        }
    }

    /// Append a turn to a session, in arrival order.
    pub async fn append(&self, session: &SessionId, turn: Turn) -> Result<(), TranscriptError> {
        if let Some(dir) = &self.log_dir {
            fs::create_dir_all(dir).await?;
            let path = dir.join(format!("{}.jsonl", session));

            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            let json = serde_json::to_string(&turn)?;
            file.write_all(format!("{}\n", json).as_bytes()).await?;
            file.flush().await?;
        }

        self.sessions
            .write()
            .await
            .entry(session.clone())
            .or_default()
            .push(turn);

        Ok(())
    }

    /// All turns for a session, in arrival order.
    pub async fn list(&self, session: &SessionId) -> Vec<Turn> {
        self.sessions
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of turns recorded for a session.
    pub async fn len(&self, session: &SessionId) -> usize {
        self.sessions
            .read()
            .await
            .get(session)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Replay a session's JSONL log from disk.
    pub async fn replay(dir: &Path, session: &SessionId) -> Result<Vec<Turn>, TranscriptError> {
        let path = dir.join(format!("{}.jsonl", session));
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let mut turns = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            turns.push(serde_json::from_str(&line)?);
        }

        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = TranscriptStore::in_memory();
        let session = SessionId::generate();

        store
            .append(&session, Turn::user("turn on the lights"))
            .await
            .unwrap();
        store
            .append(&session, Turn::assistant("Done, sir.", None))
            .await
            .unwrap();

        let turns = store.list(&session).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "turn on the lights");
        assert_eq!(turns[1].text, "Done, sir.");
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = TranscriptStore::in_memory();
        let a = SessionId::generate();
        let b = SessionId::generate();

        store.append(&a, Turn::user("hello")).await.unwrap();

        assert_eq!(store.len(&a).await, 1);
        assert_eq!(store.len(&b).await, 0);
    }

    #[tokio::test]
    async fn test_jsonl_replay_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = TranscriptStore::with_log_dir(temp.path().to_path_buf());
        let session = SessionId::generate();

        store
            .append(&session, Turn::user("what time is it"))
            .await
            .unwrap();
        store
            .append(
                &session,
                Turn::assistant("It is noon.", Some("/audio/1.mp3".to_string())),
            )
            .await
            .unwrap();

        let replayed = TranscriptStore::replay(temp.path(), &session).await.unwrap();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[1].audio_url, Some("/audio/1.mp3".to_string()));
    }

    #[tokio::test]
    async fn test_replay_missing_session_is_empty() {
        let temp = TempDir::new().unwrap();
        let replayed = TranscriptStore::replay(temp.path(), &SessionId::generate())
            .await
            .unwrap();
        assert!(replayed.is_empty());
    }
}
