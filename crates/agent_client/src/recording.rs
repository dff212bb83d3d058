//! Recording and playback of raw stream sessions.
//!
//! The recorder captures the data payload of every event frame together
//! with its timing, so a live run can be replayed later through the exact
//! same decode path.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

/// One recorded stream session for a run.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordingSession {
    pub run_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub chunks: Vec<RecordedChunk>,
}

/// Raw data payload of one event frame.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordedChunk {
    pub data: String,
    /// Milliseconds since session start.
    pub timestamp_ms: u64,
}

/// Appends stream sessions to a JSON file, one array of sessions per file.
pub struct StreamRecorder {
    file_path: PathBuf,
    session: Mutex<Option<(RecordingSession, Instant)>>,
}

impl StreamRecorder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            file_path: path.as_ref().to_path_buf(),
            session: Mutex::new(None),
        }
    }

    /// Begin a new session. An unfinished prior session is discarded.
    pub fn start_session(&self, run_id: &str) {
        if let Ok(mut guard) = self.session.lock() {
            *guard = Some((
                RecordingSession {
                    run_id: run_id.to_string(),
                    timestamp: chrono::Utc::now(),
                    chunks: Vec::new(),
                },
                Instant::now(),
            ));
        }
    }

    /// Record the data payload of one frame. No-op outside a session.
    pub fn record_chunk(&self, data: &str) -> Result<()> {
        if let Ok(mut guard) = self.session.lock() {
            if let Some((session, start)) = guard.as_mut() {
                session.chunks.push(RecordedChunk {
                    data: data.to_string(),
                    timestamp_ms: start.elapsed().as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    /// Finish the current session and append it to the file.
    pub fn end_session(&self) -> Result<()> {
        let finished = match self.session.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some((session, _)) = finished else {
            return Ok(());
        };

        let mut sessions = if self.file_path.exists() {
            load_sessions(&self.file_path)?
        } else {
            Vec::new()
        };
        sessions.push(session);

        let json = serde_json::to_string_pretty(&sessions)?;
        std::fs::write(&self.file_path, json).context("Failed to write recording file")?;
        Ok(())
    }
}

/// Load all sessions from a recording file.
pub fn load_sessions<P: AsRef<Path>>(path: P) -> Result<Vec<RecordingSession>> {
    let contents = std::fs::read_to_string(path).context("Failed to read recording file")?;
    serde_json::from_str(&contents).context("Failed to parse recording file")
}
