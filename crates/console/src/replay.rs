//! Backend stand-in that replays recorded stream sessions.

use agent_client::{
    load_sessions, AgentBackend, ApiError, PlaybackChunkStream, RecordingSession, RunPhase,
    StreamHandle, StreamRegistry, ThreadMessage,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Serves one recorded session per started run, through the same decode
/// path as a live connection.
pub struct ReplayBackend {
    sessions: Mutex<VecDeque<RecordingSession>>,
    registry: StreamRegistry,
    /// The initial thread load succeeds with an empty record; later
    /// reloads fail so the streamed buffer stays on screen.
    initial_load_done: AtomicBool,
    runs_started: AtomicUsize,
    fast: bool,
}

impl ReplayBackend {
    pub fn from_file<P: AsRef<Path>>(path: P, fast: bool) -> Result<Self> {
        let sessions = load_sessions(path)?;
        info!("Loaded {} recorded session(s)", sessions.len());
        Ok(Self {
            sessions: Mutex::new(sessions.into()),
            registry: StreamRegistry::new(),
            initial_load_done: AtomicBool::new(false),
            runs_started: AtomicUsize::new(0),
            fast,
        })
    }
}

#[async_trait]
impl AgentBackend for ReplayBackend {
    async fn start_run(&self, _thread_id: &str, _message: &str) -> Result<String, ApiError> {
        let index = self.runs_started.fetch_add(1, Ordering::SeqCst);
        Ok(format!("replay-{index}"))
    }

    async fn cancel_run(&self, _run_id: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn run_status(&self, _run_id: &str) -> Result<RunPhase, ApiError> {
        // A recording cannot be resumed, so a drop is always terminal.
        Ok(RunPhase::Completed)
    }

    async fn thread_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>, ApiError> {
        if !self.initial_load_done.swap(true, Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Err(ApiError::Status {
            status: 501,
            body: "replay sessions have no durable record".to_string(),
        })
    }

    async fn open_stream(&self, run_id: &str) -> Result<StreamHandle, ApiError> {
        let session = self
            .sessions
            .lock()
            .map_err(|_| ApiError::Network("replay state poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| ApiError::Network("no recorded sessions left".to_string()))?;
        let chunks = Box::new(PlaybackChunkStream::new(session.chunks, self.fast));
        Ok(self.registry.spawn(run_id, chunks, None))
    }
}
