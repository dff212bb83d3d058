//! Client for the agent backend: the command API and the per-run event
//! stream. The engine consuming this crate depends on the [`AgentBackend`]
//! seam, never on HTTP directly, so scripted backends can stand in during
//! tests and playback.

mod http;
mod recording;
mod sse;
mod stream;
mod streaming;
mod types;


pub use http::HttpAgentBackend;
pub use recording::{load_sessions, RecordedChunk, RecordingSession, StreamRecorder};
pub use sse::SseDecoder;
pub use stream::{StreamHandle, StreamNotice, StreamRegistry};
pub use streaming::{ChunkStream, HttpChunkStream, PlaybackChunkStream};
pub use types::{ApiError, MessageRole, RunPhase, ThreadMessage};

use async_trait::async_trait;

/// Boundary to the agent backend.
///
/// Commands are plain request/response; the event stream is push-based and
/// delivered through the handle returned by `open_stream`. At most one
/// live stream exists per run id.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Start a run for a thread, returning the new run id.
    async fn start_run(&self, thread_id: &str, message: &str) -> Result<String, ApiError>;

    /// Request cancellation of a run.
    async fn cancel_run(&self, run_id: &str) -> Result<(), ApiError>;

    /// Current lifecycle phase of a run.
    async fn run_status(&self, run_id: &str) -> Result<RunPhase, ApiError>;

    /// The durable message record of a thread.
    async fn thread_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ApiError>;

    /// Subscribe to the live event stream of a run.
    async fn open_stream(&self, run_id: &str) -> Result<StreamHandle, ApiError>;
}
