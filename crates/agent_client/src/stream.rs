//! Transport adapter: one live event stream per run.
//!
//! The reader task is the only spawned task in the client. It decodes
//! frames and pushes notices into a channel; all interpretation of the
//! payloads happens on the consumer's task, in arrival order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::recording::StreamRecorder;
use crate::sse::SseDecoder;
use crate::streaming::ChunkStream;

/// A notice pushed by the transport task.
#[derive(Debug, Clone)]
pub enum StreamNotice {
    /// The data payload of one event frame, still JSON text.
    Event(String),
    /// Transport-level failure. The stream is dead after this; whether to
    /// resubscribe is the consumer's decision.
    Error(String),
    /// The stream ended normally.
    Closed,
}

#[derive(Clone)]
struct CloseSignal {
    closed: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl CloseSignal {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.abort.abort();
    }
}

/// Handle to one live event stream. Dropping the handle closes the stream.
pub struct StreamHandle {
    run_id: String,
    notices: async_channel::Receiver<StreamNotice>,
    signal: Option<CloseSignal>,
}

impl StreamHandle {
    /// Build a handle around an externally fed channel. `close()` on such
    /// a handle has no task to stop and is a no-op.
    pub fn from_channel(
        run_id: impl Into<String>,
        notices: async_channel::Receiver<StreamNotice>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            notices,
            signal: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn notices(&self) -> async_channel::Receiver<StreamNotice> {
        self.notices.clone()
    }

    /// Close the stream. Synchronous and idempotent; safe to call when
    /// nothing is live anymore.
    pub fn close(&self) {
        if let Some(signal) = &self.signal {
            signal.close();
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Tracks live streams so that at most one connection exists per run id.
#[derive(Default)]
pub struct StreamRegistry {
    active: Mutex<HashMap<String, CloseSignal>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the reader task for a run. A previously open stream for the
    /// same run id is closed first.
    pub fn spawn(
        &self,
        run_id: &str,
        chunks: Box<dyn ChunkStream>,
        recorder: Option<Arc<StreamRecorder>>,
    ) -> StreamHandle {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prior) = active.remove(run_id) {
            debug!("Closing prior stream for run {run_id}");
            prior.close();
        }

        if let Some(recorder) = &recorder {
            recorder.start_session(run_id);
        }

        let (tx, rx) = async_channel::bounded(256);
        let closed = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(read_stream(
            run_id.to_string(),
            chunks,
            tx,
            closed.clone(),
            recorder,
        ));
        let signal = CloseSignal {
            closed,
            abort: task.abort_handle(),
        };
        active.insert(run_id.to_string(), signal.clone());

        StreamHandle {
            run_id: run_id.to_string(),
            notices: rx,
            signal: Some(signal),
        }
    }
}

async fn read_stream(
    run_id: String,
    mut chunks: Box<dyn ChunkStream>,
    tx: async_channel::Sender<StreamNotice>,
    closed: Arc<AtomicBool>,
    recorder: Option<Arc<StreamRecorder>>,
) {
    let mut decoder = SseDecoder::new();
    loop {
        if closed.load(Ordering::SeqCst) {
            return;
        }
        match chunks.next_chunk().await {
            Ok(Some(chunk)) => {
                for payload in decoder.feed(&chunk) {
                    record(&recorder, &payload);
                    debug!("Stream event for run {run_id}: {payload}");
                    if tx.send(StreamNotice::Event(payload)).await.is_err() {
                        return;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = tx.send(StreamNotice::Error(e.to_string())).await;
                finish_recording(&recorder);
                return;
            }
        }
    }

    if let Some(payload) = decoder.finish() {
        record(&recorder, &payload);
        let _ = tx.send(StreamNotice::Event(payload)).await;
    }
    finish_recording(&recorder);
    let _ = tx.send(StreamNotice::Closed).await;
}

fn record(recorder: &Option<Arc<StreamRecorder>>, payload: &str) {
    if let Some(recorder) = recorder {
        if let Err(e) = recorder.record_chunk(payload) {
            warn!("Failed to record stream chunk: {e}");
        }
    }
}

fn finish_recording(recorder: &Option<Arc<StreamRecorder>>) {
    if let Some(recorder) = recorder {
        if let Err(e) = recorder.end_session() {
            warn!("Failed to save recording session: {e}");
        }
    }
}
