//! Run lifecycle and the reconciled conversation model.
//!
//! All mutation happens on the caller's task: the transport task only
//! pushes notices into a channel, and `handle_notice` applies them one at
//! a time, in arrival order. The snapshot is rebuilt from scratch after
//! every mutation so readers only ever see a consistent view.

mod model;
mod reconciler;


pub use model::{ActiveCall, CombinedCall, ConversationSnapshot, ReconciledMessage, RunState};
pub use reconciler::combine_calls;

use agent_client::{AgentBackend, ApiError, MessageRole, RunPhase, StreamHandle, StreamNotice};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::markup::{parse, Grammar, MessageSpan, TagNode};
use crate::stream::{classify, AccumulatedToolCall, AgentEvent, ArgumentAccumulator, ToolPhase};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no thread selected")]
    NoThread,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Mutable state owned by one run. Created when the run starts, destroyed
/// on run end or thread switch, so nothing leaks across runs.
struct RunContext {
    run_id: String,
    accumulator: ArgumentAccumulator,
    /// Call ids with a started tool-status and no terminal one yet.
    in_progress: Vec<String>,
    /// Calls resolved by a terminal tool-status whose output message has
    /// not arrived yet.
    expected_outputs: usize,
    /// One resubscribe is attempted per run; the next failure is terminal.
    reconnected: bool,
    stop_requested: bool,
}

impl RunContext {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            accumulator: ArgumentAccumulator::new(),
            in_progress: Vec::new(),
            expected_outputs: 0,
            reconnected: false,
            stop_requested: false,
        }
    }
}

struct BufferedMessage {
    role: MessageRole,
    text: String,
}

/// Drives one thread view against the backend.
///
/// Consumes stream notices, maintains the in-memory message buffer, and
/// rebuilds the reconciled snapshot after every mutation. The buffer is
/// provisional while a run streams; a terminal run-status triggers an
/// authoritative reload of the backend's durable record.
pub struct Controller {
    backend: Arc<dyn AgentBackend>,
    grammar: Grammar,
    thread_id: Option<String>,
    buffer: Vec<BufferedMessage>,
    run: Option<RunContext>,
    stream: Option<StreamHandle>,
    state: RunState,
    notice: Option<String>,
    snapshot: ConversationSnapshot,
}

impl Controller {
    pub fn new(backend: Arc<dyn AgentBackend>) -> Self {
        Self {
            backend,
            grammar: Grammar::new(),
            thread_id: None,
            buffer: Vec::new(),
            run: None,
            stream: None,
            state: RunState::Idle,
            notice: None,
            snapshot: ConversationSnapshot::empty(),
        }
    }

    /// Current reconciled view. A new snapshot replaces it on every
    /// mutation; the returned value is never mutated afterwards.
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshot.clone()
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    /// Receiver for the live stream's notices. Changes identity when the
    /// stream is reopened, so callers should re-fetch it per iteration.
    pub fn notices(&self) -> Option<async_channel::Receiver<StreamNotice>> {
        self.stream.as_ref().map(StreamHandle::notices)
    }

    /// Switch to a thread, unconditionally tearing down any active run
    /// first, then loading the thread's persisted history.
    pub async fn select_thread(&mut self, thread_id: &str) -> Result<(), EngineError> {
        self.teardown();
        self.thread_id = Some(thread_id.to_string());
        let messages = self.backend.thread_messages(thread_id).await?;
        self.replace_buffer(messages);
        self.rebuild();
        Ok(())
    }

    /// Start a run for the selected thread. Clears prior streaming state.
    pub async fn start(&mut self, message: &str) -> Result<(), EngineError> {
        let thread_id = self.thread_id.clone().ok_or(EngineError::NoThread)?;
        self.close_stream();
        self.run = None;
        self.notice = None;

        self.buffer.push(BufferedMessage {
            role: MessageRole::User,
            text: message.to_string(),
        });

        let run_id = self.backend.start_run(&thread_id, message).await?;
        info!("Started run {run_id} on thread {thread_id}");
        let handle = self.backend.open_stream(&run_id).await?;

        self.run = Some(RunContext::new(run_id));
        self.stream = Some(handle);
        self.state = RunState::Running;
        self.rebuild();
        Ok(())
    }

    /// Stop the active run: close the transport first, then request
    /// backend cancellation, then reload the durable record. Idempotent;
    /// a second call never issues a second cancellation.
    pub async fn stop(&mut self) -> Result<(), EngineError> {
        let Some(run) = self.run.as_mut() else {
            return Ok(());
        };
        if run.stop_requested || self.state != RunState::Running {
            return Ok(());
        }
        run.stop_requested = true;
        let run_id = run.run_id.clone();

        self.close_stream();
        if let Err(e) = self.backend.cancel_run(&run_id).await {
            // Cleanup proceeds regardless so the view never sticks
            // mid-transition.
            warn!("Cancellation request failed: {e}");
            self.notice = Some(format!("cancellation request failed: {e}"));
        }
        self.finish_run(RunState::Stopped).await;
        Ok(())
    }

    /// Reload persisted history and re-subscribe if the run is still
    /// active server-side.
    pub async fn resync(&mut self) -> Result<(), EngineError> {
        let thread_id = self.thread_id.clone().ok_or(EngineError::NoThread)?;

        if let Some(run_id) = self.run.as_ref().map(|run| run.run_id.clone()) {
            match self.backend.run_status(&run_id).await {
                Ok(RunPhase::Running) => {
                    self.close_stream();
                    let handle = self.backend.open_stream(&run_id).await?;
                    self.stream = Some(handle);
                    self.state = RunState::Running;
                }
                Ok(phase) => {
                    self.finish_run(state_for_phase(phase)).await;
                    return Ok(());
                }
                Err(e) => warn!("Status check failed during resync: {e}"),
            }
        }

        let messages = self.backend.thread_messages(&thread_id).await?;
        self.replace_buffer(messages);
        self.rebuild();
        Ok(())
    }

    /// Apply one transport notice. Notices for a run are applied strictly
    /// in arrival order.
    pub async fn handle_notice(&mut self, notice: StreamNotice) {
        match notice {
            StreamNotice::Event(payload) => {
                if let Some(event) = classify(&payload) {
                    self.apply_event(event).await;
                }
            }
            StreamNotice::Error(message) => self.handle_transport_error(&message).await,
            StreamNotice::Closed => {
                // A stream ending without a terminal run-status is a drop.
                if self.state == RunState::Running {
                    self.handle_transport_error("stream closed unexpectedly")
                        .await;
                }
            }
        }
    }

    async fn apply_event(&mut self, event: AgentEvent) {
        if self.run.is_none() || self.state != RunState::Running {
            debug!("Ignoring event outside an active run");
            return;
        }
        match event {
            AgentEvent::Content(text) => {
                self.append_assistant_text(&text);
                self.rebuild();
            }
            AgentEvent::ToolCallDelta(fragment) => {
                if let Some(run) = self.run.as_mut() {
                    run.accumulator.feed(fragment);
                }
                self.rebuild();
            }
            AgentEvent::ToolStatus { call_id, phase } => {
                let resolved = self.apply_tool_status(&call_id, phase);
                if let Some(call) = resolved {
                    let markup = materialize_call(&call);
                    self.append_assistant_text(&markup);
                }
                self.rebuild();
            }
            AgentEvent::ToolOutput { text } => {
                let resolved = match self.run.as_mut() {
                    Some(run) => {
                        if run.expected_outputs > 0 {
                            run.expected_outputs -= 1;
                            None
                        } else {
                            run.accumulator.resolve_oldest()
                        }
                    }
                    None => None,
                };
                if let Some(call) = resolved {
                    let markup = materialize_call(&call);
                    self.append_assistant_text(&markup);
                }
                self.buffer.push(BufferedMessage {
                    role: MessageRole::Tool,
                    text,
                });
                self.rebuild();
            }
            AgentEvent::RunStatus(phase) => {
                if phase != RunPhase::Running {
                    self.finish_run(state_for_phase(phase)).await;
                }
            }
            AgentEvent::Ignorable => {}
        }
    }

    fn apply_tool_status(&mut self, call_id: &str, phase: ToolPhase) -> Option<AccumulatedToolCall> {
        let run = self.run.as_mut()?;
        match phase {
            ToolPhase::Started => {
                if !run.in_progress.iter().any(|id| id == call_id) {
                    run.in_progress.push(call_id.to_string());
                }
                None
            }
            ToolPhase::Finished | ToolPhase::Failed => {
                run.in_progress.retain(|id| id != call_id);
                let resolved = run.accumulator.resolve(call_id);
                if resolved.is_some() {
                    run.expected_outputs += 1;
                }
                resolved
            }
        }
    }

    async fn handle_transport_error(&mut self, message: &str) {
        if self.state != RunState::Running {
            return;
        }
        let Some(run_id) = self.run.as_ref().map(|run| run.run_id.clone()) else {
            return;
        };
        let already_reconnected = self
            .run
            .as_ref()
            .map(|run| run.reconnected)
            .unwrap_or(false);
        warn!("Transport error on run {run_id}: {message}");
        self.close_stream();

        if !already_reconnected {
            // Resubscribe only when the run is confirmed still active, to
            // avoid resurrecting a finished run.
            match self.backend.run_status(&run_id).await {
                Ok(RunPhase::Running) => match self.backend.open_stream(&run_id).await {
                    Ok(handle) => {
                        if let Some(run) = self.run.as_mut() {
                            run.reconnected = true;
                        }
                        info!("Resubscribed to run {run_id}");
                        self.stream = Some(handle);
                        return;
                    }
                    Err(e) => warn!("Resubscribe failed: {e}"),
                },
                Ok(phase) => debug!("Run {run_id} already {phase:?} after drop"),
                Err(e) => warn!("Status check failed after drop: {e}"),
            }
        }

        // Keep the partial streamed content, annotated, rather than
        // discarding it.
        self.notice = Some(format!("connection lost: {message}"));
        self.run = None;
        self.state = RunState::Error;
        self.rebuild();
    }

    /// Common terminal path: tear down the stream, replace the provisional
    /// buffer with the backend's durable record, rebuild.
    async fn finish_run(&mut self, terminal: RunState) {
        self.close_stream();
        self.run = None;
        self.state = terminal;

        if let Some(thread_id) = self.thread_id.clone() {
            match self.backend.thread_messages(&thread_id).await {
                Ok(messages) => self.replace_buffer(messages),
                Err(e) => {
                    // The streamed buffer stays visible when the reload
                    // fails; the view must not lose content.
                    warn!("History reload failed: {e}");
                    self.notice = Some(format!("history reload failed: {e}"));
                }
            }
        }
        self.rebuild();
    }

    /// Close and drop the transport handle. Safe to call repeatedly or
    /// when no stream is open.
    fn close_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
    }

    fn teardown(&mut self) {
        self.close_stream();
        self.run = None;
        self.state = RunState::Idle;
        self.notice = None;
        self.buffer.clear();
        self.rebuild();
    }

    fn replace_buffer(&mut self, messages: Vec<agent_client::ThreadMessage>) {
        self.buffer = messages
            .into_iter()
            .map(|message| BufferedMessage {
                role: message.role,
                text: message.content,
            })
            .collect();
    }

    fn append_assistant_text(&mut self, text: &str) {
        match self.buffer.last_mut() {
            Some(message) if message.role == MessageRole::Assistant => {
                message.text.push_str(text);
            }
            _ => self.buffer.push(BufferedMessage {
                role: MessageRole::Assistant,
                text: text.to_string(),
            }),
        }
    }

    fn rebuild(&mut self) {
        let parsed: Vec<(MessageRole, Vec<MessageSpan>)> = self
            .buffer
            .iter()
            .map(|message| (message.role, parse(&self.grammar, &message.text)))
            .collect();

        let mut messages = Vec::with_capacity(parsed.len());
        for (index, (role, spans)) in parsed.iter().enumerate() {
            let calls = if *role == MessageRole::Assistant {
                let call_nodes: Vec<&TagNode> = spans.iter().filter_map(as_tag).collect();
                // Result tags live in the tool messages directly following
                // this assistant message.
                let mut result_nodes: Vec<&TagNode> = Vec::new();
                for (later_role, later_spans) in parsed.iter().skip(index + 1) {
                    if *later_role != MessageRole::Tool {
                        break;
                    }
                    result_nodes.extend(later_spans.iter().filter_map(as_tag));
                }
                combine_calls(&call_nodes, &result_nodes)
            } else {
                Vec::new()
            };
            messages.push(ReconciledMessage {
                role: *role,
                spans: spans.clone(),
                calls,
            });
        }

        let active_call = self
            .run
            .as_ref()
            .and_then(|run| run.accumulator.active())
            .map(|call| ActiveCall {
                call_id: call.call_id.clone(),
                tool_name: call.tool_name.clone(),
                derived_fields: call.derived_fields.clone(),
            });
        let running_calls = self
            .run
            .as_ref()
            .map(|run| run.in_progress.clone())
            .unwrap_or_default();

        self.snapshot = ConversationSnapshot {
            run_state: self.state,
            messages,
            active_call,
            running_calls,
            notice: self.notice.clone(),
        };
    }
}

fn as_tag(span: &MessageSpan) -> Option<&TagNode> {
    match span {
        MessageSpan::Tag(node) => Some(node),
        MessageSpan::Text(_) => None,
    }
}

fn state_for_phase(phase: RunPhase) -> RunState {
    match phase {
        RunPhase::Running => RunState::Running,
        RunPhase::Completed => RunState::Completed,
        RunPhase::Failed => RunState::Error,
        RunPhase::Stopped => RunState::Stopped,
    }
}

/// Render a resolved tool call as inline markup appended to the owning
/// message, so the parser remains the single source of tag nodes.
fn materialize_call(call: &AccumulatedToolCall) -> String {
    let spec = Grammar::spec_for_tool(&call.tool_name);
    let mut markup = String::from("\n<");
    markup.push_str(spec.name);
    if spec.tool.is_none() {
        markup.push_str(&format!(" name=\"{}\"", sanitize_attribute(&call.tool_name)));
    }
    for (key, value) in &call.derived_fields {
        if spec.attributes.contains(&key.as_str()) {
            markup.push_str(&format!(" {key}=\"{}\"", sanitize_attribute(value)));
        }
    }
    markup.push_str(">\n");
    markup.push_str(&call.argument_buffer);
    markup.push_str(&format!("\n</{}>", spec.name));
    markup
}

fn sanitize_attribute(value: &str) -> String {
    value.replace('"', "'").replace(['<', '>'], "")
}
