use agent_client::RunPhase;
use serde_json::Value;
use tracing::{debug, warn};

/// A transport event after classification. Transient; applied to the
/// model and discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Plain text appended to the assistant message being streamed.
    Content(String),
    /// One fragment of a tool call's argument payload.
    ToolCallDelta(ToolCallFragment),
    /// Execution progress for a tool call. Drives transient indicators
    /// and call resolution; the payload itself never becomes content.
    ToolStatus { call_id: String, phase: ToolPhase },
    /// A tool's result, delivered by the backend as a separate message.
    ToolOutput { text: String },
    /// Terminal run lifecycle notification.
    RunStatus(RunPhase),
    /// Heartbeats and other payloads with no effect on the model.
    Ignorable,
}

/// One fragment of a tool call split across transport events. Fragments
/// sharing a call id are concatenated strictly in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallFragment {
    pub call_id: String,
    /// Present on the first fragment of a call only.
    pub tool_name: Option<String>,
    pub argument_chunk: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPhase {
    Started,
    Finished,
    Failed,
}

/// Classify one raw event payload.
///
/// Returns None when the payload cannot be decoded or classified; a single
/// malformed event never aborts the stream.
pub fn classify(payload: &str) -> Option<AgentEvent> {
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => classify_value(&value, true),
        Err(e) => {
            warn!("Dropping undecodable event payload: {e}");
            None
        }
    }
}

fn classify_value(value: &Value, allow_unwrap: bool) -> Option<AgentEvent> {
    let kind = value.get("type").and_then(Value::as_str);

    if kind == Some("status") {
        return Some(match value.get("status").and_then(Value::as_str) {
            Some("completed") => AgentEvent::RunStatus(RunPhase::Completed),
            Some("failed") => AgentEvent::RunStatus(RunPhase::Failed),
            Some("stopped") => AgentEvent::RunStatus(RunPhase::Stopped),
            // Non-terminal status payloads are heartbeats.
            _ => AgentEvent::Ignorable,
        });
    }

    if kind == Some("tool_status") {
        let Some(call_id) = value.get("call_id").and_then(Value::as_str) else {
            warn!("Dropping tool_status payload without call_id");
            return None;
        };
        let phase = match value.get("status").and_then(Value::as_str) {
            Some("started") | Some("running") => ToolPhase::Started,
            Some("finished") | Some("success") => ToolPhase::Finished,
            Some("failed") | Some("error") => ToolPhase::Failed,
            other => {
                warn!("Dropping tool_status payload with status {other:?}");
                return None;
            }
        };
        return Some(AgentEvent::ToolStatus {
            call_id: call_id.to_string(),
            phase,
        });
    }

    if value.get("role").and_then(Value::as_str) == Some("tool") {
        let text = value
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Some(AgentEvent::ToolOutput {
            text: text.to_string(),
        });
    }

    if kind == Some("content") {
        if let Some(tool_call) = value.get("tool_call") {
            let Some(call_id) = tool_call.get("id").and_then(Value::as_str) else {
                warn!("Dropping tool_call delta without an id");
                return None;
            };
            return Some(AgentEvent::ToolCallDelta(ToolCallFragment {
                call_id: call_id.to_string(),
                tool_name: tool_call
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                argument_chunk: tool_call
                    .get("arguments")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }));
        }

        if let Some(text) = value.get("content").and_then(Value::as_str) {
            // Compatibility shim: some producers re-serialize a whole
            // event envelope into the content field. Unwrap one level;
            // anything that does not classify stays plain content.
            if allow_unwrap {
                let trimmed = text.trim_start();
                if trimmed.starts_with('{') {
                    if let Ok(inner) = serde_json::from_str::<Value>(trimmed) {
                        if inner.get("type").is_some() || inner.get("role").is_some() {
                            debug!("Unwrapping double-encoded content payload");
                            if let Some(event) = classify_value(&inner, false) {
                                return Some(event);
                            }
                        }
                    }
                }
            }
            return Some(AgentEvent::Content(text.to_string()));
        }

        warn!("Dropping content payload without content or tool_call");
        return None;
    }

    warn!("Dropping unclassifiable event payload");
    None
}
