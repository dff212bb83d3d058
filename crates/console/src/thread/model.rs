use agent_client::MessageRole;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::markup::{MessageSpan, TagNode};

/// Lifecycle state of the active run. Mutated only by run-status events
/// and explicit user stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Error,
    Stopped,
}

/// A tool invocation paired with its result.
///
/// Created when a call tag is first observed closed, completed when a
/// matching result tag appears, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedCall {
    pub call: TagNode,
    /// None while execution is outstanding.
    pub result: Option<TagNode>,
    pub id: String,
    /// First-seen position among the owning message's calls.
    pub sequence: usize,
}

/// One message of the reconciled conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledMessage {
    pub role: MessageRole,
    pub spans: Vec<MessageSpan>,
    /// Call/result pairs; populated for assistant messages.
    pub calls: Vec<CombinedCall>,
}

impl ReconciledMessage {
    /// The raw text of the message, reassembled from its spans.
    pub fn raw_text(&self) -> String {
        self.spans.iter().map(MessageSpan::raw_text).collect()
    }
}

/// Advisory indicator for a tool call whose arguments are still arriving.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveCall {
    pub call_id: String,
    pub tool_name: String,
    pub derived_fields: BTreeMap<String, String>,
}

/// Immutable view of the conversation at one point in time.
///
/// Rebuilt from scratch on every mutation; readers never observe a
/// partially updated model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSnapshot {
    pub run_state: RunState,
    pub messages: Vec<ReconciledMessage>,
    pub active_call: Option<ActiveCall>,
    /// Call ids with a started tool-status and no terminal one yet.
    pub running_calls: Vec<String>,
    /// Set when the conversation ended abnormally; display-only.
    pub notice: Option<String>,
}

impl ConversationSnapshot {
    pub fn empty() -> Self {
        Self {
            run_state: RunState::Idle,
            messages: Vec::new(),
            active_call: None,
            running_calls: Vec::new(),
            notice: None,
        }
    }
}
