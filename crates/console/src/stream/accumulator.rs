use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use super::classifier::ToolCallFragment;

/// Fields worth surfacing in the live indicator while arguments are still
/// arriving.
const DISPLAY_FIELDS: &[&str] = &["path", "file_path", "command", "query", "url"];

/// Argument payload of one tool call, grown fragment by fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatedToolCall {
    pub call_id: String,
    pub tool_name: String,
    /// Concatenation of all argument chunks in arrival order. Only ever
    /// appended to, never rewritten.
    pub argument_buffer: String,
    /// Best-effort fields extracted from the possibly incomplete buffer.
    /// Advisory until the call resolves; re-derived on every feed.
    pub derived_fields: BTreeMap<String, String>,
}

/// Merges tool-call fragments sharing a call id into growing argument
/// buffers, keeping display-relevant fields extracted as soon as they
/// become parseable.
///
/// Entries are owned here until the call resolves; resolution hands the
/// final buffer to the owning message and retires the entry.
pub struct ArgumentAccumulator {
    calls: Vec<AccumulatedToolCall>,
    field_patterns: Vec<(&'static str, Regex)>,
}

impl ArgumentAccumulator {
    pub fn new() -> Self {
        let field_patterns = DISPLAY_FIELDS
            .iter()
            .map(|field| {
                // No closing quote required, so a half-arrived value still
                // surfaces in the indicator.
                let pattern = format!(r#""{field}"\s*:\s*"((?:[^"\\]|\\.)*)"#);
                (*field, Regex::new(&pattern).unwrap())
            })
            .collect();
        Self {
            calls: Vec::new(),
            field_patterns,
        }
    }

    /// Append one fragment. A new call id initializes a buffer; a known
    /// call id appends, never replaces.
    pub fn feed(&mut self, fragment: ToolCallFragment) -> &AccumulatedToolCall {
        let index = match self
            .calls
            .iter()
            .position(|call| call.call_id == fragment.call_id)
        {
            Some(index) => {
                let call = &mut self.calls[index];
                if call.tool_name.is_empty() {
                    if let Some(name) = &fragment.tool_name {
                        call.tool_name = name.clone();
                    }
                }
                call.argument_buffer.push_str(&fragment.argument_chunk);
                index
            }
            None => {
                debug!("New tool call {} accumulating", fragment.call_id);
                self.calls.push(AccumulatedToolCall {
                    call_id: fragment.call_id,
                    tool_name: fragment.tool_name.unwrap_or_default(),
                    argument_buffer: fragment.argument_chunk,
                    derived_fields: BTreeMap::new(),
                });
                self.calls.len() - 1
            }
        };

        let derived = scan_fields(&self.field_patterns, &self.calls[index].argument_buffer);
        self.calls[index].derived_fields = derived;
        &self.calls[index]
    }

    pub fn get(&self, call_id: &str) -> Option<&AccumulatedToolCall> {
        self.calls.iter().find(|call| call.call_id == call_id)
    }

    /// The most recently opened outstanding call, for the live indicator.
    pub fn active(&self) -> Option<&AccumulatedToolCall> {
        self.calls.last()
    }

    /// Retire the entry for a call, returning its final state.
    pub fn resolve(&mut self, call_id: &str) -> Option<AccumulatedToolCall> {
        let index = self
            .calls
            .iter()
            .position(|call| call.call_id == call_id)?;
        Some(self.calls.remove(index))
    }

    /// Retire the oldest outstanding call. Results arrive in call order,
    /// so this pairs an output that carries no call id.
    pub fn resolve_oldest(&mut self) -> Option<AccumulatedToolCall> {
        if self.calls.is_empty() {
            None
        } else {
            Some(self.calls.remove(0))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl Default for ArgumentAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract display fields from the buffer. A complete JSON object is
/// authoritative; otherwise each field is scanned tolerantly in the
/// partial text.
fn scan_fields(
    patterns: &[(&'static str, Regex)],
    buffer: &str,
) -> BTreeMap<String, String> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(buffer) {
        let mut fields = BTreeMap::new();
        for (key, value) in map {
            if DISPLAY_FIELDS.contains(&key.as_str()) {
                if let Some(text) = value.as_str() {
                    fields.insert(key, text.to_string());
                }
            }
        }
        return fields;
    }

    let mut fields = BTreeMap::new();
    for (field, pattern) in patterns {
        if let Some(caps) = pattern.captures(buffer) {
            if let Some(value) = caps.get(1) {
                fields.insert((*field).to_string(), unescape(value.as_str()));
            }
        }
    }
    fields
}

fn unescape(value: &str) -> String {
    value.replace("\\\"", "\"").replace("\\\\", "\\")
}
