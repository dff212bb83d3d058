//! Shared helpers for stream-side tests.

use super::classifier::ToolCallFragment;

/// Split text into chunks of at most `chunk_size` characters, the way a
/// transport would deliver it.
pub fn chunk_str(s: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Fragment builder; the tool name is only carried by the first fragment
/// of a call.
pub fn fragment(call_id: &str, tool_name: Option<&str>, chunk: &str) -> ToolCallFragment {
    ToolCallFragment {
        call_id: call_id.to_string(),
        tool_name: tool_name.map(str::to_string),
        argument_chunk: chunk.to_string(),
    }
}
