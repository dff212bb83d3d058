use serde::Serialize;
use std::collections::BTreeMap;

use super::grammar::Grammar;

/// A structured tag extracted from message text.
///
/// `closed == false` means the closing marker has not arrived yet. Its
/// content reflects only what has been observed so far and is re-derived
/// on every parse of the growing buffer, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagNode {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub content: String,
    pub closed: bool,
    /// Stable across re-parses of a growing buffer: derived from the byte
    /// offset of the opening marker.
    pub id: String,
    /// Exact slice of the source text covered by this node.
    pub raw: String,
}

/// One segment of a parsed message: plain text or a recognized tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MessageSpan {
    Text(String),
    Tag(TagNode),
}

impl MessageSpan {
    /// The raw source text of this span. Concatenating the raw text of
    /// all spans reconstructs the parser input exactly.
    pub fn raw_text(&self) -> &str {
        match self {
            MessageSpan::Text(text) => text,
            MessageSpan::Tag(node) => &node.raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MarkerKind {
    Open,
    Close,
}

struct Marker<'t> {
    kind: MarkerKind,
    start: usize,
    end: usize,
    name: &'t str,
    attr_source: &'t str,
}

struct OpenEntry {
    name: String,
    marker_start: usize,
    marker_end: usize,
    /// Index of this tag's span, present only for tags opened at top
    /// level. Tags opened inside another tag are covered by the outer
    /// tag's slice and emit no span of their own.
    span_index: Option<usize>,
}

/// Extract the ordered span sequence from the full accumulated text of a
/// message.
///
/// Pure function of its input, always re-run on the complete buffer. The
/// matching is stack-based: a closing marker pops the most recently opened
/// tag with that name, a closing marker with no open tag degrades to plain
/// text, and tags left open at end of input stay `closed == false` with
/// everything after their opening marker as provisional content.
pub fn parse(grammar: &Grammar, text: &str) -> Vec<MessageSpan> {
    let mut markers: Vec<Marker> = Vec::new();
    for caps in grammar.open_re().captures_iter(text) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        markers.push(Marker {
            kind: MarkerKind::Open,
            start: whole.0,
            end: whole.1,
            name: caps.get(1).map(|m| m.as_str()).unwrap_or(""),
            attr_source: caps.get(2).map(|m| m.as_str()).unwrap_or(""),
        });
    }
    for caps in grammar.close_re().captures_iter(text) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        markers.push(Marker {
            kind: MarkerKind::Close,
            start: whole.0,
            end: whole.1,
            name: caps.get(1).map(|m| m.as_str()).unwrap_or(""),
            attr_source: "",
        });
    }
    markers.sort_by_key(|marker| marker.start);

    let mut spans: Vec<MessageSpan> = Vec::new();
    let mut stack: Vec<OpenEntry> = Vec::new();
    // Start of the top-level text region not yet emitted. Stray closing
    // markers stay inside this region and come out as plain text.
    let mut cursor = 0usize;

    for marker in &markers {
        match marker.kind {
            MarkerKind::Open => {
                let span_index = if stack.is_empty() {
                    if marker.start > cursor {
                        spans.push(MessageSpan::Text(text[cursor..marker.start].to_string()));
                    }
                    cursor = marker.start;
                    // Provisionally the tag runs to end of input; closing
                    // it later replaces this with the bounded node.
                    spans.push(MessageSpan::Tag(TagNode {
                        name: marker.name.to_string(),
                        attributes: grammar.parse_attributes(marker.attr_source),
                        content: trim_leading_newline(&text[marker.end..]).to_string(),
                        closed: false,
                        id: format!("tag-{}", marker.start),
                        raw: text[marker.start..].to_string(),
                    }));
                    Some(spans.len() - 1)
                } else {
                    None
                };
                stack.push(OpenEntry {
                    name: marker.name.to_string(),
                    marker_start: marker.start,
                    marker_end: marker.end,
                    span_index,
                });
            }
            MarkerKind::Close => {
                let Some(position) = stack
                    .iter()
                    .rposition(|entry| entry.name == marker.name)
                else {
                    // No matching opener. The marker text stays in the
                    // surrounding region and degrades to plain text.
                    continue;
                };
                let entry = stack.remove(position);
                // Anything opened after this tag sits inside its slice.
                stack.truncate(position);

                if let Some(index) = entry.span_index {
                    let attributes = match &spans[index] {
                        MessageSpan::Tag(node) => node.attributes.clone(),
                        MessageSpan::Text(_) => BTreeMap::new(),
                    };
                    spans[index] = MessageSpan::Tag(TagNode {
                        name: entry.name,
                        attributes,
                        content: trim_block_newlines(&text[entry.marker_end..marker.start]),
                        closed: true,
                        id: format!("tag-{}", entry.marker_start),
                        raw: text[entry.marker_start..marker.end].to_string(),
                    });
                    cursor = marker.end;
                }
            }
        }
    }

    if stack.is_empty() && cursor < text.len() {
        spans.push(MessageSpan::Text(text[cursor..].to_string()));
    }

    spans
}

/// Trim at most one leading and one trailing newline from tag content.
fn trim_block_newlines(content: &str) -> String {
    let content = content.strip_prefix('\n').unwrap_or(content);
    let content = content.strip_suffix('\n').unwrap_or(content);
    content.to_string()
}

fn trim_leading_newline(content: &str) -> &str {
    content.strip_prefix('\n').unwrap_or(content)
}
