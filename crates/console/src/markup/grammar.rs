use regex::Regex;
use std::collections::BTreeMap;

/// One recognized inline tag: its name, the backend tool whose resolved
/// call is rendered as this tag, and the attributes it may carry.
#[derive(Debug, Clone, Copy)]
pub struct TagSpec {
    pub name: &'static str,
    pub tool: Option<&'static str>,
    pub attributes: &'static [&'static str],
}

/// Fallback tag for tools without a dedicated markup form. Carries the
/// tool name as an attribute.
pub const FALLBACK_TAG: TagSpec = TagSpec {
    name: "tool-call",
    tool: None,
    attributes: &["name"],
};

/// The finite set of tags the parser recognizes. Anything else in message
/// text is plain content.
pub const TAGS: &[TagSpec] = &[
    TagSpec {
        name: "create-file",
        tool: Some("write_file"),
        attributes: &["path"],
    },
    TagSpec {
        name: "edit-file",
        tool: Some("edit_file"),
        attributes: &["path"],
    },
    TagSpec {
        name: "read-file",
        tool: Some("read_file"),
        attributes: &["path"],
    },
    TagSpec {
        name: "delete-file",
        tool: Some("delete_file"),
        attributes: &["path"],
    },
    TagSpec {
        name: "run-command",
        tool: Some("execute_command"),
        attributes: &["command"],
    },
    TagSpec {
        name: "search-files",
        tool: Some("search_files"),
        attributes: &["query"],
    },
    TagSpec {
        name: "fetch-url",
        tool: Some("fetch_url"),
        attributes: &["url"],
    },
    FALLBACK_TAG,
];

/// Compiled matching tables for the tag set.
pub struct Grammar {
    open_re: Regex,
    close_re: Regex,
    attr_re: Regex,
}

impl Grammar {
    pub fn new() -> Self {
        let alternation = TAGS
            .iter()
            .map(|tag| regex::escape(tag.name))
            .collect::<Vec<_>>()
            .join("|");
        // Attribute values exclude angle brackets so a marker never spans
        // another marker; anything that fails this shape stays plain text.
        let open_pattern =
            format!(r#"<({alternation})((?:\s+[a-zA-Z_][a-zA-Z0-9_-]*="[^"<>]*")*)\s*>"#);
        let close_pattern = format!("</({alternation})>");
        Self {
            open_re: Regex::new(&open_pattern).unwrap(),
            close_re: Regex::new(&close_pattern).unwrap(),
            attr_re: Regex::new(r#"([a-zA-Z_][a-zA-Z0-9_-]*)="([^"]*)""#).unwrap(),
        }
    }

    pub(crate) fn open_re(&self) -> &Regex {
        &self.open_re
    }

    pub(crate) fn close_re(&self) -> &Regex {
        &self.close_re
    }

    /// Parse the attribute section of an opening marker. Fragments that do
    /// not match the attribute shape are skipped, never an error.
    pub fn parse_attributes(&self, source: &str) -> BTreeMap<String, String> {
        self.attr_re
            .captures_iter(source)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .collect()
    }

    /// The tag a resolved backend tool call is rendered as.
    pub fn spec_for_tool(tool_name: &str) -> &'static TagSpec {
        TAGS.iter()
            .find(|tag| tag.tool == Some(tool_name))
            .unwrap_or(&FALLBACK_TAG)
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}
