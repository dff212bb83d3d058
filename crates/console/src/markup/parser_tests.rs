use super::{parse, Grammar, MessageSpan, TagNode};

fn grammar() -> Grammar {
    Grammar::new()
}

fn reconstruct(spans: &[MessageSpan]) -> String {
    spans.iter().map(MessageSpan::raw_text).collect()
}

fn assert_lossless(text: &str) {
    let spans = parse(&grammar(), text);
    assert_eq!(
        reconstruct(&spans),
        text,
        "span concatenation must reconstruct the input"
    );
}

fn tags(spans: &[MessageSpan]) -> Vec<&TagNode> {
    spans
        .iter()
        .filter_map(|span| match span {
            MessageSpan::Tag(node) => Some(node),
            MessageSpan::Text(_) => None,
        })
        .collect()
}

#[test]
fn empty_input_yields_no_spans() {
    let spans = parse(&grammar(), "");
    assert!(spans.is_empty());
    assert_lossless("");
}

#[test]
fn plain_text_is_a_single_span() {
    let spans = parse(&grammar(), "nothing special here");
    assert_eq!(
        spans,
        vec![MessageSpan::Text("nothing special here".to_string())]
    );
    assert_lossless("nothing special here");
}

#[test]
fn balanced_tag_is_closed_with_inner_content() {
    let spans = parse(&grammar(), "<run-command>x</run-command>");
    assert_eq!(spans.len(), 1);
    let node = &tags(&spans)[0];
    assert_eq!(node.name, "run-command");
    assert_eq!(node.content, "x");
    assert!(node.closed);
    assert_lossless("<run-command>x</run-command>");
}

#[test]
fn unterminated_trailing_tag_stays_open() {
    let input = r#"plain <create-file path="a.txt">partial"#;
    let spans = parse(&grammar(), input);
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0], MessageSpan::Text("plain ".to_string()));
    let node = &tags(&spans)[0];
    assert_eq!(node.name, "create-file");
    assert_eq!(node.attributes.get("path").map(String::as_str), Some("a.txt"));
    assert_eq!(node.content, "partial");
    assert!(!node.closed);
    assert_lossless(input);
}

#[test]
fn mismatched_closer_degrades_to_plain_text() {
    let spans = parse(&grammar(), "</run-command>tail");
    assert_eq!(
        spans,
        vec![MessageSpan::Text("</run-command>tail".to_string())]
    );
}

#[test]
fn input_that_is_only_an_open_marker_is_one_open_tag() {
    let spans = parse(&grammar(), "<run-command>");
    assert_eq!(spans.len(), 1);
    let node = &tags(&spans)[0];
    assert!(!node.closed);
    assert_eq!(node.content, "");
    assert_lossless("<run-command>");
}

#[test]
fn attributes_are_extracted_from_the_opening_marker() {
    let input = r#"<run-command command="cargo build" cwd="crates">out</run-command>"#;
    let spans = parse(&grammar(), input);
    let node = &tags(&spans)[0];
    assert_eq!(
        node.attributes.get("command").map(String::as_str),
        Some("cargo build")
    );
    assert_eq!(node.attributes.get("cwd").map(String::as_str), Some("crates"));
    assert!(node.closed);
    assert_lossless(input);
}

#[test]
fn one_leading_and_trailing_newline_are_trimmed_from_content() {
    let input = "<create-file path=\"a.txt\">\nline one\nline two\n</create-file>";
    let spans = parse(&grammar(), input);
    let node = &tags(&spans)[0];
    assert_eq!(node.content, "line one\nline two");
    assert_lossless(input);
}

#[test]
fn only_one_newline_is_trimmed_per_side() {
    let input = "<run-command>\n\nx\n\n</run-command>";
    let spans = parse(&grammar(), input);
    assert_eq!(tags(&spans)[0].content, "\nx\n");
}

#[test]
fn text_before_between_and_after_tags_is_preserved() {
    let input = "a <run-command>x</run-command> b <read-file path=\"f\">y</read-file> c";
    let spans = parse(&grammar(), input);
    assert_eq!(spans.len(), 5);
    assert_eq!(spans[0], MessageSpan::Text("a ".to_string()));
    assert_eq!(spans[2], MessageSpan::Text(" b ".to_string()));
    assert_eq!(spans[4], MessageSpan::Text(" c".to_string()));
    assert_lossless(input);
}

#[test]
fn same_name_nesting_matches_last_in_first_out() {
    let input = "<run-command>a<run-command>b</run-command>c</run-command>";
    let spans = parse(&grammar(), input);
    // One top-level node; the inner pair is part of its sliced content.
    assert_eq!(spans.len(), 1);
    let node = &tags(&spans)[0];
    assert!(node.closed);
    assert_eq!(node.content, "a<run-command>b</run-command>c");
    assert_lossless(input);
}

#[test]
fn interleaved_closers_degrade_without_losing_text() {
    let input = "<run-command>a<create-file>b</run-command>c</create-file>";
    let spans = parse(&grammar(), input);
    let node = &tags(&spans)[0];
    assert!(node.closed);
    assert_eq!(node.content, "a<create-file>b");
    // The orphaned closer stays verbatim in the trailing text.
    assert_eq!(
        spans.last(),
        Some(&MessageSpan::Text("c</create-file>".to_string()))
    );
    assert_lossless(input);
}

#[test]
fn unknown_tags_are_plain_text() {
    let input = "<unknown-tag>x</unknown-tag>";
    let spans = parse(&grammar(), input);
    assert_eq!(spans, vec![MessageSpan::Text(input.to_string())]);
}

#[test]
fn reparse_is_idempotent() {
    let input = "a <create-file path=\"a.txt\">body</create-file> b <run-command>going";
    let first = parse(&grammar(), input);
    let second = parse(&grammar(), input);
    assert_eq!(first, second);
}

#[test]
fn node_ids_are_stable_while_the_buffer_grows() {
    let full = "intro <run-command>ls -la</run-command> done";
    let grammar = grammar();
    let mut previous_id: Option<String> = None;
    for boundary in 0..=full.len() {
        if !full.is_char_boundary(boundary) {
            continue;
        }
        let spans = parse(&grammar, &full[..boundary]);
        assert_eq!(reconstruct(&spans), &full[..boundary]);
        if let Some(node) = tags(&spans).first() {
            if let Some(previous) = &previous_id {
                assert_eq!(&node.id, previous);
            }
            previous_id = Some(node.id.clone());
        }
    }
}

#[test]
fn every_prefix_of_a_streamed_message_is_lossless() {
    let full = concat!(
        "Let me set that up.\n",
        "<create-file path=\"src/main.rs\">\n",
        "fn main() {}\n",
        "</create-file>\n",
        "Now running the build:\n",
        "<run-command command=\"cargo build\">\n",
        "Compiling...\n",
    );
    for boundary in 0..=full.len() {
        if full.is_char_boundary(boundary) {
            assert_lossless(&full[..boundary]);
        }
    }
}

#[test]
fn malformed_attribute_syntax_degrades_to_plain_text() {
    // Unquoted attribute value fails the marker shape entirely.
    let input = "<create-file path=a.txt>x</create-file>";
    let spans = parse(&grammar(), input);
    assert_eq!(spans, vec![MessageSpan::Text(input.to_string())]);
}
