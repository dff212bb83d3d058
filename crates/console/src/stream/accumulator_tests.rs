use super::accumulator::ArgumentAccumulator;
use super::test_utils::{chunk_str, fragment};

#[test]
fn fragments_with_the_same_call_id_concatenate_in_order() {
    let mut accumulator = ArgumentAccumulator::new();
    accumulator.feed(fragment("1", Some("write_file"), "{\"path\":\"a"));
    let call = accumulator.feed(fragment("1", None, ".txt\"}"));

    assert_eq!(call.call_id, "1");
    assert_eq!(call.tool_name, "write_file");
    assert_eq!(call.argument_buffer, "{\"path\":\"a.txt\"}");

    // The same call id never splits into two entries.
    assert!(accumulator.get("1").is_some());
    accumulator.resolve("1");
    assert!(accumulator.is_empty());
}

#[test]
fn single_character_chunks_accumulate_correctly() {
    let payload = r#"{"command":"cargo test","timeout":60}"#;
    let mut accumulator = ArgumentAccumulator::new();
    let mut first = true;
    for chunk in chunk_str(payload, 1) {
        let name = if first { Some("execute_command") } else { None };
        accumulator.feed(fragment("c9", name, &chunk));
        first = false;
    }

    let call = accumulator.get("c9").unwrap();
    assert_eq!(call.argument_buffer, payload);
    assert_eq!(
        call.derived_fields.get("command").map(String::as_str),
        Some("cargo test")
    );
}

#[test]
fn display_fields_surface_before_the_buffer_is_complete() {
    let mut accumulator = ArgumentAccumulator::new();
    let call = accumulator.feed(fragment("1", Some("write_file"), "{\"path\":\"src/ma"));

    // The closing quote has not arrived; the partial value still shows.
    assert_eq!(
        call.derived_fields.get("path").map(String::as_str),
        Some("src/ma")
    );
}

#[test]
fn derived_fields_are_rederived_on_every_feed() {
    let mut accumulator = ArgumentAccumulator::new();
    accumulator.feed(fragment("1", Some("write_file"), "{\"path\":\"src/ma"));
    let call = accumulator.feed(fragment("1", None, "in.rs\",\"content\":\"x\"}"));

    assert_eq!(
        call.derived_fields.get("path").map(String::as_str),
        Some("src/main.rs")
    );
}

#[test]
fn escaped_quotes_in_field_values_are_handled() {
    let mut accumulator = ArgumentAccumulator::new();
    let call = accumulator.feed(fragment(
        "1",
        Some("execute_command"),
        r#"{"command":"echo \"hi\""}"#,
    ));
    assert_eq!(
        call.derived_fields.get("command").map(String::as_str),
        Some(r#"echo "hi""#)
    );
}

#[test]
fn resolution_retires_the_entry() {
    let mut accumulator = ArgumentAccumulator::new();
    accumulator.feed(fragment("1", Some("write_file"), "{}"));
    accumulator.feed(fragment("2", Some("read_file"), "{}"));

    let resolved = accumulator.resolve("1").unwrap();
    assert_eq!(resolved.call_id, "1");
    assert!(accumulator.get("1").is_none());
    assert!(accumulator.get("2").is_some());
    assert!(accumulator.resolve("1").is_none());
}

#[test]
fn resolve_oldest_pairs_outputs_in_call_order() {
    let mut accumulator = ArgumentAccumulator::new();
    accumulator.feed(fragment("1", Some("write_file"), "{}"));
    accumulator.feed(fragment("2", Some("read_file"), "{}"));

    assert_eq!(accumulator.resolve_oldest().unwrap().call_id, "1");
    assert_eq!(accumulator.resolve_oldest().unwrap().call_id, "2");
    assert!(accumulator.resolve_oldest().is_none());
}

#[test]
fn active_call_tracks_the_most_recent_outstanding_entry() {
    let mut accumulator = ArgumentAccumulator::new();
    assert!(accumulator.active().is_none());
    accumulator.feed(fragment("1", Some("write_file"), "{}"));
    accumulator.feed(fragment("2", Some("read_file"), "{\"pa"));
    assert_eq!(accumulator.active().unwrap().call_id, "2");
}

#[test]
fn tool_name_arriving_late_backfills_the_entry() {
    let mut accumulator = ArgumentAccumulator::new();
    accumulator.feed(fragment("1", None, "{\"qu"));
    let call = accumulator.feed(fragment("1", Some("search_files"), "ery\":\"x\"}"));
    assert_eq!(call.tool_name, "search_files");
}
