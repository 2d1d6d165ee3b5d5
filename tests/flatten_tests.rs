// opcflat - Integration Tests
//
// Organized into:
// 1. Entry dispatch
// 2. Latest reading and freshness stamp
// 3. Display names, overrides and templates
// 4. Message envelope
// 5. Streaming path

use opcflat::{
    Diagnostics, ErrorKind, FlattenError, Flattener, FlattenerConfig, Message, NameOverrides,
    OutputTemplate, StreamingFlattener, Strategy,
};
use serde_json::{json, Value};

// ============================================================================
// Helpers
// ============================================================================

fn reading(uri: &str, id: &str, name: &str, value: Value, ts: Option<&str>) -> Value {
    let mut envelope = json!({ "Value": value });
    if let Some(ts) = ts {
        envelope["SourceTimestamp"] = json!(ts);
    }
    json!({ "ApplicationUri": uri, "NodeId": id, "DisplayName": name, "Value": envelope })
}

fn flatten_json(flattener: &Flattener, readings: &[Value]) -> Value {
    let text = serde_json::to_string(readings).unwrap();
    let out = flattener.flatten(&text).unwrap();
    serde_json::from_str(&out).unwrap()
}

// ============================================================================
// Entry dispatch
// ============================================================================

#[test]
fn test_empty_string_yields_empty_object() {
    assert_eq!(Flattener::new().flatten("").unwrap(), "{}");
}

#[test]
fn test_leading_whitespace_is_trimmed() {
    let text = format!(
        "\n\t  {}  \n",
        serde_json::to_string(&reading("u", "n", "T", json!(1), None)).unwrap()
    );
    let out: Value = serde_json::from_str(&Flattener::new().flatten(&text).unwrap()).unwrap();
    assert_eq!(out["u;T"], json!(1));
}

#[test]
fn test_malformed_bracketed_input_reports_parse_kind() {
    let err = Flattener::new().flatten("[{\"ApplicationUri\":").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn test_non_object_elements_are_malformed_readings() {
    let err = Flattener::new().flatten("[1, 2, 3]").unwrap_err();
    assert!(matches!(err, FlattenError::MalformedReading { index: 0, .. }));
}

// ============================================================================
// Latest reading and freshness stamp
// ============================================================================

#[test]
fn test_single_reading_has_one_payload_key() {
    let out = flatten_json(
        &Flattener::new(),
        &[reading("uri1", "n1", "Temp", json!(21.5), Some("2024-01-01T00:00:00Z"))],
    );
    let obj = out.as_object().unwrap();
    assert_eq!(obj.len(), 2);
    assert!(obj.contains_key("uri1;Temp"));
    assert!(obj.contains_key("TimeCreated"));
}

#[test]
fn test_later_reading_wins_regardless_of_order() {
    let t1 = "2024-01-01T00:00:00Z";
    let t2 = "2024-01-01T00:05:00Z";

    for readings in [
        vec![
            reading("uri1", "n1", "Temp", json!(10), Some(t1)),
            reading("uri1", "n1", "Temp", json!(20), Some(t2)),
        ],
        vec![
            reading("uri1", "n1", "Temp", json!(20), Some(t2)),
            reading("uri1", "n1", "Temp", json!(10), Some(t1)),
        ],
    ] {
        let out = flatten_json(&Flattener::new(), &readings);
        assert_eq!(out["uri1;Temp"], json!(20));
        assert_eq!(out["TimeCreated"], json!(t2));
    }
}

#[test]
fn test_dated_reading_beats_undated_reading() {
    let readings = vec![
        reading("u", "n", "T", json!("dated"), Some("2024-01-01T00:00:00Z")),
        reading("u", "n", "T", json!("undated"), None),
    ];
    let out = flatten_json(&Flattener::new(), &readings);
    assert_eq!(out["u;T"], json!("dated"));
}

#[test]
fn test_freshness_is_max_over_identities() {
    let readings = vec![
        reading("u", "a", "A", json!(1), Some("2024-01-01T00:00:00Z")),
        reading("u", "b", "B", json!(2), Some("2024-06-01T00:00:00+02:00")),
        reading("u", "c", "C", json!(3), Some("not-a-timestamp")),
        reading("u", "d", "D", json!(4), None),
    ];
    let out = flatten_json(&Flattener::new(), &readings);
    assert_eq!(out["TimeCreated"], json!("2024-05-31T22:00:00Z"));
    assert_eq!(out.as_object().unwrap().len(), 5);
}

#[test]
fn test_same_tag_different_origins_are_distinct() {
    let readings = vec![
        reading("plc1", "n1", "Temp", json!(1), None),
        reading("plc2", "n1", "Temp", json!(2), None),
    ];
    let out = flatten_json(&Flattener::new(), &readings);
    assert_eq!(out["plc1;Temp"], json!(1));
    assert_eq!(out["plc2;Temp"], json!(2));
}

#[test]
fn test_reflattening_output_does_not_crash() {
    let flattener = Flattener::new();
    let first = flattener
        .flatten(&serde_json::to_string(&[reading("u", "n", "T", json!(1), None)]).unwrap())
        .unwrap();

    // A flat document lacks identity fields.
    let second = flattener.flatten(&first);
    assert!(matches!(second, Err(FlattenError::MalformedReading { .. })));
}

// ============================================================================
// Display names, overrides and templates
// ============================================================================

#[test]
fn test_override_with_empty_display_name() {
    let overrides = NameOverrides::from_mapping_json(
        r#"{"NodesMapping":[{"n1":{"DisplayName":"Reactor1Temp"}}]}"#,
    )
    .unwrap();
    let flattener = Flattener::new().with_overrides(overrides);

    let out = flattener
        .flatten(r#"[{"ApplicationUri":"uri1","NodeId":"n1","DisplayName":"","Value":{"Value":21.5,"SourceTimestamp":"2024-01-01T00:00:00Z"}}]"#)
        .unwrap();
    assert_eq!(
        out,
        r#"{"Reactor1Temp":21.5,"TimeCreated":"2024-01-01T00:00:00Z"}"#
    );
}

#[test]
fn test_missing_override_is_raised() {
    let flattener =
        Flattener::with_config(FlattenerConfig::default().with_application_uri(false));
    let err = flattener
        .flatten(r#"[{"ApplicationUri":"u","NodeId":"n1","Value":{"Value":1}}]"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingOverride);
}

#[test]
fn test_custom_property_names() {
    let config = FlattenerConfig::default()
        .with_node_id_property("TagId")
        .with_display_name_property("Label")
        .with_application_uri(false);
    let flattener = Flattener::with_config(config);

    let out = flattener
        .flatten(r#"{"ApplicationUri":"u","TagId":"t7","Label":"Flow","Value":{"Value":9}}"#)
        .unwrap();
    let out: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(out["Flow"], json!(9));
}

#[test]
fn test_template_is_not_mutated_across_messages() {
    let template = OutputTemplate::from_json(r#"{"Line":"L1","Meta":{"v":1}}"#).unwrap();
    let flattener = Flattener::new().with_template(template.clone());

    let a = flatten_json(&flattener, &[reading("u", "n1", "A", json!(1), None)]);
    let b = flatten_json(&flattener, &[reading("u", "n2", "B", json!(2), None)]);

    assert!(a.get("u;B").is_none());
    assert!(b.get("u;A").is_none());
    assert_eq!(b["Line"], json!("L1"));
    assert_eq!(flattener.template(), Some(&template));
}

#[test]
fn test_shared_flattener_across_threads() {
    use std::sync::Arc;
    use std::thread;

    let overrides: NameOverrides = [("n0", "Zero")].into_iter().collect();
    let flattener = Arc::new(Flattener::new().with_overrides(overrides));
    let diagnostics = Arc::new(Diagnostics::new());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let flattener = Arc::clone(&flattener);
            let diagnostics = Arc::clone(&diagnostics);
            thread::spawn(move || {
                for i in 0..50 {
                    let body = serde_json::to_string(&[reading(
                        "u",
                        &format!("n{}", i % 3),
                        "T",
                        json!(t * 100 + i),
                        None,
                    )])
                    .unwrap();
                    let msg = Message::new(body);
                    flattener.flatten_message(&msg, &diagnostics).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let snap = diagnostics.snapshot();
    assert_eq!(snap.received, 200);
    assert_eq!(snap.flattened, 200);
    assert_eq!(flattener.overrides().len(), 1);
}

// ============================================================================
// Message envelope
// ============================================================================

#[test]
fn test_failed_message_does_not_block_next() {
    let flattener = Flattener::with_config(FlattenerConfig::default().with_application_uri(false));
    let diagnostics = Diagnostics::new();

    let bad = Message::new(r#"[{"ApplicationUri":"u","NodeId":"n1","Value":{"Value":1}}]"#);
    let err = flattener.flatten_message(&bad, &diagnostics).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingOverride);

    let good = Message::new(
        r#"[{"ApplicationUri":"u","NodeId":"n1","DisplayName":"T","Value":{"Value":1}}]"#,
    )
    .with_property("source", "opcpublisher");
    let out = flattener.flatten_message(&good, &diagnostics).unwrap();
    assert_eq!(out.properties.get("source").map(String::as_str), Some("opcpublisher"));

    let snap = diagnostics.snapshot();
    assert_eq!((snap.received, snap.flattened, snap.failed), (2, 1, 1));
}

// ============================================================================
// Streaming path
// ============================================================================

#[test]
fn test_streaming_ignores_template_overrides_and_stamp() {
    let overrides: NameOverrides = [("n1", "Reactor1Temp")].into_iter().collect();
    let template = OutputTemplate::from_json(r#"{"Site":"A"}"#).unwrap();
    let flattener = Flattener::new()
        .with_overrides(overrides)
        .with_template(template);

    let body = serde_json::to_string(&[reading(
        "uri1",
        "n1",
        "Temp",
        json!(21.5),
        Some("2024-01-01T00:00:00Z"),
    )])
    .unwrap();

    assert_eq!(flattener.flatten_stream(&body).unwrap(), r#"{"Temp":21.5}"#);
}

#[test]
fn test_streaming_and_batch_diverge_on_duplicates() {
    let readings = vec![
        reading("u", "n", "T", json!(2), Some("2024-01-01T00:00:02Z")),
        reading("u", "n", "T", json!(1), Some("2024-01-01T00:00:01Z")),
    ];
    let body = serde_json::to_string(&readings).unwrap();

    // Batch keeps the newest reading.
    let batch = flatten_json(&Flattener::new(), &readings);
    assert_eq!(batch["u;T"], json!(2));

    // Streaming keeps both, in encounter order.
    let stream = StreamingFlattener::default().flatten(&body).unwrap();
    assert_eq!(stream, r#"{"T":2,"T":1}"#);

    let diagnostics = Diagnostics::new();
    let out = Flattener::new()
        .flatten_message_with(&Message::new(body), &diagnostics, Strategy::Streaming)
        .unwrap();
    assert_eq!(out.body_text(), r#"{"T":2,"T":1}"#);
}
