//! Unit tests for columnar envelope decoding

use irace_stats::stats::decoder::{DecodeError, Decoded, ResponseDecoder};
use irace_stats::stats::endpoints::{
    ColumnarLayout, DecodeMode, DRIVER_SEARCH, LEAGUE_DIRECTORY, RESULTS_ARCHIVE, SERIES_RACE_RESULTS,
};
use irace_stats::RecordValue;
use serde_json::{json, Value};

fn layout(mode: DecodeMode) -> ColumnarLayout {
    match mode {
        DecodeMode::Columnar(layout) => layout,
        other => panic!("not columnar: {other:?}"),
    }
}

/// Envelope of `rows` x `columns` cells, cell value = row * 100 + column
fn grid(rows: usize, columns: usize) -> Value {
    let meta: Vec<Value> = (0..columns).map(|c| json!(format!("col{c}"))).collect();
    let data: Vec<Value> = (0..rows)
        .map(|r| Value::Array((0..columns).map(|c| json!(r * 100 + c)).collect()))
        .collect();
    json!({"m": meta, "d": {"46": rows, "r": data}})
}

#[test]
fn test_record_count_and_keys_match_envelope() {
    let layout = layout(RESULTS_ARCHIVE.decode);

    for (rows, columns) in [(1, 1), (3, 5), (25, 12), (0, 4)] {
        let envelope = grid(rows, columns);
        let page = ResponseDecoder::records_from_envelope(&envelope, &layout, None).unwrap();

        assert_eq!(page.records.len(), rows);
        assert_eq!(page.total, rows as u64);
        for (r, record) in page.records.iter().enumerate() {
            let keys: Vec<&str> = record.keys().collect();
            let expected: Vec<String> = (0..columns).map(|c| format!("col{c}")).collect();
            assert_eq!(keys, expected.iter().map(String::as_str).collect::<Vec<_>>());
            for c in 0..columns {
                assert_eq!(
                    record.get(&format!("col{c}")),
                    Some(&RecordValue::Integer((r * 100 + c) as i64))
                );
            }
        }
    }
}

#[test]
fn test_backend_shaped_results_page() {
    // Positional meta and rows as the results archive returns them.
    let body = r#"{
        "m": {"1": "winnerdisplayname", "2": "start_time", "3": "subsessionid", "4": "finishing_position"},
        "d": {
            "46": 212,
            "r": [
                {"1": "Jane+Doe", "2": 1700000000000, "3": 61234567, "4": 0},
                {"1": "Sam%20Lee", "2": 1700003600000, "3": 61234999, "4": 3}
            ]
        }
    }"#;

    let decoded = ResponseDecoder::decode(body, &RESULTS_ARCHIVE.decode, Some(42), true).unwrap();
    let page = decoded.into_page().unwrap();

    assert_eq!(page.total, 212);
    assert_eq!(page.records.len(), 2);
    assert_eq!(
        page.records[0].get("winnerdisplayname").and_then(RecordValue::as_str),
        Some("Jane Doe")
    );
    assert_eq!(
        page.records[1].get("winnerdisplayname").and_then(RecordValue::as_str),
        Some("Sam Lee")
    );
    assert_eq!(page.records[1].get("finishing_position"), Some(&RecordValue::Integer(3)));
}

// Own-row-first is current backend behaviour and may change.
#[test]
fn test_driver_search_self_row_only_for_session_member() {
    let envelope = json!({
        "m": ["custid", "displayname"],
        "d": {"32": 2, "r": [[42, "Me"], [7, "Kim"], [8, "Lee"]]}
    });
    let layout = layout(DRIVER_SEARCH.decode);

    let own = ResponseDecoder::records_from_envelope(&envelope, &layout, Some(42)).unwrap();
    assert_eq!(own.records.len(), 2);
    assert_eq!(own.total, 2);

    let other = ResponseDecoder::records_from_envelope(&envelope, &layout, Some(7)).unwrap();
    assert_eq!(other.records.len(), 3);

    let anonymous = ResponseDecoder::records_from_envelope(&envelope, &layout, None).unwrap();
    assert_eq!(anonymous.records.len(), 3);
}

#[test]
fn test_direct_rows_without_total() {
    let body = r#"{"m": ["subsessionid", "sizeoffield"], "d": [[1, 20], [2, 19], [3, 18]]}"#;
    let page = ResponseDecoder::decode(body, &SERIES_RACE_RESULTS.decode, None, false)
        .unwrap()
        .into_page()
        .unwrap();
    assert_eq!(page.records.len(), 3);
    assert_eq!(page.total, 3);
}

#[test]
fn test_empty_envelopes() {
    for body in [r#"{"m": [], "d": {}}"#, r#"{"m": ["a"], "d": []}"#, r#"{"d": null}"#, "{}"] {
        let page = ResponseDecoder::decode(body, &LEAGUE_DIRECTORY.decode, None, true)
            .unwrap()
            .into_page()
            .unwrap();
        assert!(page.records.is_empty(), "{body}");
        assert_eq!(page.total, 0, "{body}");
    }
}

#[test]
fn test_ragged_row_reports_position() {
    let envelope = json!({"m": ["a", "b"], "d": {"r": [[1, 2], [3, 4], [5]]}});
    let result = ResponseDecoder::records_from_envelope(&envelope, &ColumnarLayout::nested(), None);
    assert_eq!(
        result.unwrap_err(),
        DecodeError::ArityMismatch {
            row: 2,
            expected: 2,
            actual: 1
        }
    );
}

#[test]
fn test_empty_decoded_matches_mode() {
    assert!(matches!(Decoded::empty(&DecodeMode::Json), Decoded::Json(Value::Null)));
    assert!(matches!(
        Decoded::empty(&RESULTS_ARCHIVE.decode),
        Decoded::Page(ref page) if page.records.is_empty() && page.total == 0
    ));
}
