//! Snapshot compaction and history collapse.

use std::fs;

use serde_json::json;

use ledger_engine::{Confirm, Ledger, LedgerConfig};

use crate::common::{parse_lines, write_lines};

#[test]
fn compaction_dedups_dates_and_entities_then_rebuilds_totals() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("traffic.jsonl");
    write_lines(
        &path,
        &[
            r#"{"date":"2024-01-02","timestamp":"2024-01-02T08:00:00Z","entities":{"x":{"views":1}}}"#,
            r#"{"date":"2024-01-01","timestamp":"2024-01-01T00:00:00Z","entities":{"x":{"views":100}}}"#,
            r#"{"date":"2024-01-01","timestamp":"2024-01-01T12:00:00Z","entities":{"x":{"views":5},"y":{"views":1},"x":{"views":9}},"totals":{"views":15}}"#,
        ],
    );
    let ledger = Ledger::new(LedgerConfig::default());

    let outcome = ledger.compact_snapshots(&path).expect("compact");

    assert!(outcome.written);
    assert!(outcome.diagnostics.is_empty());
    let report = &outcome.report;
    assert_eq!(report.records_in, 3);
    assert_eq!(report.records_out, 2);
    assert_eq!(report.superseded.len(), 1);
    assert_eq!(report.entity_discards.len(), 1);
    assert_eq!(report.entity_discards[0].discarded, 1);

    let values = parse_lines(&fs::read_to_string(&path).expect("read"));
    assert_eq!(values.len(), 2);
    assert_eq!(values[0]["date"], json!("2024-01-01"));
    assert_eq!(values[0]["timestamp"], json!("2024-01-01T12:00:00Z"));
    assert_eq!(
        values[0]["entities"],
        json!({"x": {"views": 5}, "y": {"views": 1}})
    );
    assert_eq!(values[0]["totals"]["views"], json!(6));
    assert_eq!(values[0]["totals"]["entities_count"], json!(2));
    assert_eq!(values[1]["date"], json!("2024-01-02"));
    assert_eq!(values[1]["totals"]["views"], json!(1));
}

#[test]
fn compacting_twice_leaves_the_file_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("traffic.jsonl");
    write_lines(
        &path,
        &[
            r#"{"date":"2024-01-01","timestamp":"a","entities":{"x":{"views":2,"stars":1}}}"#,
            r#"{"date":"2024-01-01","timestamp":"b","entities":{"x":{"views":3}}}"#,
        ],
    );
    let ledger = Ledger::new(LedgerConfig::default());

    assert!(ledger.compact_snapshots(&path).expect("first").written);
    let once = fs::read_to_string(&path).expect("read");

    let again = ledger.compact_snapshots(&path).expect("second");
    assert!(!again.written);
    assert!(again.report.is_noop());
    assert_eq!(fs::read_to_string(&path).expect("read"), once);
}

#[test]
fn records_without_entities_pass_through() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("misc.jsonl");
    let lines = [
        r#"{"date":"2024-01-01","note":"no entities here"}"#,
        r#"{"date":"2024-01-02","note":"nor here"}"#,
    ];
    write_lines(&path, &lines);
    let before = fs::read_to_string(&path).expect("read");

    let outcome = Ledger::new(LedgerConfig::default())
        .compact_snapshots(&path)
        .expect("compact");

    assert!(!outcome.written);
    assert_eq!(fs::read_to_string(&path).expect("read"), before);
}

#[test]
fn custom_layout_from_config_is_honored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stars.jsonl");
    write_lines(
        &path,
        &[r#"{"day":"2024-03-01","repos":{"a":{"stars":2},"b":{"stars":3}}}"#],
    );
    let mut config = LedgerConfig::default();
    config.snapshot.date_field = "day".to_string();
    config.snapshot.entities_field = "repos".to_string();
    config.snapshot.counters = vec!["stars".to_string()];

    Ledger::new(config).compact_snapshots(&path).expect("compact");

    let values = parse_lines(&fs::read_to_string(&path).expect("read"));
    assert_eq!(
        values[0]["totals"],
        json!({"stars": 5, "entities_count": 2})
    );
}

#[test]
fn collapse_keeps_only_the_latest_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("traffic.jsonl");
    write_lines(
        &path,
        &[
            r#"{"date":"2024-01-03","timestamp":"t","entities":{}}"#,
            r#"{"date":"2024-01-05","timestamp":"t","entities":{}}"#,
            r#"{"date":"2024-01-04","timestamp":"t","entities":{}}"#,
        ],
    );

    let outcome = Ledger::new(LedgerConfig::default())
        .collapse_snapshot_history(&path, Confirm::Destructive)
        .expect("collapse");

    assert_eq!(outcome.kept, 1);
    assert_eq!(outcome.dropped, 2);
    assert!(outcome.written);
    let values = parse_lines(&fs::read_to_string(&path).expect("read"));
    assert_eq!(values.len(), 1);
    assert_eq!(values[0]["date"], json!("2024-01-05"));
}

#[test]
fn missing_ledger_is_a_store_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = Ledger::new(LedgerConfig::default())
        .compact_snapshots(dir.path().join("absent.jsonl"))
        .expect_err("missing");
    assert!(matches!(err, ledger_engine::EngineError::Store(_)));
    assert!(!err.is_not_found());
}

#[test]
fn compaction_of_malformed_ledger_needs_explicit_drop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("traffic.jsonl");
    write_lines(
        &path,
        &[
            r#"{"date":"2024-01-01","timestamp":"a","entities":{"x":{"views":2}}}"#,
            r#"{"date":}"#,
            r#"{"date":"2024-01-02","timestamp":"b","entities":{"x":{"views":3}}}"#,
        ],
    );
    let before = fs::read_to_string(&path).expect("read");

    let err = Ledger::new(LedgerConfig::default())
        .compact_snapshots(&path)
        .expect_err("malformed");
    assert!(matches!(
        err,
        ledger_engine::EngineError::Store(ledger_engine::StoreError::Malformed { .. })
    ));
    assert_eq!(fs::read_to_string(&path).expect("read"), before);

    let mut config = LedgerConfig::default();
    config.decode.drop_malformed = true;
    let outcome = Ledger::new(config).compact_snapshots(&path).expect("compact");
    assert!(outcome.written);
    assert_eq!(outcome.diagnostics.len(), 1);
    let values = parse_lines(&fs::read_to_string(&path).expect("read"));
    assert_eq!(values.len(), 1);
    assert_eq!(values[0]["date"], json!("2024-01-01"));
}
