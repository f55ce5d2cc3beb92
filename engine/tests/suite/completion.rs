//! Task completion through the `Ledger` facade.

use chrono::{Local, SecondsFormat, TimeZone, Utc};
use serde_json::json;

use ledger_engine::{
    CompletionRequest, DecodeRecovery, EngineError, Ledger, RevisionId, StoreError, TaskKey,
    TransitionError, VcsReport,
};

use crate::common::{Call, DOMAIN, FakeVcs, Fixture};

const TASKS: &[&str] = &[
    r#"{"repo":"r","path":"a.md","status":"completed","commit_id":"old"}"#,
    r#"{"repo":"r","path":"a.md","status":"todo","priority":1}"#,
    r#"{"repo":"r","path":"b.md","status":"todo"}"#,
    r#"{"repo":"r","path":"a.md","status":"todo","priority":2}"#,
];

fn request() -> CompletionRequest {
    CompletionRequest {
        actor: Some("alice".to_string()),
        notes: Some("reviewed".to_string()),
        revision: Some(RevisionId::new("abc1234").expect("revision")),
        commit: true,
        at: Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single(),
    }
}

#[test]
fn completes_first_open_task_and_appends_audit_line() {
    let fixture = Fixture::with_ledger(TASKS);
    let ledger = Ledger::new(fixture.config.clone());
    let key = TaskKey::new("r", "a.md");

    let outcome = ledger
        .complete_task(DOMAIN, &key, request())
        .expect("complete");

    assert!(matches!(outcome.vcs, VcsReport::Skipped));
    assert_eq!(outcome.revision.as_str(), "abc1234");
    assert!(outcome.diagnostics.is_empty());

    let text = fixture.ledger_text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    // Untouched records are byte-identical.
    assert_eq!(lines[0], TASKS[0]);
    assert_eq!(lines[2], TASKS[2]);
    assert_eq!(lines[3], TASKS[3]);
    assert_eq!(
        fixture.ledger_values()[1],
        json!({
            "repo": "r", "path": "a.md", "status": "completed", "priority": 1,
            "completed_date": "2024-05-01", "commit_id": "abc1234",
            "actor": "alice", "notes": "reviewed"
        })
    );

    let at = request().at.expect("local time");
    let log = fixture.log_values();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["event"], json!("completed"));
    assert_eq!(
        log[0]["date"],
        json!(at.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true))
    );
    assert_eq!(log[0]["path"], json!("a.md"));
    assert_eq!(log[0]["priority"], json!(1));
    assert_eq!(log[0]["commit_id"], json!("abc1234"));
}

#[test]
fn repeated_completion_walks_duplicates_in_order() {
    let fixture = Fixture::with_ledger(TASKS);
    let ledger = Ledger::new(fixture.config.clone());
    let key = TaskKey::new("r", "a.md");

    ledger.complete_task(DOMAIN, &key, request()).expect("first");
    ledger.complete_task(DOMAIN, &key, request()).expect("second");

    let values = fixture.ledger_values();
    assert_eq!(values[1]["status"], json!("completed"));
    assert_eq!(values[3]["status"], json!("completed"));
    assert_eq!(values[2]["status"], json!("todo"));

    let log = fixture.log_values();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0]["priority"], json!(1));
    assert_eq!(log[1]["priority"], json!(2));

    let err = ledger
        .complete_task(DOMAIN, &key, request())
        .expect_err("nothing open");
    assert!(err.is_not_found());
}

#[test]
fn not_found_changes_nothing_on_disk() {
    let fixture = Fixture::with_ledger(TASKS);
    let before = fixture.ledger_text();
    let vcs = FakeVcs::at_head("1111111");
    let ledger = Ledger::new(fixture.config.clone()).with_vcs(vcs.clone());

    let err = ledger
        .complete_task(DOMAIN, &TaskKey::new("r", "missing.md"), request())
        .expect_err("missing");

    assert!(matches!(
        err,
        EngineError::Transition(TransitionError::NotFound { .. })
    ));
    assert!(err.is_not_found());
    assert_eq!(fixture.ledger_text(), before);
    assert!(!fixture.log_path().exists());
    assert!(vcs.calls().is_empty());
}

#[test]
fn unknown_domain_is_reported() {
    let fixture = Fixture::with_ledger(TASKS);
    let ledger = Ledger::new(fixture.config.clone());
    let err = ledger
        .complete_task("nope", &TaskKey::new("r", "a.md"), request())
        .expect_err("unknown");
    assert!(matches!(err, EngineError::UnknownDomain(ref name) if name == "nope"));
    assert!(!err.is_not_found());
}

#[test]
fn defaults_and_head_revision_apply_when_unset() {
    let mut fixture = Fixture::with_ledger(TASKS);
    fixture.config.tasks.default_actor = "bot".to_string();
    fixture.config.tasks.default_notes = "auto".to_string();
    let vcs = FakeVcs::at_head("9f8e7d6");
    let ledger = Ledger::new(fixture.config.clone()).with_vcs(vcs.clone());

    let outcome = ledger
        .complete_task(
            DOMAIN,
            &TaskKey::new("r", "b.md"),
            CompletionRequest {
                commit: false,
                ..CompletionRequest::default()
            },
        )
        .expect("complete");

    assert_eq!(outcome.revision.as_str(), "9f8e7d6");
    assert!(matches!(outcome.vcs, VcsReport::Skipped));
    let task = &fixture.ledger_values()[2];
    assert_eq!(task["commit_id"], json!("9f8e7d6"));
    assert_eq!(task["actor"], json!("bot"));
    assert_eq!(task["notes"], json!("auto"));
    assert_eq!(vcs.calls(), vec![Call::Head(fixture.dir.path().to_path_buf())]);
}

#[test]
fn head_failure_stamps_uncommitted() {
    let fixture = Fixture::with_ledger(TASKS);
    let ledger = Ledger::new(fixture.config.clone()).with_vcs(FakeVcs::default());

    let outcome = ledger
        .complete_task(
            DOMAIN,
            &TaskKey::new("r", "b.md"),
            CompletionRequest {
                commit: false,
                ..CompletionRequest::default()
            },
        )
        .expect("complete");
    assert_eq!(outcome.revision.as_str(), RevisionId::UNCOMMITTED);
}

#[test]
fn commits_both_files_and_pushes_when_configured() {
    let mut fixture = Fixture::with_ledger(TASKS);
    fixture.config.vcs.push = true;
    fixture.config.vcs.remote = "upstream".to_string();
    let vcs = FakeVcs::at_head("1111111");
    let ledger = Ledger::new(fixture.config.clone()).with_vcs(vcs.clone());

    let outcome = ledger
        .complete_task(DOMAIN, &TaskKey::new("r", "a.md"), request())
        .expect("complete");

    match &outcome.vcs {
        VcsReport::Committed { revision, pushed } => {
            assert_eq!(revision.as_str(), "c0ffee1");
            assert!(pushed);
        }
        other => panic!("expected commit, got {other:?}"),
    }
    assert!(!outcome.vcs.is_failure());

    let repo = fixture.dir.path().to_path_buf();
    assert_eq!(
        vcs.calls(),
        vec![
            Call::Commit {
                repo: repo.clone(),
                paths: vec![
                    fixture.ledger_path().to_path_buf(),
                    fixture.log_path().to_path_buf()
                ],
                message: "ledger(docs): complete r:a.md".to_string(),
            },
            Call::Push {
                repo,
                remote: "upstream".to_string(),
            },
        ]
    );
}

#[test]
fn vcs_failures_never_roll_back_the_ledger() {
    let fixture = Fixture::with_ledger(TASKS);
    let vcs = FakeVcs {
        fail_commit: true,
        ..FakeVcs::default()
    };
    let ledger = Ledger::new(fixture.config.clone()).with_vcs(vcs);

    let outcome = ledger
        .complete_task(DOMAIN, &TaskKey::new("r", "a.md"), request())
        .expect("ledger update succeeds");

    assert!(matches!(outcome.vcs, VcsReport::CommitFailed(_)));
    assert!(outcome.vcs.is_failure());
    assert_eq!(fixture.ledger_values()[1]["status"], json!("completed"));
    assert_eq!(fixture.log_values().len(), 1);
}

#[test]
fn push_failure_keeps_commit_revision() {
    let mut fixture = Fixture::with_ledger(TASKS);
    fixture.config.vcs.push = true;
    let vcs = FakeVcs {
        fail_push: true,
        ..FakeVcs::at_head("1111111")
    };
    let ledger = Ledger::new(fixture.config.clone()).with_vcs(vcs);

    let outcome = ledger
        .complete_task(DOMAIN, &TaskKey::new("r", "a.md"), request())
        .expect("complete");

    match outcome.vcs {
        VcsReport::PushFailed { revision, .. } => assert_eq!(revision.as_str(), "c0ffee1"),
        other => panic!("expected push failure, got {other:?}"),
    }
}

#[test]
fn pending_tasks_lists_open_keys() {
    let fixture = Fixture::with_ledger(TASKS);
    let ledger = Ledger::new(fixture.config.clone());

    assert_eq!(
        ledger.pending_tasks(DOMAIN).expect("pending"),
        vec![
            TaskKey::new("r", "a.md"),
            TaskKey::new("r", "b.md"),
            TaskKey::new("r", "a.md"),
        ]
    );
}

#[test]
fn malformed_lines_surface_as_diagnostics() {
    let fixture = Fixture::with_ledger(&[TASKS[1], "{\"repo\": oops}", TASKS[2]]);
    let mut config = fixture.config.clone();
    config.decode.recovery = DecodeRecovery::SkipLine;
    config.decode.drop_malformed = true;
    let ledger = Ledger::new(config);

    let outcome = ledger
        .complete_task(DOMAIN, &TaskKey::new("r", "b.md"), request())
        .expect("complete");

    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].line, 2);
    let values = fixture.ledger_values();
    assert_eq!(values.len(), 2);
    assert_eq!(values[1]["status"], json!("completed"));
}

#[test]
fn halted_load_refuses_rewrite_that_would_drop_later_records() {
    let fixture = Fixture::with_ledger(&[
        r#"{"repo":"r","path":"a","status":"todo"}"#,
        r#"{"status":}"#,
        r#"{"repo":"r","path":"c","status":"todo"}"#,
        r#"{"repo":"r","path":"d","status":"todo"}"#,
    ]);
    let before = fixture.ledger_text();
    let vcs = FakeVcs::at_head("1111111");
    let ledger = Ledger::new(fixture.config.clone()).with_vcs(vcs.clone());

    let err = ledger
        .complete_task(DOMAIN, &TaskKey::new("r", "a"), request())
        .expect_err("lossy rewrite");

    assert!(matches!(
        err,
        EngineError::Store(StoreError::Malformed { count: 1, line: 2, .. })
    ));
    assert!(!err.is_not_found());
    assert_eq!(fixture.ledger_text(), before);
    assert!(!fixture.log_path().exists());
    assert!(vcs.calls().is_empty());

    // Reads still work on what decoded.
    let pending = ledger.pending_tasks(DOMAIN).expect("pending");
    assert_eq!(pending, vec![TaskKey::new("r", "a")]);
}
