//! The `todo → completed` task transition.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use thiserror::Error;
use tracing::info;

use ledger_types::{
    CompletionAuditEntry, Record, RevisionId, TaskKey, TaskStatus, task_fields,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// No record with this key is still `todo`. A caller error; retrying
    /// the same key will not help.
    #[error("no open task for {key}")]
    NotFound { key: TaskKey },
}

/// Everything written onto a task when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionStamp {
    pub completed_date: NaiveDate,
    /// Capture instant recorded on the audit entry.
    pub captured_at: DateTime<Utc>,
    pub revision: RevisionId,
    pub actor: String,
    pub notes: String,
}

/// Index of the first record with `key` whose status is `todo`.
#[must_use]
pub fn find_open(records: &[Record], key: &TaskKey) -> Option<usize> {
    records
        .iter()
        .position(|record| key.matches(record) && TaskStatus::of(record) == Some(TaskStatus::Todo))
}

/// Keys of every `todo` record, in ledger order.
#[must_use]
pub fn open_tasks(records: &[Record]) -> Vec<TaskKey> {
    records
        .iter()
        .filter(|record| TaskStatus::of(record) == Some(TaskStatus::Todo))
        .filter_map(TaskKey::of)
        .collect()
}

/// Complete the first open task matching `key`.
///
/// Returns a copy of `records` with exactly that one record changed, plus the
/// audit entry capturing it. Later records sharing the key stay `todo`, so
/// repeated work items for one path complete in ledger order. The input is
/// never modified.
pub fn complete(
    records: &[Record],
    key: &TaskKey,
    stamp: &CompletionStamp,
) -> Result<(Vec<Record>, CompletionAuditEntry), TransitionError> {
    let index = find_open(records, key).ok_or_else(|| TransitionError::NotFound { key: key.clone() })?;

    let mut updated = records.to_vec();
    let task = &mut updated[index];
    task.insert(task_fields::STATUS, TaskStatus::Completed.as_str());
    task.insert(
        task_fields::COMPLETED_DATE,
        stamp.completed_date.format("%Y-%m-%d").to_string(),
    );
    task.insert(task_fields::COMMIT_ID, stamp.revision.as_str());
    task.insert(task_fields::ACTOR, stamp.actor.as_str());
    task.insert(task_fields::NOTES, stamp.notes.as_str());

    let entry = CompletionAuditEntry::capture(
        task,
        stamp.captured_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    info!(
        task = %key,
        index,
        commit_id = %stamp.revision,
        "Completed task"
    );
    Ok((updated, entry))
}
