use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::{Fields, Record, TaskKey, task_fields};

/// Event tag written on every completion audit line.
pub const COMPLETION_EVENT: &str = "completed";

const EVENT_FIELD: &str = "event";
const DATE_FIELD: &str = "date";

/// Immutable copy of a task at the moment it transitioned to `completed`.
///
/// Encoded as one object: `event` and `date` first, followed by the task's own
/// fields in their ledger order. A task field named `event` or `date` is
/// shadowed by the audit header.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionAuditEntry {
    date: String,
    task: Fields,
}

impl CompletionAuditEntry {
    #[must_use]
    pub fn capture(task: &Record, date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            task: task.fields().clone(),
        }
    }

    #[must_use]
    pub fn event(&self) -> &'static str {
        COMPLETION_EVENT
    }

    #[must_use]
    pub fn date(&self) -> &str {
        &self.date
    }

    #[must_use]
    pub fn task(&self) -> &Fields {
        &self.task
    }

    #[must_use]
    pub fn key(&self) -> Option<TaskKey> {
        let repo = self.task.get(task_fields::REPO)?.as_str()?;
        let path = self.task.get(task_fields::PATH)?.as_str()?;
        Some(TaskKey::new(repo, path))
    }

    #[must_use]
    pub fn to_record(&self) -> Record {
        let mut fields = Fields::new();
        fields.insert(EVENT_FIELD.to_string(), Value::from(COMPLETION_EVENT));
        fields.insert(DATE_FIELD.to_string(), Value::from(self.date.clone()));
        for (key, value) in &self.task {
            if key != EVENT_FIELD && key != DATE_FIELD {
                fields.insert(key.clone(), value.clone());
            }
        }
        Record::new(fields)
    }
}

impl Serialize for CompletionAuditEntry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_record().serialize(serializer)
    }
}
