use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Record;

/// Field names of a task record.
pub mod task_fields {
    pub const REPO: &str = "repo";
    pub const PATH: &str = "path";
    pub const STATUS: &str = "status";
    pub const COMPLETED_DATE: &str = "completed_date";
    pub const COMMIT_ID: &str = "commit_id";
    pub const ACTOR: &str = "actor";
    pub const NOTES: &str = "notes";
}

/// Composite `(repo, path)` key identifying a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    pub repo: String,
    pub path: String,
}

impl TaskKey {
    #[must_use]
    pub fn new(repo: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            path: path.into(),
        }
    }

    /// The key of a record, if it carries string `repo` and `path` fields.
    #[must_use]
    pub fn of(record: &Record) -> Option<Self> {
        let repo = record.get_str(task_fields::REPO)?;
        let path = record.get_str(task_fields::PATH)?;
        Some(Self::new(repo, path))
    }

    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        record.get_str(task_fields::REPO) == Some(self.repo.as_str())
            && record.get_str(task_fields::PATH) == Some(self.path.as_str())
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repo, self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    Completed,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Completed => "completed",
        }
    }

    /// Exact match only; anything else is not a status this engine owns.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "todo" => Some(TaskStatus::Todo),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }

    #[must_use]
    pub fn of(record: &Record) -> Option<Self> {
        record.get_str(task_fields::STATUS).and_then(Self::parse)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
