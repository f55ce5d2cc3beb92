use std::fmt;

use crate::{EmptyStringError, NonEmptyString};

/// Opaque revision identifier handed out by the version-control collaborator.
///
/// The ledger never interprets it beyond "non-empty string"; it is stored
/// verbatim in a completed task's `commit_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RevisionId(NonEmptyString);

impl RevisionId {
    /// Placeholder used when a task completes without any revision available.
    pub const UNCOMMITTED: &'static str = "uncommitted";

    pub fn new(id: impl Into<String>) -> Result<Self, EmptyStringError> {
        NonEmptyString::new(id.into().trim().to_string()).map(Self)
    }

    #[must_use]
    pub fn uncommitted() -> Self {
        Self(NonEmptyString(Self::UNCOMMITTED.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
