use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use ledger_types::CompletionAuditEntry;

use crate::AuditError;

/// Serializes appends within this process so concurrent completions never
/// interleave partial lines.
static APPEND_LOCK: Mutex<()> = Mutex::new(());

/// Append-only NDJSON log of completion events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionLog {
    path: PathBuf,
}

impl CompletionLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line. The file (and its parent
    /// directory) is created on first use; earlier lines are never touched.
    pub fn append(&self, entry: &CompletionAuditEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = APPEND_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let io_err = |source| AuditError::Append {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;

        debug!(path = %self.path.display(), date = entry.date(), "Appended completion entry");
        Ok(())
    }
}
