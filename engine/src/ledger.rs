use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use tracing::{info, warn};

use ledger_config::{DomainConfig, LedgerConfig};
use ledger_core::{
    CompactionReport, CompletionStamp, DecodeDiagnostic, collapse_to_latest, complete,
    open_tasks,
};
use ledger_store::{CompletionLog, RecordStore};
use ledger_types::{CompletionAuditEntry, RevisionId, TaskKey};

use crate::{EngineError, GitCli, VcsError, VersionControl};

/// Explicit acknowledgement for operations that discard history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    Destructive,
}

/// Caller-supplied parts of a completion. Unset fields fall back to the
/// configured task defaults.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub actor: Option<String>,
    pub notes: Option<String>,
    pub revision: Option<RevisionId>,
    /// Commit the ledger files afterwards (when a VCS is configured).
    pub commit: bool,
    /// Completion instant; the current time when unset.
    pub at: Option<DateTime<Local>>,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            actor: None,
            notes: None,
            revision: None,
            commit: true,
            at: None,
        }
    }
}

/// What happened on the version-control side after a completion.
///
/// A failure here never undoes the ledger update.
#[derive(Debug)]
pub enum VcsReport {
    /// No VCS configured, or the caller asked not to commit.
    Skipped,
    Committed { revision: RevisionId, pushed: bool },
    CommitFailed(VcsError),
    PushFailed {
        revision: RevisionId,
        error: VcsError,
    },
}

impl VcsReport {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::CommitFailed(_) | Self::PushFailed { .. })
    }
}

impl fmt::Display for VcsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => f.write_str("not committed"),
            Self::Committed {
                revision,
                pushed: true,
            } => write!(f, "committed {revision} and pushed"),
            Self::Committed { revision, .. } => write!(f, "committed {revision}"),
            Self::CommitFailed(error) => write!(f, "commit failed: {error}"),
            Self::PushFailed { revision, error } => {
                write!(f, "committed {revision}, push failed: {error}")
            }
        }
    }
}

#[derive(Debug)]
pub struct CompletionOutcome {
    pub entry: CompletionAuditEntry,
    /// Revision stamped into the task's `commit_id`.
    pub revision: RevisionId,
    pub vcs: VcsReport,
    pub diagnostics: Vec<DecodeDiagnostic>,
}

#[derive(Debug)]
pub struct CompactionOutcome {
    pub report: CompactionReport,
    /// Whether the file was rewritten.
    pub written: bool,
    pub diagnostics: Vec<DecodeDiagnostic>,
}

#[derive(Debug)]
pub struct CollapseOutcome {
    pub kept: usize,
    pub dropped: usize,
    pub written: bool,
    pub diagnostics: Vec<DecodeDiagnostic>,
}

/// Entry point tying configuration, file stores, and the VCS together.
pub struct Ledger {
    config: LedgerConfig,
    vcs: Option<Box<dyn VersionControl>>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .field("vcs", &self.vcs.is_some())
            .finish()
    }
}

impl Ledger {
    /// Build from configuration. A `git` collaborator is attached when
    /// `[vcs] enabled = true`.
    #[must_use]
    pub fn new(config: LedgerConfig) -> Self {
        let vcs: Option<Box<dyn VersionControl>> = if config.vcs.enabled {
            Some(Box::new(GitCli::new(config.vcs.timeout())))
        } else {
            None
        };
        Self { config, vcs }
    }

    #[must_use]
    pub fn with_vcs(mut self, vcs: impl VersionControl + 'static) -> Self {
        self.vcs = Some(Box::new(vcs));
        self
    }

    #[must_use]
    pub fn without_vcs(mut self) -> Self {
        self.vcs = None;
        self
    }

    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn domain(&self, name: &str) -> Result<&DomainConfig, EngineError> {
        self.config
            .domain(name)
            .ok_or_else(|| EngineError::UnknownDomain(name.to_string()))
    }

    fn load(&self, path: &Path) -> Result<RecordStore, EngineError> {
        let mut store = RecordStore::load(path, self.config.decode.recovery)?;
        if store.diagnostics().is_empty() {
            return Ok(store);
        }
        if self.config.decode.drop_malformed {
            warn!(
                path = %path.display(),
                count = store.diagnostics().len(),
                "Ledger has malformed content; it will be dropped on rewrite"
            );
            store.drop_malformed();
        } else {
            warn!(
                path = %path.display(),
                count = store.diagnostics().len(),
                "Ledger has malformed content; rewrites are refused"
            );
        }
        Ok(store)
    }

    /// Dedup snapshots by date, drop repeated entity blocks, rebuild totals.
    /// The file is rewritten only when that changes its content.
    pub fn compact_snapshots(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<CompactionOutcome, EngineError> {
        let path = path.as_ref();
        let mut store = self.load(path)?;
        let diagnostics = store.diagnostics().to_vec();

        let compaction =
            ledger_core::compact_snapshots(store.take_records(), &self.config.snapshot);
        store.replace_records(compaction.records);
        let written = store.save_if_modified()?;

        let report = compaction.report;
        info!(
            path = %path.display(),
            records_in = report.records_in,
            records_out = report.records_out,
            superseded = report.superseded.len(),
            totals_rewritten = report.totals_rewritten,
            written,
            "Compacted snapshots"
        );
        Ok(CompactionOutcome {
            report,
            written,
            diagnostics,
        })
    }

    /// Keep only the latest snapshot in `path`, dropping all history.
    pub fn collapse_snapshot_history(
        &self,
        path: impl AsRef<Path>,
        confirm: Confirm,
    ) -> Result<CollapseOutcome, EngineError> {
        let Confirm::Destructive = confirm;
        let path = path.as_ref();
        let mut store = self.load(path)?;
        let diagnostics = store.diagnostics().to_vec();

        let (kept, dropped) = collapse_to_latest(store.take_records(), &self.config.snapshot);
        let kept_len = kept.len();
        store.replace_records(kept);
        let written = store.save_if_modified()?;

        warn!(path = %path.display(), dropped, "Collapsed snapshot history");
        Ok(CollapseOutcome {
            kept: kept_len,
            dropped,
            written,
            diagnostics,
        })
    }

    /// Open task keys in the domain's ledger, in file order.
    pub fn pending_tasks(&self, domain: &str) -> Result<Vec<TaskKey>, EngineError> {
        let domain = self.domain(domain)?;
        let store = self.load(&domain.ledger)?;
        Ok(open_tasks(store.records()))
    }

    /// Complete the first open task matching `key`.
    ///
    /// Order: rewrite the ledger, append the audit entry, then commit both
    /// files. A ledger write failure leaves both files untouched, as does a
    /// ledger with malformed content unless `[decode] drop_malformed` is set.
    /// An audit failure is returned with the ledger already updated. VCS
    /// problems are reported in the outcome and never returned as errors.
    pub fn complete_task(
        &self,
        domain: &str,
        key: &TaskKey,
        request: CompletionRequest,
    ) -> Result<CompletionOutcome, EngineError> {
        let domain = self.domain(domain)?;
        let mut store = self.load(&domain.ledger)?;
        let diagnostics = store.diagnostics().to_vec();
        let repo_dir = self.repo_dir(domain);

        let revision = match request.revision {
            Some(revision) => revision,
            None => self.current_revision(&repo_dir),
        };
        let at = request.at.unwrap_or_else(Local::now);
        let stamp = CompletionStamp {
            completed_date: at.date_naive(),
            captured_at: at.with_timezone(&Utc),
            revision: revision.clone(),
            actor: request
                .actor
                .unwrap_or_else(|| self.config.tasks.default_actor.clone()),
            notes: request
                .notes
                .unwrap_or_else(|| self.config.tasks.default_notes.clone()),
        };

        let (updated, entry) = complete(store.records(), key, &stamp)?;
        store.replace_records(updated);
        store.save()?;
        CompletionLog::new(&domain.completion_log).append(&entry)?;

        let vcs = if request.commit {
            self.commit_domain(domain, &repo_dir, key)
        } else {
            VcsReport::Skipped
        };
        if vcs.is_failure() {
            warn!(domain = %domain.name, task = %key, report = %vcs, "Ledger updated; VCS step failed");
        }

        Ok(CompletionOutcome {
            entry,
            revision,
            vcs,
            diagnostics,
        })
    }

    fn repo_dir(&self, domain: &DomainConfig) -> PathBuf {
        if let Some(dir) = &self.config.vcs.repo_dir {
            return dir.clone();
        }
        match domain.ledger.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn current_revision(&self, repo_dir: &Path) -> RevisionId {
        let Some(vcs) = &self.vcs else {
            return RevisionId::uncommitted();
        };
        match vcs.head(repo_dir) {
            Ok(revision) => revision,
            Err(error) => {
                warn!(repo = %repo_dir.display(), %error, "No HEAD revision; stamping as uncommitted");
                RevisionId::uncommitted()
            }
        }
    }

    fn commit_domain(&self, domain: &DomainConfig, repo_dir: &Path, key: &TaskKey) -> VcsReport {
        let Some(vcs) = &self.vcs else {
            return VcsReport::Skipped;
        };
        let paths = [domain.ledger.clone(), domain.completion_log.clone()];
        let message = format!("ledger({}): complete {key}", domain.name);

        let revision = match vcs.commit(repo_dir, &paths, &message) {
            Ok(revision) => revision,
            Err(error) => return VcsReport::CommitFailed(error),
        };
        info!(domain = %domain.name, %revision, "Committed ledger update");

        if !self.config.vcs.push {
            return VcsReport::Committed {
                revision,
                pushed: false,
            };
        }
        match vcs.push(repo_dir, &self.config.vcs.remote) {
            Ok(()) => VcsReport::Committed {
                revision,
                pushed: true,
            },
            Err(error) => VcsReport::PushFailed { revision, error },
        }
    }
}
