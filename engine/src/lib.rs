//! Ledger orchestration.
//!
//! [`Ledger`] is the one place where configuration, the file stores, and the
//! version-control collaborator meet. Each operation is a straight line:
//! load, run a pure `ledger-core` pass, write back, then report.

mod error;
mod ledger;
mod vcs;

pub use error::{EngineError, VcsError};
pub use ledger::{
    CollapseOutcome, CompactionOutcome, CompletionOutcome, CompletionRequest, Confirm, Ledger,
    VcsReport,
};
pub use vcs::{GitCli, VersionControl};

pub use ledger_config::{ConfigError, DomainConfig, LedgerConfig};
pub use ledger_core::{CompactionReport, DecodeDiagnostic, DecodeRecovery, TransitionError};
pub use ledger_store::{AuditError, StoreError};
pub use ledger_types::{CompletionAuditEntry, RevisionId, TaskKey};
