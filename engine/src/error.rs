use std::io;
use std::time::Duration;

use thiserror::Error;

use ledger_core::TransitionError;
use ledger_store::{AuditError, StoreError};

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("git executable not found in PATH")]
    BinaryNotFound,
    #[error("failed to run `git {command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`git {command}` timed out after {} ms", timeout.as_millis())]
    TimedOut { command: String, timeout: Duration },
    #[error("`git {command}` failed ({}): {stderr}", exit_label(*code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: Option<i32>) -> String {
    code.map_or_else(|| "killed by signal".to_string(), |code| format!("exit {code}"))
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown ledger domain `{0}`")]
    UnknownDomain(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The ledger was already saved when this happened.
    #[error("ledger updated but completion log append failed: {0}")]
    Audit(#[from] AuditError),
}

impl EngineError {
    /// No open task matched the requested key. An unknown domain is a
    /// configuration problem and does not count.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Transition(TransitionError::NotFound { .. }))
    }
}
