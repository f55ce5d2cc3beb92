//! Shared fixtures: a temp ledger domain and a scripted VCS.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ledger_engine::{DomainConfig, LedgerConfig, RevisionId, VcsError, VersionControl};

pub const DOMAIN: &str = "docs";

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub config: LedgerConfig,
}

impl Fixture {
    /// A `docs` domain whose ledger holds `lines`, one per line.
    pub fn with_ledger(lines: &[&str]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = dir.path().join("docs.jsonl");
        write_lines(&ledger, lines);

        let mut config = LedgerConfig::default();
        config.domains.push(DomainConfig {
            name: DOMAIN.to_string(),
            ledger,
            completion_log: dir.path().join("audit").join("docs-completed.jsonl"),
        });
        Self { dir, config }
    }

    pub fn ledger_path(&self) -> &Path {
        &self.config.domains[0].ledger
    }

    pub fn log_path(&self) -> &Path {
        &self.config.domains[0].completion_log
    }

    pub fn ledger_text(&self) -> String {
        fs::read_to_string(self.ledger_path()).expect("read ledger")
    }

    pub fn ledger_values(&self) -> Vec<serde_json::Value> {
        parse_lines(&self.ledger_text())
    }

    pub fn log_values(&self) -> Vec<serde_json::Value> {
        parse_lines(&fs::read_to_string(self.log_path()).expect("read log"))
    }
}

pub fn write_lines(path: &Path, lines: &[&str]) {
    let mut text = lines.join("\n");
    if !lines.is_empty() {
        text.push('\n');
    }
    fs::write(path, text).expect("write ledger");
}

pub fn parse_lines(text: &str) -> Vec<serde_json::Value> {
    text.lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Head(PathBuf),
    Commit {
        repo: PathBuf,
        paths: Vec<PathBuf>,
        message: String,
    },
    Push {
        repo: PathBuf,
        remote: String,
    },
}

/// Records every call; commit and push outcomes are scripted.
#[derive(Debug, Clone, Default)]
pub struct FakeVcs {
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub head: Option<String>,
    pub fail_commit: bool,
    pub fail_push: bool,
}

impl FakeVcs {
    pub fn at_head(head: &str) -> Self {
        Self {
            head: Some(head.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls").push(call);
    }

    fn failed(command: &str) -> VcsError {
        VcsError::Failed {
            command: command.to_string(),
            code: Some(1),
            stderr: "scripted failure".to_string(),
        }
    }
}

impl VersionControl for FakeVcs {
    fn head(&self, repo: &Path) -> Result<RevisionId, VcsError> {
        self.record(Call::Head(repo.to_path_buf()));
        match &self.head {
            Some(head) => Ok(RevisionId::new(head.clone()).expect("revision")),
            None => Err(Self::failed("rev-parse")),
        }
    }

    fn commit(
        &self,
        repo: &Path,
        paths: &[PathBuf],
        message: &str,
    ) -> Result<RevisionId, VcsError> {
        self.record(Call::Commit {
            repo: repo.to_path_buf(),
            paths: paths.to_vec(),
            message: message.to_string(),
        });
        if self.fail_commit {
            return Err(Self::failed("commit"));
        }
        Ok(RevisionId::new("c0ffee1").expect("revision"))
    }

    fn push(&self, repo: &Path, remote: &str) -> Result<(), VcsError> {
        self.record(Call::Push {
            repo: repo.to_path_buf(),
            remote: remote.to_string(),
        });
        if self.fail_push {
            return Err(Self::failed("push"));
        }
        Ok(())
    }
}
