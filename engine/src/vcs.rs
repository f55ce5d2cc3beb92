//! Version-control collaborator.
//!
//! The ledger only needs three things from a VCS: the current revision, a
//! commit of specific files, and a push. [`GitCli`] provides them by running
//! the `git` binary with hooks disabled and a hard per-command timeout.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use ledger_types::RevisionId;

use crate::VcsError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub trait VersionControl {
    /// Current `HEAD` revision of the working tree at `repo`.
    fn head(&self, repo: &Path) -> Result<RevisionId, VcsError>;

    /// Stage exactly `paths` and commit them. Returns the new revision.
    fn commit(&self, repo: &Path, paths: &[PathBuf], message: &str)
    -> Result<RevisionId, VcsError>;

    fn push(&self, repo: &Path, remote: &str) -> Result<(), VcsError>;
}

/// `git` driven through `std::process`.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
}

impl GitCli {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn rev_parse_head(&self, repo: &Path) -> Result<RevisionId, VcsError> {
        let out = self.run(repo, &["rev-parse", "--short", "HEAD"])?;
        RevisionId::new(out).map_err(|_| VcsError::Failed {
            command: "rev-parse --short HEAD".to_string(),
            code: Some(0),
            stderr: "empty revision".to_string(),
        })
    }

    /// Run one git subcommand in `repo`, returning its stdout on success.
    fn run<S: AsRef<OsStr>>(&self, repo: &Path, args: &[S]) -> Result<String, VcsError> {
        let command = args
            .iter()
            .map(|arg| arg.as_ref().to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");

        let bare_name = if cfg!(windows) { "git.exe" } else { "git" };
        let git_bin = which::which(bare_name).map_err(|_| VcsError::BinaryNotFound)?;

        let mut cmd = Command::new(&git_bin);
        cmd.arg("--no-pager")
            .arg("-c")
            .arg("color.ui=false")
            .arg("-c")
            .arg(format!("core.hooksPath={}", hooks_disabled_path()))
            .args(args)
            .current_dir(repo)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(repo = %repo.display(), command = %command, "Running git");
        let mut child = cmd.spawn().map_err(|source| VcsError::Spawn {
            command: command.clone(),
            source,
        })?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(command = %command, timeout_ms = self.timeout.as_millis(), "git timed out");
                return Err(VcsError::TimedOut {
                    command,
                    timeout: self.timeout,
                });
            }
            Err(source) => return Err(VcsError::Spawn { command, source }),
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);
        if !status.success() {
            return Err(VcsError::Failed {
                command,
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

impl VersionControl for GitCli {
    fn head(&self, repo: &Path) -> Result<RevisionId, VcsError> {
        self.rev_parse_head(repo)
    }

    fn commit(
        &self,
        repo: &Path,
        paths: &[PathBuf],
        message: &str,
    ) -> Result<RevisionId, VcsError> {
        let mut add: Vec<&OsStr> = vec![OsStr::new("add"), OsStr::new("--")];
        add.extend(paths.iter().map(|path| path.as_os_str()));
        self.run(repo, &add)?;

        // Pathspec after `--` commits only these files, whatever else is staged.
        let mut commit: Vec<&OsStr> = ["commit", "-m", message, "--"]
            .into_iter()
            .map(OsStr::new)
            .collect();
        commit.extend(paths.iter().map(|path| path.as_os_str()));
        self.run(repo, &commit)?;

        self.rev_parse_head(repo)
    }

    fn push(&self, repo: &Path, remote: &str) -> Result<(), VcsError> {
        self.run(repo, &["push", remote]).map(drop)
    }
}

/// Poll until the child exits or `timeout` passes. On expiry the child is
/// killed and reaped, and `Ok(None)` is returned.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// `core.hooksPath` target that contains no hooks.
///
/// On unix `/dev/null` is a file, so git never finds `<hooks>/pre-commit`.
/// Elsewhere an empty per-process directory under the temp dir is used.
fn hooks_disabled_path() -> &'static str {
    static PATH: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    PATH.get_or_init(|| {
        #[cfg(unix)]
        {
            "/dev/null".to_string()
        }
        #[cfg(not(unix))]
        {
            let path = std::env::temp_dir().join(format!("ledger-hooks-{}", std::process::id()));
            let _ = std::fs::create_dir_all(&path);
            path.display().to_string()
        }
    })
}
