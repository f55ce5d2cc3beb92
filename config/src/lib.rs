//! Ledger configuration.
//!
//! Read from `$LEDGER_CONFIG`, else `~/.ledger/config.toml`. A missing
//! default file yields [`LedgerConfig::default`].
//!
//! ```toml
//! [decode]
//! recovery = "skip_line"
//! drop_malformed = false
//!
//! [vcs]
//! enabled = true
//! push = true
//!
//! [[domain]]
//! name = "docs"
//! ledger = "${HOME}/ledgers/docs.jsonl"
//! completion_log = "docs-completed.jsonl"
//! ```
//!
//! Relative paths resolve against the directory holding the config file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use ledger_core::{DecodeRecovery, SnapshotLayout};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "LEDGER_CONFIG";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 300_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config {}: domain `{name}` is defined more than once", path.display())]
    DuplicateDomain { path: PathBuf, name: String },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::DuplicateDomain { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub decode: DecodeConfig,
    pub snapshot: SnapshotLayout,
    pub tasks: TaskDefaults,
    pub vcs: VcsConfig,
    #[serde(rename = "domain")]
    pub domains: Vec<DomainConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub recovery: DecodeRecovery,
    /// Allow rewriting a ledger that had malformed content, losing it.
    /// When false such rewrites fail and the file is left untouched.
    pub drop_malformed: bool,
}

/// Values stamped on completed tasks when the caller supplies none.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TaskDefaults {
    pub default_actor: String,
    pub default_notes: String,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            default_actor: "ledger".to_string(),
            default_notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VcsConfig {
    pub enabled: bool,
    /// Working tree to run git in. Defaults to the ledger file's directory.
    pub repo_dir: Option<PathBuf>,
    pub timeout_ms: u64,
    pub remote: String,
    pub push: bool,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repo_dir: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            remote: "origin".to_string(),
            push: false,
        }
    }
}

impl VcsConfig {
    /// Per-command timeout, clamped to 100ms..=5min.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
    }
}

/// One task domain: a mutable ledger plus its append-only completion log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DomainConfig {
    pub name: String,
    pub ledger: PathBuf,
    pub completion_log: PathBuf,
}

impl LedgerConfig {
    /// Load from `$LEDGER_CONFIG` if set, else the default location.
    ///
    /// A missing default file is not an error; a missing `$LEDGER_CONFIG`
    /// target is.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Self::load_from(PathBuf::from(path));
        }
        let Some(path) = default_path() else {
            debug!("No home directory; using default config");
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file; using defaults");
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| {
            warn!(path = %path.display(), error = %source, "Failed to read config");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, base).map_err(|err| match err {
            ConfigError::Parse { source, .. } => {
                warn!(path = %path.display(), error = %source, "Failed to parse config");
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            }
            ConfigError::DuplicateDomain { name, .. } => ConfigError::DuplicateDomain {
                path: path.to_path_buf(),
                name,
            },
            read @ ConfigError::Read { .. } => read,
        })
    }

    /// Parse TOML text, resolving relative paths against `base`.
    pub fn parse(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: base.to_path_buf(),
            source,
        })?;

        let mut seen = HashSet::new();
        for domain in &mut config.domains {
            if !seen.insert(domain.name.clone()) {
                return Err(ConfigError::DuplicateDomain {
                    path: base.to_path_buf(),
                    name: domain.name.clone(),
                });
            }
            domain.ledger = resolve_path(&domain.ledger, base);
            domain.completion_log = resolve_path(&domain.completion_log, base);
        }
        if let Some(dir) = config.vcs.repo_dir.take() {
            config.vcs.repo_dir = Some(resolve_path(&dir, base));
        }
        Ok(config)
    }

    /// Path `load` falls back to when `$LEDGER_CONFIG` is unset.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        default_path()
    }

    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&DomainConfig> {
        self.domains.iter().find(|domain| domain.name == name)
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ledger").join("config.toml"))
}

fn resolve_path(path: &Path, base: &Path) -> PathBuf {
    let expanded = match path.to_str() {
        Some(text) => PathBuf::from(expand_env_vars(text)),
        None => path.to_path_buf(),
    };
    if expanded.is_relative() {
        base.join(expanded)
    } else {
        expanded
    }
}

/// Replace `${VAR}` with the variable's value. Unset variables become empty;
/// an unterminated `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
