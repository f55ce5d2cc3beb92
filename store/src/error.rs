use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read ledger {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The atomic write failed; the previous file content is unchanged.
    #[error("failed to write ledger {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode ledger {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// A rewrite would lose content that failed to decode. Nothing was
    /// written.
    #[error(
        "refusing to rewrite ledger {}: {count} malformed region(s) would be lost, first at line {line}: {message}",
        path.display()
    )]
    Malformed {
        path: PathBuf,
        count: usize,
        line: usize,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to append to completion log {}: {source}", path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode completion entry: {0}")]
    Encode(#[from] serde_json::Error),
}
