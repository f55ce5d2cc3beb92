use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ledger",
    version,
    about = "Maintain NDJSON snapshot ledgers and complete tracked tasks",
    after_help = "Logging: LEDGER_LOG or RUST_LOG (default: info), written to stderr.",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Config file; defaults to $LEDGER_CONFIG, then ~/.ledger/config.toml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Rewrite ledgers even when malformed content would be dropped.
    #[arg(long, global = true)]
    pub drop_malformed: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Dedup snapshots by date, drop repeated entity blocks, rebuild totals.
    Compact {
        #[arg(value_name = "LEDGER")]
        ledger: PathBuf,
    },

    /// Keep only the latest snapshot. Destructive.
    Collapse {
        #[arg(value_name = "LEDGER")]
        ledger: PathBuf,
        /// Confirm that every older snapshot is discarded.
        #[arg(long)]
        yes: bool,
    },

    /// Mark the first open task for REPO:PATH completed.
    Complete {
        domain: String,
        repo: String,
        path: String,
        #[arg(long)]
        actor: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Revision to stamp instead of the repository HEAD.
        #[arg(long)]
        revision: Option<String>,
        /// Update the files without committing them.
        #[arg(long)]
        no_commit: bool,
    },

    /// List open tasks in a domain, in file order.
    Pending { domain: String },
}
