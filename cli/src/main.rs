//! `ledger` binary: thin wrapper over `ledger-engine`.

mod args;

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use ledger_engine::{
    CompletionRequest, Confirm, EngineError, Ledger, LedgerConfig, RevisionId, TaskKey,
};

use args::{Cli, Command};

const LOG_ENV: &str = "LEDGER_LOG";

const EXIT_ERROR: u8 = 1;
const EXIT_NOT_FOUND: u8 = 2;
const EXIT_VCS_FAILED: u8 = 3;

/// How a successful run ended.
enum Finish {
    Ok,
    /// The ledger is updated but commit or push failed.
    VcsFailed,
}

fn init_tracing() {
    let env_filter = env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    // stdout carries command output; logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version requests land here too.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_ERROR)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing();

    match run(cli) {
        Ok(Finish::Ok) => ExitCode::SUCCESS,
        Ok(Finish::VcsFailed) => ExitCode::from(EXIT_VCS_FAILED),
        Err(err) => {
            eprintln!("error: {err:#}");
            let not_found = err
                .downcast_ref::<EngineError>()
                .is_some_and(EngineError::is_not_found);
            ExitCode::from(if not_found { EXIT_NOT_FOUND } else { EXIT_ERROR })
        }
    }
}

fn run(cli: Cli) -> Result<Finish> {
    let mut config = match &cli.config {
        Some(path) => LedgerConfig::load_from(path),
        None => LedgerConfig::load(),
    }
    .context("loading configuration")?;
    if cli.drop_malformed {
        config.decode.drop_malformed = true;
    }
    tracing::debug!(
        command = ?cli.command,
        domains = config.domains.len(),
        "Configuration loaded"
    );
    let ledger = Ledger::new(config);

    match cli.command {
        Command::Compact { ledger: path } => {
            let outcome = ledger
                .compact_snapshots(&path)
                .with_context(|| format!("compacting {}", path.display()))?;
            let report = &outcome.report;
            println!(
                "{}: {} -> {} records, {} superseded, {} entity blocks dropped, {} totals rebuilt{}",
                path.display(),
                report.records_in,
                report.records_out,
                report.superseded.len(),
                report
                    .entity_discards
                    .iter()
                    .map(|discard| discard.discarded)
                    .sum::<usize>(),
                report.totals_rewritten,
                if outcome.written { "" } else { " (unchanged)" },
            );
            print_diagnostics(&outcome.diagnostics);
            Ok(Finish::Ok)
        }
        Command::Collapse { ledger: path, yes } => {
            if !yes {
                bail!(
                    "collapse discards every snapshot but the latest; rerun with --yes to confirm"
                );
            }
            let outcome = ledger
                .collapse_snapshot_history(&path, Confirm::Destructive)
                .with_context(|| format!("collapsing {}", path.display()))?;
            println!(
                "{}: kept {}, dropped {}",
                path.display(),
                outcome.kept,
                outcome.dropped
            );
            print_diagnostics(&outcome.diagnostics);
            Ok(Finish::Ok)
        }
        Command::Complete {
            domain,
            repo,
            path,
            actor,
            notes,
            revision,
            no_commit,
        } => {
            let revision = revision
                .map(RevisionId::new)
                .transpose()
                .context("--revision must not be blank")?;
            let key = TaskKey::new(repo, path);
            let outcome = ledger.complete_task(
                &domain,
                &key,
                CompletionRequest {
                    actor,
                    notes,
                    revision,
                    commit: !no_commit,
                    at: None,
                },
            )?;
            println!("completed {key} at {} ({})", outcome.revision, outcome.vcs);
            print_diagnostics(&outcome.diagnostics);
            if outcome.vcs.is_failure() {
                eprintln!("warning: ledger updated but {}", outcome.vcs);
                return Ok(Finish::VcsFailed);
            }
            Ok(Finish::Ok)
        }
        Command::Pending { domain } => {
            for key in ledger.pending_tasks(&domain)? {
                println!("{key}");
            }
            Ok(Finish::Ok)
        }
    }
}

fn print_diagnostics(diagnostics: &[ledger_engine::DecodeDiagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("warning: dropped malformed input: {diagnostic}");
    }
}
