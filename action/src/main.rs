//! todoticket - syncs TODO markers in a push with Azure DevOps work items.
//!
//! # Commands
//!
//! - `todoticket` / `todoticket sync`: Run the push flow (default)
//! - `todoticket sync --dry-run`: Scan and report without touching work items
//! - `todoticket scan <diff-file>`: Report the markers in a local diff
//!
//! # Environment Variables
//!
//! See the [`config`](todoticket_action::config) module for available
//! configuration options.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use todoticket_action::config::{Config, ScanSettings};
use todoticket_action::run;
use todoticket_engine::todo::SourceRef;

/// todoticket - TODO markers tracked as Azure DevOps work items.
///
/// Scans the diff of a push for added and removed TODO comments, creates
/// work items for new ones and closes the items of removed ones.
#[derive(Parser, Debug)]
#[command(name = "todoticket")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    GITHUB_EVENT_PATH          Push event payload (set by the runner)
    INPUT_TOKEN                GitHub token (required for 'sync')
    INPUT_AZDO_TOKEN           Azure DevOps PAT (required for 'sync')
    INPUT_AZDO_ORGANIZATION    Azure DevOps organization (required for 'sync')
    INPUT_AZDO_PROJECT         Azure DevOps project (required for 'sync')
    INPUT_TODO_PATTERN         Marker regex (default: (?://|#)\\s*(TODO\\b.*))
    INPUT_NOPUBLISH            Scan and report only (default: false)

EXAMPLES:
    # Run inside a workflow
    todoticket

    # Check what a push would do
    todoticket sync --dry-run

    # Scan a local diff
    git diff HEAD~1 > change.diff
    todoticket scan change.diff
")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile the markers of a push with Azure DevOps work items.
    Sync {
        /// Scan and report without creating or closing work items.
        #[arg(long)]
        dry_run: bool,
    },

    /// Report the markers in a local unified diff.
    ///
    /// Scan settings are read from the same INPUT_* variables as 'sync'.
    Scan {
        /// Path to the diff file.
        diff: PathBuf,

        /// Repository (owner/repo) used in permalinks.
        #[arg(long, default_value = "owner/repo")]
        repository: String,

        /// Commit used in permalinks.
        #[arg(long, default_value = "HEAD")]
        sha: String,

        /// GitHub web URL used in permalinks.
        #[arg(long, default_value = "https://github.com")]
        server_url: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    match cli.command.unwrap_or(Command::Sync { dry_run: false }) {
        Command::Sync { dry_run } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;

            runtime.block_on(run_sync(dry_run))
        }
        Command::Scan {
            diff,
            repository,
            sha,
            server_url,
        } => run_scan(&diff, &repository, &sha, &server_url),
    }
}

/// Runs the push flow.
async fn run_sync(dry_run: bool) -> Result<()> {
    info!("Starting todoticket");

    let config = Config::from_env().context("Failed to load configuration")?;

    info!(
        repository = %config.repository,
        base = %config.base_sha,
        head = %config.head_sha,
        "Configuration loaded"
    );

    let mut stdout = io::stdout().lock();
    run::sync(&config, dry_run, &mut stdout)
        .await
        .context("Something went wrong while handling TODOs")?;

    Ok(())
}

/// Runs the scan command against a local diff.
fn run_scan(path: &Path, repository: &str, sha: &str, server_url: &str) -> Result<()> {
    let diff = fs::read_to_string(path)
        .with_context(|| format!("Failed to read diff {}", path.display()))?;
    let settings = ScanSettings::from_env().context("Failed to load scan settings")?;
    let source = SourceRef::new(
        format!("{}/{}", server_url.trim_end_matches('/'), repository),
        sha,
    );

    let mut stdout = io::stdout().lock();
    let items = run::scan(&diff, &settings, &source, &mut stdout)?;

    info!(count = items.len(), file = %path.display(), "Scan complete");
    Ok(())
}

/// Initializes the logging subsystem.
///
/// Logs go to stderr so the report on stdout stays readable.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}
