//! The action's top-level flows.
//!
//! [`sync`] is what runs on a push: fetch the diff, find markers, report them
//! and reconcile them with Azure DevOps. [`scan`] only finds markers in a
//! diff the caller already has.

use std::io::Write;

use todoticket_engine::pacing::FixedIntervalPacer;
use todoticket_engine::reconcile::{ReconcileSummary, Reconciler};
use todoticket_engine::scanner::extract_todos;
use todoticket_engine::todo::{SourceRef, TodoItem};
use tracing::{info, warn};

use crate::azdo::{AzdoClient, AzdoStore};
use crate::config::{Config, ScanSettings};
use crate::error::Result;
use crate::github::GithubClient;
use crate::report;

/// Result of a sync run.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Every marker found in the diff.
    pub items: Vec<TodoItem>,
    /// What was written, or `None` when publishing was disabled.
    pub summary: Option<ReconcileSummary>,
}

/// Runs the full push flow and writes the report to `out`.
///
/// Work items are left untouched when `dry_run` is set or the configuration
/// disables publishing.
///
/// # Errors
///
/// Returns an error if a pattern does not compile, the diff cannot be
/// fetched, active items cannot be queried, or any work item action fails.
pub async fn sync<W: Write>(config: &Config, dry_run: bool, out: &mut W) -> Result<SyncOutcome> {
    report::write_parameters(out, config)?;

    let scan_config = config.scan.scan_config()?;

    if config.forced {
        warn!(base = %config.base_sha, "Forced push; the base commit may no longer exist");
    }

    let github = GithubClient::new(&config.github.api_url, &config.github.token)?;
    let diff = github
        .fetch_diff(&config.repository, &config.base_sha, &config.head_sha)
        .await?;

    let items = extract_todos(&diff, &scan_config, &config.source_ref());
    info!(count = items.len(), "Parsed markers from diff");
    report::write_todos(out, &items)?;

    if dry_run || config.no_publish {
        info!("Publishing disabled, work items left unchanged");
        return Ok(SyncOutcome {
            items,
            summary: None,
        });
    }

    let client = AzdoClient::new(&config.azdo)?;
    let store = AzdoStore::new(client, &config.azdo, config.author.clone());
    let reconciler = Reconciler::new(store, FixedIntervalPacer::new(config.pacing));

    let summary = reconciler.reconcile(&items).await?;

    info!(
        closed = summary.closed.len(),
        created = summary.created.len(),
        "Finished updating work items"
    );
    writeln!(out, "{}", report::SEPARATOR)?;
    writeln!(
        out,
        "Finished updating work items: {} closed, {} created.",
        summary.closed.len(),
        summary.created.len()
    )?;

    Ok(SyncOutcome {
        items,
        summary: Some(summary),
    })
}

/// Finds markers in `diff` and writes them to `out`.
///
/// # Errors
///
/// Returns an error if a pattern does not compile or writing fails.
pub fn scan<W: Write>(
    diff: &str,
    settings: &ScanSettings,
    source: &SourceRef,
    out: &mut W,
) -> Result<Vec<TodoItem>> {
    let scan_config = settings.scan_config()?;
    let items = extract_todos(diff, &scan_config, source);
    report::write_todos(out, &items)?;
    Ok(items)
}
