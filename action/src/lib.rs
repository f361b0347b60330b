//! todoticket action - TODO markers in pushed commits, tracked as work items.
//!
//! This crate is the GitHub Actions side of todoticket. It reads the push
//! from the runner environment, fetches the diff from GitHub, scans it with
//! [`todoticket_engine`] and opens or closes Azure DevOps work items for the
//! markers that were added or removed.
//!
//! # Modules
//!
//! - [`config`]: Configuration from action inputs and the push event
//! - [`github`]: Diff retrieval from the GitHub compare API
//! - [`azdo`]: Azure DevOps client and work item store
//! - [`report`]: Run report for the workflow log
//! - [`run`]: Sync and scan flows
//! - [`error`]: Error types for action operations

pub mod azdo;
pub mod config;
pub mod error;
pub mod github;
pub mod report;
pub mod run;

pub use azdo::{AzdoClient, AzdoError, AzdoStore, BoardFields};
pub use config::{Config, ConfigError, ScanSettings};
pub use error::{ActionError, Result};
pub use github::{GithubClient, GithubError};
pub use run::{scan, sync, SyncOutcome};
