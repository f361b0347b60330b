//! Error types for the todoticket action.
//!
//! Each client and the configuration loader have their own error enum;
//! [`ActionError`] collects them for the sync run.

use thiserror::Error;
use todoticket_engine::{PatternError, ReconcileError};

use crate::azdo::AzdoError;
use crate::config::ConfigError;
use crate::github::GithubError;

/// Errors that end a sync run.
///
/// # Examples
///
/// ```ignore
/// use todoticket_action::error::ActionError;
///
/// fn load() -> Result<(), ActionError> {
///     let config = Config::from_env()?;
///     let scan = config.scan.scan_config()?;
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum ActionError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A configured regular expression does not compile.
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// The diff could not be retrieved.
    #[error("failed to get diff: {0}")]
    Github(#[from] GithubError),

    /// The Azure DevOps client could not be set up.
    #[error("azure devops error: {0}")]
    Azdo(#[from] AzdoError),

    /// Work items could not be queried, or some actions failed.
    #[error("failed to update work items: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Reading a local diff or writing the report failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for action operations.
pub type Result<T> = std::result::Result<T, ActionError>;
