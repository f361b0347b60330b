//! Error types for the todoticket engine.
//!
//! Parsing is total over diff text, so the only engine errors are
//! configuration problems (bad regular expressions) and reconciliation
//! failures.
//!
//! # Error Types
//!
//! - [`PatternError`] - A configured regular expression failed to compile
//! - [`crate::reconcile::BatchError`] - One or more reconciliation actions failed
//! - [`crate::reconcile::ReconcileError`] - Reconciliation could not start or finish

use thiserror::Error;

/// A configured regular expression could not be compiled.
#[derive(Error, Debug, Clone)]
#[error("invalid {kind} pattern '{pattern}': {source}")]
pub struct PatternError {
    /// Which setting the pattern belongs to (e.g. `marker`, `label`).
    pub kind: &'static str,

    /// The pattern as configured.
    pub pattern: String,

    /// The underlying compile error.
    #[source]
    pub source: regex::Error,
}

impl PatternError {
    pub(crate) fn new(kind: &'static str, pattern: &str, source: regex::Error) -> Self {
        Self {
            kind,
            pattern: pattern.to_string(),
            source,
        }
    }
}

/// Compiles `pattern`, tagging failures with the setting they came from.
pub(crate) fn compile(kind: &'static str, pattern: &str) -> Result<regex::Regex, PatternError> {
    regex::Regex::new(pattern).map_err(|e| PatternError::new(kind, pattern, e))
}

/// Compiles `pattern` case-insensitively.
pub(crate) fn compile_case_insensitive(
    kind: &'static str,
    pattern: &str,
) -> Result<regex::Regex, PatternError> {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| PatternError::new(kind, pattern, e))
}
