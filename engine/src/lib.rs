//! todoticket engine - diff scanning and work item reconciliation.
//!
//! This crate turns the unified diff of a push into todo items and decides
//! which work items to open and close for them.
//!
//! # Pipeline
//!
//! ```text
//! diff text -> DiffScanner -> MarkerExtractor -> TodoItem -> Reconciler -> store writes
//! ```
//!
//! Nothing is persisted between runs: every run matches markers against a
//! fresh query of active work items, by title.
//!
//! # Modules
//!
//! - [`filter`]: Path inclusion/exclusion rules
//! - [`scanner`]: Unified diff state machine
//! - [`marker`]: Marker and inline label extraction
//! - [`todo`]: Todo items and their rendered descriptions
//! - [`reconcile`]: Close/create planning and paced execution
//! - [`pacing`]: Delay between work item writes
//! - [`config`]: Scan settings
//! - [`error`]: Pattern errors

pub mod config;
pub mod error;
pub mod filter;
pub mod marker;
pub mod pacing;
pub mod reconcile;
pub mod scanner;
pub mod todo;

pub use config::ScanConfig;
pub use error::PatternError;
pub use filter::{include, FilterMode, PathFilter};
pub use marker::{DiffType, LabelPattern, Marker, MarkerExtractor, DEFAULT_MARKER_PATTERN};
pub use pacing::{FixedIntervalPacer, Pacer, PacingDelay};
pub use reconcile::{
    plan, Action, ActionFailure, ActiveItem, BatchError, ReconcileError, ReconcileSummary,
    Reconciler, StoreError, TrackedItemStore,
};
pub use scanner::{extract_todos, DiffScanner, ScanState};
pub use todo::{ContextWindow, SourceRef, TodoItem};
