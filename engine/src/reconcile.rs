//! Reconciliation of diff markers with tracked work items.
//!
//! Removed markers close the active work items whose titles they match;
//! added markers create new work items. Titles are the only link between a
//! marker and a work item, so two markers with identical text refer to the
//! same item. New items are created for every added marker without checking
//! whether an item with that title is already active.
//!
//! # Failure Handling
//!
//! Actions run one at a time with a [`Pacer`] wait after each. A failing
//! action is recorded and the batch continues; once every action has been
//! attempted, any recorded failures are returned together as a
//! [`BatchError`].
//!
//! # Example
//!
//! ```
//! use todoticket_engine::marker::DiffType;
//! use todoticket_engine::reconcile::{plan, Action, ActiveItem};
//! use todoticket_engine::todo::{ContextWindow, SourceRef, TodoItem};
//!
//! let source = SourceRef::new("https://github.com/acme/app", "abc123");
//! let builder = TodoItem::builder(&source, ContextWindow::default());
//! let items = vec![
//!     builder.build("Old task", 3, "a.rs", DiffType::Deletion, vec![]),
//!     builder.build("New task", 3, "a.rs", DiffType::Addition, vec![]),
//! ];
//! let active = vec![ActiveItem::new(Some(42), "Old task")];
//!
//! let actions = plan(&items, &active);
//! assert_eq!(actions.len(), 2);
//! assert!(matches!(actions[0], Action::Close { id: 42, .. }));
//! assert!(matches!(&actions[1], Action::Create(item) if item.title() == "New task"));
//! ```

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::marker::DiffType;
use crate::pacing::Pacer;
use crate::todo::TodoItem;

/// Error returned by a [`TrackedItemStore`] call.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// An active work item, as far as title matching needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveItem {
    /// Work item id; items without one cannot be closed.
    pub id: Option<i64>,
    pub title: String,
    pub state: Option<String>,
    pub lane: Option<String>,
}

impl ActiveItem {
    pub fn new(id: Option<i64>, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            state: None,
            lane: None,
        }
    }
}

/// The work item system the reconciler writes to.
#[async_trait]
pub trait TrackedItemStore: Send + Sync {
    /// Active items whose title is exactly one of `titles`.
    async fn active_items(&self, titles: &[String]) -> Result<Vec<ActiveItem>, StoreError>;

    /// Creates a work item for `item` and returns its id.
    async fn create(&self, item: &TodoItem) -> Result<i64, StoreError>;

    /// Closes the work item `id`.
    async fn close(&self, id: i64) -> Result<(), StoreError>;
}

/// A single write against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Close { id: i64, title: String },
    Create(TodoItem),
}

impl Action {
    pub fn title(&self) -> &str {
        match self {
            Self::Close { title, .. } => title,
            Self::Create(item) => item.title(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Close { id, title } => write!(f, "close #{id} '{title}'"),
            Self::Create(item) => write!(f, "create '{}'", item.title()),
        }
    }
}

/// An action that failed, with the store's error.
#[derive(Debug, Error)]
#[error("{action}: {error}")]
pub struct ActionFailure {
    pub action: Action,
    #[source]
    pub error: StoreError,
}

/// Ids touched by a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub closed: Vec<i64>,
    pub created: Vec<i64>,
}

impl ReconcileSummary {
    pub fn total(&self) -> usize {
        self.closed.len() + self.created.len()
    }
}

/// Every failure of a batch in which at least one action failed.
#[derive(Debug, Error)]
#[error("{} of {} work item action(s) failed", .failures.len(), .attempted)]
pub struct BatchError {
    pub failures: Vec<ActionFailure>,
    pub attempted: usize,
    /// What did succeed before and after the failures.
    pub completed: ReconcileSummary,
}

/// Errors that end a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Active items could not be fetched; no action was attempted.
    #[error("failed to query active work items: {0}")]
    Query(#[source] StoreError),

    /// Some actions failed.
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Distinct titles of removed markers, in diff order.
pub fn deletion_titles(items: &[TodoItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| item.diff_type() == DiffType::Deletion)
        .filter(|item| seen.insert(item.title()))
        .map(|item| item.title().to_string())
        .collect()
}

/// Decides the actions for a run.
///
/// Closes come first, in `active` order, one per active item whose title
/// matches a removed marker. Creates follow, one per added marker in diff
/// order.
pub fn plan(items: &[TodoItem], active: &[ActiveItem]) -> Vec<Action> {
    let deleted: HashSet<&str> = items
        .iter()
        .filter(|item| item.diff_type() == DiffType::Deletion)
        .map(TodoItem::title)
        .collect();

    let closes = active
        .iter()
        .filter(|item| deleted.contains(item.title.as_str()))
        .filter_map(|item| match item.id {
            Some(id) => Some(Action::Close {
                id,
                title: item.title.clone(),
            }),
            None => {
                debug!(title = %item.title, "Active item has no id, skipping close");
                None
            }
        });

    let creates = items
        .iter()
        .filter(|item| item.diff_type() == DiffType::Addition)
        .cloned()
        .map(Action::Create);

    closes.chain(creates).collect()
}

enum Outcome {
    Closed(i64),
    Created(i64),
}

/// Runs reconciliation against a store, pacing every write.
#[derive(Debug)]
pub struct Reconciler<S, P> {
    store: S,
    pacer: P,
}

impl<S: TrackedItemStore, P: Pacer> Reconciler<S, P> {
    pub fn new(store: S, pacer: P) -> Self {
        Self { store, pacer }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Queries active items for the removed markers, then plans and executes.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::Query`] if active items cannot be fetched
    /// - [`ReconcileError::Batch`] if any action fails
    pub async fn reconcile(&self, items: &[TodoItem]) -> Result<ReconcileSummary, ReconcileError> {
        let titles = deletion_titles(items);
        let active = if titles.is_empty() {
            Vec::new()
        } else {
            self.store
                .active_items(&titles)
                .await
                .map_err(ReconcileError::Query)?
        };

        debug!(
            removed_titles = titles.len(),
            active_matches = active.len(),
            "Fetched active work items"
        );

        let actions = plan(items, &active);
        Ok(self.execute(actions).await?)
    }

    /// Executes `actions` in order, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] with every failure if any action failed.
    pub async fn execute(&self, actions: Vec<Action>) -> Result<ReconcileSummary, BatchError> {
        let attempted = actions.len();
        let mut completed = ReconcileSummary::default();
        let mut failures = Vec::new();

        for action in actions {
            let outcome = self.apply(&action).await;
            match outcome {
                Ok(Outcome::Closed(id)) => {
                    info!(id, title = %action.title(), "Work item closed");
                    completed.closed.push(id);
                }
                Ok(Outcome::Created(id)) => {
                    info!(id, title = %action.title(), "Work item created");
                    completed.created.push(id);
                }
                Err(error) => {
                    error!(action = %action, error = %error, "Work item action failed");
                    failures.push(ActionFailure { action, error });
                }
            }

            self.pacer.pause().await;
        }

        if failures.is_empty() {
            Ok(completed)
        } else {
            Err(BatchError {
                failures,
                attempted,
                completed,
            })
        }
    }

    async fn apply(&self, action: &Action) -> Result<Outcome, StoreError> {
        match action {
            Action::Close { id, .. } => {
                self.store.close(*id).await?;
                Ok(Outcome::Closed(*id))
            }
            Action::Create(item) => self.store.create(item).await.map(Outcome::Created),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo::{ContextWindow, SourceRef};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Query(Vec<String>),
        Close(i64),
        Create(String),
    }

    #[derive(Default)]
    struct MockStore {
        active: Vec<ActiveItem>,
        failing_close: Vec<i64>,
        failing_create: Vec<String>,
        fail_query: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl MockStore {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TrackedItemStore for MockStore {
        async fn active_items(&self, titles: &[String]) -> Result<Vec<ActiveItem>, StoreError> {
            self.calls.lock().unwrap().push(Call::Query(titles.to_vec()));
            if self.fail_query {
                return Err("query refused".into());
            }
            Ok(self
                .active
                .iter()
                .filter(|item| titles.contains(&item.title))
                .cloned()
                .collect())
        }

        async fn create(&self, item: &TodoItem) -> Result<i64, StoreError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Create(item.title().to_string()));
            if self.failing_create.iter().any(|t| t == item.title()) {
                return Err(format!("cannot create '{}'", item.title()).into());
            }
            Ok(100)
        }

        async fn close(&self, id: i64) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push(Call::Close(id));
            if self.failing_close.contains(&id) {
                return Err(format!("cannot close {id}").into());
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingPacer {
        pauses: AtomicUsize,
    }

    #[async_trait]
    impl Pacer for CountingPacer {
        async fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn item(title: &str, diff_type: DiffType) -> TodoItem {
        let source = SourceRef::new("https://github.com/acme/app", "abc");
        TodoItem::builder(&source, ContextWindow::default()).build(
            title,
            1,
            "a.rs",
            diff_type,
            vec!["todo".to_string()],
        )
    }

    fn scenario_items() -> Vec<TodoItem> {
        vec![
            item("Old task", DiffType::Deletion),
            item("New task", DiffType::Addition),
        ]
    }

    #[test]
    fn deletion_titles_are_distinct_and_ordered() {
        let items = vec![
            item("b", DiffType::Deletion),
            item("x", DiffType::Addition),
            item("a", DiffType::Deletion),
            item("b", DiffType::Deletion),
        ];
        assert_eq!(deletion_titles(&items), vec!["b", "a"]);
    }

    #[test]
    fn plan_closes_matches_and_creates_additions() {
        let active = vec![
            ActiveItem::new(Some(7), "Unrelated"),
            ActiveItem::new(Some(42), "Old task"),
        ];
        let actions = plan(&scenario_items(), &active);

        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0],
            Action::Close {
                id: 42,
                title: "Old task".to_string()
            }
        );
        assert_eq!(actions[1], Action::Create(item("New task", DiffType::Addition)));
    }

    #[test]
    fn plan_skips_active_items_without_id() {
        let active = vec![ActiveItem::new(None, "Old task")];
        let actions = plan(&scenario_items(), &active);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::Create(_)));
    }

    #[test]
    fn plan_does_not_dedup_creates_against_active_items() {
        let items = vec![item("Known", DiffType::Addition)];
        let active = vec![ActiveItem::new(Some(1), "Known")];
        let actions = plan(&items, &active);
        assert_eq!(actions, vec![Action::Create(item("Known", DiffType::Addition))]);
    }

    #[test]
    fn plan_closes_every_active_item_sharing_a_title() {
        let items = vec![item("Dup", DiffType::Deletion)];
        let active = vec![
            ActiveItem::new(Some(1), "Dup"),
            ActiveItem::new(Some(2), "Dup"),
        ];
        let ids: Vec<i64> = plan(&items, &active)
            .iter()
            .filter_map(|a| match a {
                Action::Close { id, .. } => Some(*id),
                Action::Create(_) => None,
            })
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn action_display() {
        let close = Action::Close {
            id: 3,
            title: "t".to_string(),
        };
        assert_eq!(close.to_string(), "close #3 't'");
        assert_eq!(
            Action::Create(item("n", DiffType::Addition)).to_string(),
            "create 'n'"
        );
    }

    #[tokio::test]
    async fn reconcile_closes_and_creates() {
        let store = MockStore {
            active: vec![ActiveItem::new(Some(42), "Old task")],
            ..Default::default()
        };
        let reconciler = Reconciler::new(store, CountingPacer::default());

        let summary = reconciler
            .reconcile(&scenario_items())
            .await
            .expect("no failures");

        assert_eq!(summary.closed, vec![42]);
        assert_eq!(summary.created, vec![100]);
        assert_eq!(
            reconciler.store().calls(),
            vec![
                Call::Query(vec!["Old task".to_string()]),
                Call::Close(42),
                Call::Create("New task".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_close_does_not_stop_create() {
        let store = MockStore {
            active: vec![ActiveItem::new(Some(42), "Old task")],
            failing_close: vec![42],
            ..Default::default()
        };
        let reconciler = Reconciler::new(store, CountingPacer::default());

        let err = reconciler
            .reconcile(&scenario_items())
            .await
            .expect_err("close fails");

        let ReconcileError::Batch(batch) = err else {
            panic!("expected batch error");
        };
        assert_eq!(batch.attempted, 2);
        assert_eq!(batch.failures.len(), 1);
        assert!(matches!(batch.failures[0].action, Action::Close { id: 42, .. }));
        assert_eq!(batch.failures[0].error.to_string(), "cannot close 42");
        assert_eq!(batch.completed.created, vec![100]);
        assert!(reconciler
            .store()
            .calls()
            .contains(&Call::Create("New task".to_string())));
    }

    #[tokio::test]
    async fn every_failure_is_aggregated() {
        let store = MockStore {
            active: vec![ActiveItem::new(Some(42), "Old task")],
            failing_close: vec![42],
            failing_create: vec!["New task".to_string()],
            ..Default::default()
        };
        let reconciler = Reconciler::new(store, CountingPacer::default());

        let err = reconciler.reconcile(&scenario_items()).await.unwrap_err();
        let ReconcileError::Batch(batch) = err else {
            panic!("expected batch error");
        };
        assert_eq!(batch.failures.len(), 2);
        assert_eq!(batch.to_string(), "2 of 2 work item action(s) failed");
        assert!(batch.completed.total() == 0);
    }

    #[tokio::test]
    async fn pacer_waits_after_every_action() {
        let store = MockStore {
            active: vec![ActiveItem::new(Some(42), "Old task")],
            failing_close: vec![42],
            ..Default::default()
        };
        let reconciler = Reconciler::new(store, CountingPacer::default());

        let _ = reconciler.reconcile(&scenario_items()).await;

        assert_eq!(reconciler.pacer.pauses.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_batch_has_no_actions_and_no_error() {
        let reconciler = Reconciler::new(MockStore::default(), CountingPacer::default());

        let summary = tokio_test::block_on(reconciler.reconcile(&[])).expect("empty batch");

        assert_eq!(summary, ReconcileSummary::default());
        assert!(reconciler.store().calls().is_empty());
        assert_eq!(reconciler.pacer.pauses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn additions_only_skip_the_query() {
        let reconciler = Reconciler::new(MockStore::default(), CountingPacer::default());
        let items = vec![item("Fresh", DiffType::Addition)];

        reconciler.reconcile(&items).await.expect("create succeeds");

        assert_eq!(
            reconciler.store().calls(),
            vec![Call::Create("Fresh".to_string())]
        );
    }

    #[tokio::test]
    async fn query_failure_aborts_before_any_action() {
        let store = MockStore {
            fail_query: true,
            ..Default::default()
        };
        let reconciler = Reconciler::new(store, CountingPacer::default());

        let err = reconciler.reconcile(&scenario_items()).await.unwrap_err();

        assert!(matches!(err, ReconcileError::Query(_)));
        assert!(err.to_string().contains("query refused"));
        assert_eq!(reconciler.store().calls().len(), 1);
    }
}
