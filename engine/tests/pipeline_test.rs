//! End-to-end tests for the diff-to-actions pipeline.
//!
//! These tests feed realistic multi-file diffs through the scanner and the
//! reconciler, using an in-memory work item store.

use std::sync::Mutex;

use async_trait::async_trait;
use todoticket_engine::config::ScanConfig;
use todoticket_engine::filter::PathFilter;
use todoticket_engine::marker::DiffType;
use todoticket_engine::pacing::Pacer;
use todoticket_engine::reconcile::{
    plan, Action, ActiveItem, ReconcileError, Reconciler, StoreError, TrackedItemStore,
};
use todoticket_engine::scanner::extract_todos;
use todoticket_engine::todo::{ContextWindow, SourceRef, TodoItem};

// =============================================================================
// Test Helpers
// =============================================================================

const PUSH_DIFF: &str = "\
diff --git a/src/server.rs b/src/server.rs
index 3f1c2aa..9be01d2 100644
--- a/src/server.rs
+++ b/src/server.rs
@@ -12,7 +12,8 @@ impl Server {
     fn start(&self) {
-        // TODO: bind to configured port
+        self.bind(self.port);
+        // TODO: add graceful shutdown [ops]
         self.listen();
     }

@@ -40,3 +41,3 @@ impl Server {
-    // TODO remove legacy handler
+    // TODO \"document handler\" [docs] [api]
     fn handle(&self) {}
diff --git a/vendor/lib.rs b/vendor/lib.rs
index 1111111..2222222 100644
--- a/vendor/lib.rs
+++ b/vendor/lib.rs
@@ -1,2 +1,3 @@
+// TODO vendored marker
 pub fn lib() {}
diff --git a/scripts/deploy.py b/scripts/deploy.py
new file mode 100644
--- /dev/null
+++ b/scripts/deploy.py
@@ -0,0 +1,3 @@
+import os
+# TODO read region from env
+print(os.getcwd())
\\ No newline at end of file
";

fn source() -> SourceRef {
    SourceRef::new("https://github.com/acme/app", "9be01d2")
}

fn push_config() -> ScanConfig {
    ScanConfig::with_defaults()
        .expect("defaults")
        .with_labels(r"\[(\w+)\]", None)
        .expect("label pattern")
        .with_filter(PathFilter::new(vec![], vec!["/vendor".to_string()]))
}

#[derive(Default)]
struct MemoryStore {
    active: Vec<ActiveItem>,
    fail_close: bool,
    log: Mutex<Vec<String>>,
}

#[async_trait]
impl TrackedItemStore for MemoryStore {
    async fn active_items(&self, titles: &[String]) -> Result<Vec<ActiveItem>, StoreError> {
        Ok(self
            .active
            .iter()
            .filter(|item| titles.contains(&item.title))
            .cloned()
            .collect())
    }

    async fn create(&self, item: &TodoItem) -> Result<i64, StoreError> {
        let mut log = self.log.lock().unwrap();
        log.push(format!("create {}", item.title()));
        Ok(500 + log.len() as i64)
    }

    async fn close(&self, id: i64) -> Result<(), StoreError> {
        self.log.lock().unwrap().push(format!("close {id}"));
        if self.fail_close {
            return Err("work item is locked".into());
        }
        Ok(())
    }
}

struct NoWait;

#[async_trait]
impl Pacer for NoWait {
    async fn pause(&self) {}
}

// =============================================================================
// Scanning
// =============================================================================

#[test]
fn push_diff_yields_items_with_line_numbers() {
    let items = extract_todos(PUSH_DIFF, &push_config(), &source());

    let summary: Vec<(&str, &str, u32, DiffType)> = items
        .iter()
        .map(|i| (i.title(), i.file(), i.line(), i.diff_type()))
        .collect();

    assert_eq!(
        summary,
        vec![
            ("TODO: bind to configured port", "src/server.rs", 13, DiffType::Deletion),
            ("TODO: add graceful shutdown", "src/server.rs", 14, DiffType::Addition),
            ("TODO remove legacy handler", "src/server.rs", 41, DiffType::Deletion),
            ("TODO \"document handler\"", "src/server.rs", 41, DiffType::Addition),
            ("TODO read region from env", "scripts/deploy.py", 2, DiffType::Addition),
        ]
    );
}

#[test]
fn inline_labels_follow_the_fixed_label() {
    let items = extract_todos(PUSH_DIFF, &push_config(), &source());

    assert_eq!(items[1].labels(), &["todo", "ops"]);
    assert_eq!(items[3].labels(), &["todo", "docs", "api"]);
    assert_eq!(items[4].labels(), &["todo"]);
}

#[test]
fn excluded_prefix_hides_vendored_markers() {
    let items = extract_todos(PUSH_DIFF, &push_config(), &source());
    assert!(items.iter().all(|i| !i.file().starts_with("vendor/")));

    let unfiltered = ScanConfig::with_defaults().expect("defaults");
    let all = extract_todos(PUSH_DIFF, &unfiltered, &source());
    assert!(all.iter().any(|i| i.file() == "vendor/lib.rs" && i.line() == 1));
}

#[test]
fn file_pattern_limits_scan_to_matching_files() {
    let config = ScanConfig::with_defaults()
        .expect("defaults")
        .with_filter(
            PathFilter::default()
                .with_file_pattern(r"\.py$")
                .expect("file pattern"),
        );

    let items = extract_todos(PUSH_DIFF, &config, &source());

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].file(), "scripts/deploy.py");
}

#[test]
fn permalink_uses_context_window() {
    let config = push_config().with_context(ContextWindow::new(3, 7));
    let items = extract_todos(PUSH_DIFF, &config, &source());

    let deploy = items.last().expect("deploy item");
    assert_eq!((deploy.start_line(), deploy.end_line()), (0, 9));
    assert!(deploy
        .body()
        .contains("https://github.com/acme/app/blob/9be01d2/scripts/deploy.py#L0-L9"));
}

#[test]
fn rescanning_is_deterministic() {
    let config = push_config();
    assert_eq!(
        extract_todos(PUSH_DIFF, &config, &source()),
        extract_todos(PUSH_DIFF, &config, &source())
    );
}

// =============================================================================
// Reconciliation
// =============================================================================

#[test]
fn plan_matches_removed_markers_by_title() {
    let items = extract_todos(PUSH_DIFF, &push_config(), &source());
    let active = vec![
        ActiveItem::new(Some(8), "TODO remove legacy handler"),
        ActiveItem::new(Some(9), "TODO something else"),
    ];

    let actions = plan(&items, &active);

    let rendered: Vec<String> = actions.iter().map(Action::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            "close #8 'TODO remove legacy handler'",
            "create 'TODO: add graceful shutdown'",
            "create 'TODO \"document handler\"'",
            "create 'TODO read region from env'",
        ]
    );
}

#[tokio::test]
async fn reconcile_runs_every_action_despite_close_failure() {
    let items = extract_todos(PUSH_DIFF, &push_config(), &source());
    let store = MemoryStore {
        active: vec![ActiveItem::new(Some(8), "TODO remove legacy handler")],
        fail_close: true,
        ..Default::default()
    };
    let reconciler = Reconciler::new(store, NoWait);

    let err = reconciler.reconcile(&items).await.unwrap_err();

    let ReconcileError::Batch(batch) = err else {
        panic!("expected a batch error");
    };
    assert_eq!(batch.attempted, 4);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(
        batch.failures[0].to_string(),
        "close #8 'TODO remove legacy handler': work item is locked"
    );
    assert_eq!(batch.completed.created.len(), 3);
    assert_eq!(
        reconciler.store().log.lock().unwrap().as_slice(),
        &[
            "close 8",
            "create TODO: add graceful shutdown",
            "create TODO \"document handler\"",
            "create TODO read region from env",
        ]
    );
}
