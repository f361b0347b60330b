//! Todo items: one marker occurrence with its source context.
//!
//! # Example
//!
//! ```
//! use todoticket_engine::marker::DiffType;
//! use todoticket_engine::todo::{ContextWindow, SourceRef, TodoItem};
//!
//! let source = SourceRef::new("https://github.com/acme/app", "abc123");
//! let item = TodoItem::builder(&source, ContextWindow::new(3, 7))
//!     .build("TODO fix", 2, "src/x.py", DiffType::Addition, vec!["todo".into()]);
//!
//! assert_eq!(item.start_line(), 0);
//! assert_eq!(item.end_line(), 9);
//! assert!(item.body().contains("/blob/abc123/src/x.py#L0-L9"));
//! ```

use std::fmt;

use crate::marker::DiffType;

/// Largest accepted value for either side of the context window.
pub const MAX_CONTEXT_LINES: u32 = 15;

/// Default lines shown before a marker.
pub const DEFAULT_LINES_BEFORE: u32 = 3;

/// Default lines shown after a marker.
pub const DEFAULT_LINES_AFTER: u32 = 7;

/// Lines around a marker included in its permalink range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    before: u32,
    after: u32,
}

impl ContextWindow {
    /// Creates a window, clamping both sides to `0..=15`.
    pub fn new(before: u32, after: u32) -> Self {
        Self {
            before: before.min(MAX_CONTEXT_LINES),
            after: after.min(MAX_CONTEXT_LINES),
        }
    }

    pub fn before(&self) -> u32 {
        self.before
    }

    pub fn after(&self) -> u32 {
        self.after
    }

    /// Permalink range for a marker on `line`.
    pub fn range(&self, line: u32) -> (u32, u32) {
        (line.saturating_sub(self.before), line.saturating_add(self.after))
    }
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(DEFAULT_LINES_BEFORE, DEFAULT_LINES_AFTER)
    }
}

/// Repository web URL and commit the diff was taken at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    repo_url: String,
    sha: String,
}

impl SourceRef {
    pub fn new(repo_url: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into().trim_end_matches('/').to_string(),
            sha: sha.into(),
        }
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn sha(&self) -> &str {
        &self.sha
    }

    /// Link to lines `start..=end` of `file` at this commit.
    pub fn permalink(&self, file: &str, start: u32, end: u32) -> String {
        format!(
            "{}/blob/{}/{}#L{start}-L{end}",
            self.repo_url,
            self.sha,
            file.trim_start_matches('/')
        )
    }
}

/// One marker occurrence in the diff.
///
/// The title is the only key used to match work items; two unrelated markers
/// with the same text are indistinguishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoItem {
    title: String,
    file: String,
    line: u32,
    start_line: u32,
    end_line: u32,
    diff_type: DiffType,
    labels: Vec<String>,
    body: String,
}

impl TodoItem {
    /// Starts building items that share a source and context window.
    pub fn builder(source: &SourceRef, window: ContextWindow) -> TodoItemBuilder<'_> {
        TodoItemBuilder { source, window }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn diff_type(&self) -> DiffType {
        self.diff_type
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Rendered HTML body: title, location and permalink.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Body with an attribution line when the author is known.
    pub fn description(&self, author: Option<&str>) -> String {
        match author.map(str::trim).filter(|a| !a.is_empty()) {
            Some(author) => format!("{}<br><br>Marked by {author}", self.body),
            None => self.body.clone(),
        }
    }
}

impl fmt::Display for TodoItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}:{} (Labels: {})",
            self.title,
            self.file,
            self.line,
            self.labels.join(", ")
        )
    }
}

/// Assembles [`TodoItem`]s for one diff run.
#[derive(Debug, Clone, Copy)]
pub struct TodoItemBuilder<'a> {
    source: &'a SourceRef,
    window: ContextWindow,
}

impl TodoItemBuilder<'_> {
    pub fn build(
        &self,
        title: impl Into<String>,
        line: u32,
        file: impl Into<String>,
        diff_type: DiffType,
        labels: Vec<String>,
    ) -> TodoItem {
        let title = title.into();
        let file = file.into();
        let (start_line, end_line) = self.window.range(line);
        let link = self.source.permalink(&file, start_line, end_line);
        let body = format!(
            "<b>{title}</b> <br>{file}:{line}<br><br><a href=\"{link}\">Visit github</a><br>"
        );

        TodoItem {
            title,
            file,
            line,
            start_line,
            end_line,
            diff_type,
            labels,
            body,
        }
    }
}
