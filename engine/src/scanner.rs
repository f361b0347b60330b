//! Unified diff scanner.
//!
//! The scanner is a small state machine fed one diff line at a time. It
//! tracks which file block it is in and the new-file line number of the
//! next content line, and hands content lines back to the caller.
//!
//! # States
//!
//! - [`ScanState::Seeking`]: no file selected; lines are ignored until a
//!   `diff --git` header names a file the [`PathFilter`] accepts.
//! - [`ScanState::InFile`]: inside an accepted file block. The cursor is
//!   unset until the first `@@` hunk header, so the `index`, `---` and `+++`
//!   metadata lines are never treated as content.
//!
//! # Line Numbers
//!
//! A hunk header `@@ -a,b +c,d @@` sets the cursor to `c`. Every content
//! line takes the current cursor value and then advances it by one, except
//! removed (`-`) lines, which do not occupy a line in the new file.
//!
//! # Example
//!
//! ```
//! use todoticket_engine::config::ScanConfig;
//! use todoticket_engine::scanner::extract_todos;
//! use todoticket_engine::todo::SourceRef;
//!
//! let diff = "\
//! diff --git a/src/x.py b/src/x.py
//! @@ -1,3 +1,4 @@
//! +  # TODO fix bug
//! ";
//! let config = ScanConfig::with_defaults().unwrap();
//! let source = SourceRef::new("https://github.com/acme/app", "abc123");
//!
//! let items = extract_todos(diff, &config, &source);
//! assert_eq!(items.len(), 1);
//! assert_eq!(items[0].title(), "TODO fix bug");
//! assert_eq!(items[0].file(), "src/x.py");
//! assert_eq!(items[0].line(), 1);
//! ```

use tracing::{debug, trace, warn};

use crate::config::ScanConfig;
use crate::filter::PathFilter;
use crate::todo::{SourceRef, TodoItem};

const FILE_HEADER_PREFIX: &str = "diff --git ";
const HUNK_HEADER_PREFIX: &str = "@@ ";
const NO_NEWLINE_PREFIX: char = '\\';

/// Scanner position within the diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    /// Outside any accepted file block.
    Seeking,

    /// Inside an accepted file block.
    InFile {
        /// New-side path of the file, relative to the repository root.
        file: String,
        /// New-file line number of the next content line, once a hunk started.
        cursor: Option<u32>,
    },
}

/// How a single diff line is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// `diff --git a/<old> b/<new>` with the parsed new path.
    FileHeader(&'a str),
    /// A `diff --git` line whose new path could not be parsed.
    MalformedFileHeader,
    /// `@@ -a,b +c,d @@` with the parsed new-side start line `c`.
    HunkHeader(u32),
    /// An `@@` line whose new-side start could not be parsed.
    MalformedHunkHeader,
    /// `\ No newline at end of file`.
    NoNewlineMarker,
    /// Anything else.
    Content,
}

impl<'a> LineKind<'a> {
    /// Classifies a diff line without regard to scanner state.
    pub fn classify(line: &'a str) -> Self {
        if starts_with_ignore_case(line, FILE_HEADER_PREFIX) {
            return match parse_file_header(line) {
                Some(path) => Self::FileHeader(path),
                None => Self::MalformedFileHeader,
            };
        }
        if line.starts_with(HUNK_HEADER_PREFIX) {
            return match parse_hunk_header(line) {
                Some(start) => Self::HunkHeader(start),
                None => Self::MalformedHunkHeader,
            };
        }
        if line.starts_with(NO_NEWLINE_PREFIX) {
            return Self::NoNewlineMarker;
        }
        Self::Content
    }
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len()
        && line.is_char_boundary(prefix.len())
        && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Parses the new-side path from a `diff --git` header.
///
/// When both sides name the same path the header is split at its midpoint,
/// so paths containing ` b/` parse. Otherwise (renames) the last ` b/`
/// separates the paths. Git quotes paths with unusual characters; those
/// quotes are removed.
pub fn parse_file_header(line: &str) -> Option<&str> {
    let rest = line.get(FILE_HEADER_PREFIX.len()..)?.trim_end();

    let path = if let Some(quoted) = rest.strip_suffix('"') {
        let start = quoted.rfind(" \"b/")?;
        &quoted[start + 4..]
    } else if let Some(same) = split_unchanged_path(rest) {
        same
    } else {
        let start = rest.rfind(" b/")?;
        &rest[start + 3..]
    };

    (!path.is_empty()).then_some(path)
}

/// `a/P b/P` -> `P`.
fn split_unchanged_path(rest: &str) -> Option<&str> {
    let inner = rest.strip_prefix("a/")?;
    let paths_len = inner.len().checked_sub(3)?;
    if paths_len == 0 || paths_len % 2 != 0 {
        return None;
    }
    let half = paths_len / 2;
    let old = inner.get(..half)?;
    let new = inner.get(half..)?.strip_prefix(" b/")?;
    (old == new).then_some(new)
}

/// Parses the new-side start line from a `@@ -a,b +c,d @@` hunk header.
pub fn parse_hunk_header(line: &str) -> Option<u32> {
    let body = line.strip_prefix(HUNK_HEADER_PREFIX)?;
    let end = body.find(" @@")?;
    let new_range = body[..end]
        .split_whitespace()
        .find_map(|part| part.strip_prefix('+'))?;
    let start = new_range.split(',').next()?;
    start.parse().ok()
}

/// A content line attributed to a file and new-file line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLine<'s, 'l> {
    pub file: &'s str,
    pub line_number: u32,
    /// The full diff line, change prefix included.
    pub text: &'l str,
}

/// Line-at-a-time diff state machine.
#[derive(Debug, Clone)]
pub struct DiffScanner<'f> {
    filter: &'f PathFilter,
    max_line_length: usize,
    state: ScanState,
}

impl<'f> DiffScanner<'f> {
    /// Creates a scanner. A `max_line_length` of zero disables the length guard.
    pub fn new(filter: &'f PathFilter, max_line_length: usize) -> Self {
        Self {
            filter,
            max_line_length,
            state: ScanState::Seeking,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Feeds one line and returns it if it is a content line to scan.
    pub fn step<'s, 'l>(&'s mut self, line: &'l str) -> Option<ContentLine<'s, 'l>> {
        if self.exceeds_max_length(line) {
            trace!(length = line.len(), "Skipping over-length diff line");
            self.advance_cursor(line);
            return None;
        }

        match LineKind::classify(line) {
            LineKind::FileHeader(path) => {
                self.state = if self.filter.accepts(path) {
                    debug!(file = %path, "Scanning file");
                    ScanState::InFile {
                        file: path.to_string(),
                        cursor: None,
                    }
                } else {
                    debug!(file = %path, "File excluded by path filter");
                    ScanState::Seeking
                };
                None
            }
            LineKind::MalformedFileHeader => {
                warn!(line = %line, "Unparseable diff header, skipping file block");
                self.state = ScanState::Seeking;
                None
            }
            LineKind::HunkHeader(start) => {
                if let ScanState::InFile { cursor, .. } = &mut self.state {
                    *cursor = Some(start);
                }
                None
            }
            LineKind::MalformedHunkHeader => {
                if matches!(self.state, ScanState::InFile { .. }) {
                    warn!(line = %line, "Unparseable hunk header, keeping line cursor");
                }
                None
            }
            LineKind::NoNewlineMarker => None,
            LineKind::Content => match &mut self.state {
                ScanState::InFile {
                    file,
                    cursor: Some(cursor),
                } => {
                    let line_number = *cursor;
                    if !line.starts_with('-') {
                        *cursor = cursor.saturating_add(1);
                    }
                    Some(ContentLine {
                        file: file.as_str(),
                        line_number,
                        text: line,
                    })
                }
                _ => None,
            },
        }
    }

    fn exceeds_max_length(&self, line: &str) -> bool {
        self.max_line_length > 0
            && line.len() > self.max_line_length
            && line.chars().count() > self.max_line_length
    }

    fn advance_cursor(&mut self, line: &str) {
        if line.starts_with('-') {
            return;
        }
        if let ScanState::InFile {
            cursor: Some(cursor),
            ..
        } = &mut self.state
        {
            *cursor = cursor.saturating_add(1);
        }
    }
}

/// Scans a whole diff and builds a [`TodoItem`] for every added or removed
/// marker.
pub fn extract_todos(diff: &str, config: &ScanConfig, source: &SourceRef) -> Vec<TodoItem> {
    let mut scanner = DiffScanner::new(config.filter(), config.max_line_length());
    let builder = TodoItem::builder(source, config.context());
    let mut items = Vec::new();

    for line in diff.lines() {
        let Some(content) = scanner.step(line) else {
            continue;
        };
        let Some(marker) = config.extractor().extract(content.text) else {
            continue;
        };

        debug!(
            title = %marker.title,
            file = %content.file,
            line = content.line_number,
            diff_type = %marker.diff_type,
            "Found marker"
        );

        items.push(builder.build(
            marker.title,
            content.line_number,
            content.file,
            marker.diff_type,
            marker.labels,
        ));
    }

    items
}
