//! Marker and inline-label extraction from diff content lines.
//!
//! A content line is a diff line whose first character is its change
//! prefix: `+` for added lines, `-` for removed lines, and a space for
//! unchanged context. The marker pattern is searched anywhere on the line;
//! when it has a capture group, group 1 is the title, otherwise the whole
//! match is.
//!
//! # Example
//!
//! ```
//! use todoticket_engine::marker::{DiffType, MarkerExtractor};
//!
//! let extractor = MarkerExtractor::new(r"(?://|#)\s*(TODO\b.*)")
//!     .unwrap()
//!     .with_fixed_label(Some("todo".to_string()));
//!
//! let marker = extractor.extract("+    // TODO: handle retries").unwrap();
//! assert_eq!(marker.title, "TODO: handle retries");
//! assert_eq!(marker.diff_type, DiffType::Addition);
//! assert_eq!(marker.labels, vec!["todo".to_string()]);
//! ```

use std::fmt;

use regex::{Captures, Regex};

use crate::error::{compile, PatternError};

/// Default marker pattern: a `//` or `#` comment starting with `TODO`.
pub const DEFAULT_MARKER_PATTERN: &str = r"(?://|#)\s*(TODO\b.*)";

/// Characters trimmed from both ends of a raw title by default.
pub const DEFAULT_TRIM_CHARS: &[char] = &[' ', ':', '"'];

/// Change polarity of a diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffType {
    /// Unchanged context line.
    None,
    /// Line added in the new version.
    Addition,
    /// Line removed from the old version.
    Deletion,
}

impl DiffType {
    /// Polarity from the line's first character.
    pub fn of_line(line: &str) -> Self {
        match line.chars().next() {
            Some('+') => Self::Addition,
            Some('-') => Self::Deletion,
            _ => Self::None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Self::None => ' ',
            Self::Addition => '+',
            Self::Deletion => '-',
        }
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Addition => write!(f, "addition"),
            Self::Deletion => write!(f, "deletion"),
        }
    }
}

/// A marker found on an added or removed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub title: String,
    pub labels: Vec<String>,
    pub diff_type: DiffType,
}

/// Inline label pattern and the pattern used to strip labels from titles.
#[derive(Debug, Clone)]
pub struct LabelPattern {
    find: Regex,
    replace: Regex,
}

impl LabelPattern {
    /// Creates a label pattern. When `replace` is `None` the find pattern
    /// doubles as the replacement pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if either pattern does not compile.
    pub fn new(find: &str, replace: Option<&str>) -> Result<Self, PatternError> {
        let find_re = compile("label", find)?;
        let replace_re = match replace {
            Some(pattern) => compile("label replace", pattern)?,
            None => find_re.clone(),
        };
        Ok(Self {
            find: find_re,
            replace: replace_re,
        })
    }

    /// All non-overlapping label matches in `line`, in order.
    pub fn labels(&self, line: &str) -> Vec<String> {
        self.find
            .captures_iter(line)
            .map(|caps| preferred_group(&caps).to_string())
            .collect()
    }

    /// Removes label text from `title`.
    pub fn strip(&self, title: &str) -> String {
        self.replace.replace_all(title, "").into_owned()
    }

    pub fn find_pattern(&self) -> &str {
        self.find.as_str()
    }

    pub fn replace_pattern(&self) -> &str {
        self.replace.as_str()
    }
}

/// Group 1 if the pattern has one and it participated, else the whole match.
fn preferred_group<'h>(caps: &Captures<'h>) -> &'h str {
    caps.get(1)
        .or_else(|| caps.get(0))
        .map_or("", |m| m.as_str())
}

/// Detects markers on diff content lines.
#[derive(Debug, Clone)]
pub struct MarkerExtractor {
    marker: Regex,
    labels: Option<LabelPattern>,
    fixed_label: Option<String>,
    trim_chars: Vec<char>,
}

impl MarkerExtractor {
    /// Creates an extractor for `pattern` with default trim characters and
    /// no labels.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        Ok(Self {
            marker: compile("marker", pattern)?,
            labels: None,
            fixed_label: None,
            trim_chars: DEFAULT_TRIM_CHARS.to_vec(),
        })
    }

    #[must_use]
    pub fn with_label_pattern(mut self, labels: Option<LabelPattern>) -> Self {
        self.labels = labels;
        self
    }

    /// Sets the label attached to every marker ahead of inline labels.
    #[must_use]
    pub fn with_fixed_label(mut self, label: Option<String>) -> Self {
        self.fixed_label = label.filter(|l| !l.is_empty());
        self
    }

    /// Sets the separator characters trimmed from titles. An empty set keeps
    /// the defaults.
    #[must_use]
    pub fn with_trim_chars(mut self, chars: Vec<char>) -> Self {
        if !chars.is_empty() {
            self.trim_chars = chars;
        }
        self
    }

    /// Extracts a marker from a content line.
    ///
    /// Returns `None` when the line has no marker or is a context line.
    pub fn extract(&self, line: &str) -> Option<Marker> {
        let caps = self.marker.captures(line)?;
        let diff_type = DiffType::of_line(line);
        if diff_type == DiffType::None {
            return None;
        }

        let mut title = preferred_group(&caps)
            .trim_matches(self.trim_chars.as_slice())
            .to_string();

        let mut labels: Vec<String> = self.fixed_label.iter().cloned().collect();
        if let Some(pattern) = &self.labels {
            labels.extend(pattern.labels(line));
            title = pattern.strip(&title);
        }

        Some(Marker {
            title: title.trim().to_string(),
            labels,
            diff_type,
        })
    }

    pub fn marker_pattern(&self) -> &str {
        self.marker.as_str()
    }

    pub fn label_pattern(&self) -> Option<&LabelPattern> {
        self.labels.as_ref()
    }

    pub fn fixed_label(&self) -> Option<&str> {
        self.fixed_label.as_deref()
    }

    pub fn trim_chars(&self) -> &[char] {
        &self.trim_chars
    }
}
