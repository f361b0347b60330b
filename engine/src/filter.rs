//! Path inclusion and exclusion for diff file blocks.
//!
//! Every file block in a diff is checked once, when its header is seen.
//! Prefix matching is ASCII case-insensitive. The included list has two
//! roles depending on whether an excluded list is present:
//!
//! | excluded | included | accepted when |
//! |----------|----------|---------------|
//! | non-empty | empty | path matches no excluded prefix |
//! | empty | non-empty | path matches some included prefix |
//! | non-empty | non-empty | path matches no excluded prefix, or matches an included one |
//! | empty | empty | always |
//!
//! # Example
//!
//! ```
//! use todoticket_engine::filter::include;
//!
//! let excluded = vec!["vendor/".to_string()];
//! let included = vec!["vendor/ours/".to_string()];
//!
//! assert!(!include("vendor/lib.rs", &included, &excluded));
//! assert!(include("vendor/ours/lib.rs", &included, &excluded));
//! assert!(include("src/lib.rs", &included, &excluded));
//! ```

use regex::Regex;

use crate::error::{compile_case_insensitive, PatternError};

/// Returns whether `path` participates given the prefix lists.
///
/// A leading `/` on a prefix is ignored, since diff paths are relative to the
/// repository root.
pub fn include(path: &str, included: &[String], excluded: &[String]) -> bool {
    let is_excluded = || excluded.iter().any(|prefix| starts_with_ignore_case(path, prefix));
    let is_included = || included.iter().any(|prefix| starts_with_ignore_case(path, prefix));

    match (included.is_empty(), excluded.is_empty()) {
        (true, false) => !is_excluded(),
        (false, true) => is_included(),
        (false, false) => !is_excluded() || is_included(),
        (true, true) => true,
    }
}

fn starts_with_ignore_case(path: &str, prefix: &str) -> bool {
    let prefix = prefix.strip_prefix('/').unwrap_or(prefix);
    path.len() >= prefix.len()
        && path.is_char_boundary(prefix.len())
        && path[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// How the prefix lists combine, mostly for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// No lists configured; every file is scanned.
    All,
    /// Only excluded prefixes; everything else is scanned.
    ExcludeOnly,
    /// Only included prefixes; nothing else is scanned.
    IncludeOnly,
    /// Excluded prefixes with included exceptions.
    ExcludeWithExceptions,
}

impl FilterMode {
    /// One-sentence description for the startup report.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::All => "All found TODOs are handled.",
            Self::ExcludeOnly => {
                "All found TODOs excluding TODOs in files under excluded paths are handled."
            }
            Self::IncludeOnly => "Only TODOs in files under included paths are handled.",
            Self::ExcludeWithExceptions => {
                "All found TODOs excluding TODOs in files under excluded paths are handled \
                 (included paths are exceptions to the exclusions)."
            }
        }
    }
}

/// Prefix lists plus an optional file-name pattern.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    included: Vec<String>,
    excluded: Vec<String>,
    file_pattern: Option<Regex>,
}

impl PathFilter {
    /// Creates a filter from prefix lists. Empty entries are dropped.
    pub fn new(included: Vec<String>, excluded: Vec<String>) -> Self {
        Self {
            included: included.into_iter().filter(|p| !p.is_empty()).collect(),
            excluded: excluded.into_iter().filter(|p| !p.is_empty()).collect(),
            file_pattern: None,
        }
    }

    /// Adds a case-insensitive file-name pattern checked after the prefixes.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern does not compile.
    pub fn with_file_pattern(mut self, pattern: &str) -> Result<Self, PatternError> {
        self.file_pattern = Some(compile_case_insensitive("file", pattern)?);
        Ok(self)
    }

    /// Returns whether the file at `path` should be scanned.
    pub fn accepts(&self, path: &str) -> bool {
        if !include(path, &self.included, &self.excluded) {
            return false;
        }
        self.file_pattern
            .as_ref()
            .map_or(true, |re| re.is_match(path))
    }

    pub fn mode(&self) -> FilterMode {
        match (self.included.is_empty(), self.excluded.is_empty()) {
            (true, true) => FilterMode::All,
            (true, false) => FilterMode::ExcludeOnly,
            (false, true) => FilterMode::IncludeOnly,
            (false, false) => FilterMode::ExcludeWithExceptions,
        }
    }

    pub fn included(&self) -> &[String] {
        &self.included
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    pub fn file_pattern(&self) -> Option<&str> {
        self.file_pattern.as_ref().map(Regex::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn both_empty_accepts_everything() {
        assert!(include("src/main.rs", &[], &[]));
        assert!(include("", &[], &[]));
    }

    #[test]
    fn excluded_only_rejects_matching_prefix() {
        let excluded = list(&["vendor/", "Docs/"]);
        assert!(!include("vendor/lib.rs", &[], &excluded));
        assert!(!include("docs/readme.md", &[], &excluded));
        assert!(include("src/lib.rs", &[], &excluded));
    }

    #[test]
    fn included_only_accepts_matching_prefix() {
        let included = list(&["src/"]);
        assert!(include("src/lib.rs", &included, &[]));
        assert!(include("SRC/lib.rs", &included, &[]));
        assert!(!include("tests/it.rs", &included, &[]));
    }

    #[test]
    fn included_is_exception_over_excluded() {
        let excluded = list(&["vendor/"]);
        let included = list(&["vendor/ours/"]);

        assert!(!include("vendor/theirs/a.rs", &included, &excluded));
        assert!(include("vendor/ours/a.rs", &included, &excluded));
        // Neither list matches: the exclusion does not apply.
        assert!(include("src/a.rs", &included, &excluded));
    }

    #[test]
    fn leading_slash_on_prefix_is_ignored() {
        let excluded = list(&["/vendor"]);
        assert!(!include("vendor/a.rs", &[], &excluded));
    }

    #[test]
    fn prefix_longer_than_path_does_not_match() {
        let included = list(&["src/very/deep/"]);
        assert!(!include("src/", &included, &[]));
    }

    #[test]
    fn non_ascii_path_does_not_panic() {
        let included = list(&["ab"]);
        assert!(!include("\u{e9}t\u{e9}/x.rs", &included, &[]));
    }

    #[test]
    fn include_is_deterministic() {
        let included = list(&["src/"]);
        let excluded = list(&["src/gen/"]);
        for _ in 0..3 {
            assert!(include("src/gen/a.rs", &included, &excluded));
        }
    }

    #[test]
    fn path_filter_applies_file_pattern_after_prefixes() {
        let filter = PathFilter::new(list(&["src/"]), vec![])
            .with_file_pattern(r"\.rs$")
            .expect("valid pattern");

        assert!(filter.accepts("src/lib.RS"));
        assert!(!filter.accepts("src/readme.md"));
        assert!(!filter.accepts("tests/it.rs"));
    }

    #[test]
    fn path_filter_drops_empty_entries() {
        let filter = PathFilter::new(list(&["", "src/"]), list(&[""]));
        assert_eq!(filter.included(), &["src/".to_string()]);
        assert!(filter.excluded().is_empty());
        assert_eq!(filter.mode(), FilterMode::IncludeOnly);
    }

    #[test]
    fn path_filter_mode_covers_all_combinations() {
        assert_eq!(PathFilter::default().mode(), FilterMode::All);
        assert_eq!(
            PathFilter::new(vec![], list(&["a"])).mode(),
            FilterMode::ExcludeOnly
        );
        assert_eq!(
            PathFilter::new(list(&["a"]), list(&["b"])).mode(),
            FilterMode::ExcludeWithExceptions
        );
    }

    #[test]
    fn invalid_file_pattern_is_rejected() {
        let err = PathFilter::default().with_file_pattern("(").unwrap_err();
        assert_eq!(err.kind, "file");
    }
}
