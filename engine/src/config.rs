//! Scan settings shared by the scanner and the marker extractor.
//!
//! Values arrive already loaded (the action crate reads them from the
//! environment); this module compiles patterns and clamps numbers.
//!
//! | Setting | Default | Range |
//! |---------|---------|-------|
//! | marker pattern | [`DEFAULT_MARKER_PATTERN`] | any regex |
//! | fixed label | none | |
//! | trim characters | space, `:`, `"` | |
//! | lines before / after | 3 / 7 | 0-15 |
//! | max line length | 255 | at least 1 |

use crate::error::PatternError;
use crate::filter::PathFilter;
use crate::marker::{LabelPattern, MarkerExtractor, DEFAULT_MARKER_PATTERN};
use crate::todo::ContextWindow;

/// Default maximum scanned diff line length, in characters.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 255;

/// Minimum maximum line length.
pub const MIN_MAX_LINE_LENGTH: usize = 1;

/// Everything needed to turn a diff into todo items.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    extractor: MarkerExtractor,
    filter: PathFilter,
    context: ContextWindow,
    max_line_length: usize,
}

impl ScanConfig {
    /// Creates a configuration for `marker_pattern` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern does not compile.
    pub fn new(marker_pattern: &str) -> Result<Self, PatternError> {
        Ok(Self {
            extractor: MarkerExtractor::new(marker_pattern)?,
            filter: PathFilter::default(),
            context: ContextWindow::default(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        })
    }

    /// Creates a configuration using [`DEFAULT_MARKER_PATTERN`] and the fixed
    /// label `todo`.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the default pattern does not compile.
    pub fn with_defaults() -> Result<Self, PatternError> {
        Ok(Self::new(DEFAULT_MARKER_PATTERN)?.with_fixed_label(Some("todo".to_string())))
    }

    /// Sets the inline label pattern and its optional replacement pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if either pattern does not compile.
    pub fn with_labels(mut self, find: &str, replace: Option<&str>) -> Result<Self, PatternError> {
        let labels = LabelPattern::new(find, replace)?;
        self.extractor = self.extractor.with_label_pattern(Some(labels));
        Ok(self)
    }

    #[must_use]
    pub fn with_fixed_label(mut self, label: Option<String>) -> Self {
        self.extractor = self.extractor.with_fixed_label(label);
        self
    }

    #[must_use]
    pub fn with_trim_chars(mut self, chars: Vec<char>) -> Self {
        self.extractor = self.extractor.with_trim_chars(chars);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: ContextWindow) -> Self {
        self.context = context;
        self
    }

    /// Sets the maximum scanned line length, raising it to at least 1.
    #[must_use]
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max.max(MIN_MAX_LINE_LENGTH);
        self
    }

    pub fn extractor(&self) -> &MarkerExtractor {
        &self.extractor
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    pub fn context(&self) -> ContextWindow {
        self.context
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }
}
