//! Configuration module for the todoticket action.
//!
//! Settings come from the environment the way a GitHub Actions runner
//! provides them: action inputs as `INPUT_*` variables, and the push event
//! payload as a JSON file named by `GITHUB_EVENT_PATH`. Explicit inputs take
//! precedence over values from the event.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `GITHUB_EVENT_PATH` | No | - | Push event JSON (repository, commits, pusher) |
//! | `INPUT_REPOSITORY` | Yes* | event | `owner/repo` |
//! | `INPUT_SHA` | Yes* | event `after` | Head commit |
//! | `INPUT_BASE_SHA` | Yes* | event `before` | Base commit |
//! | `INPUT_TOKEN` | Yes | - | GitHub token |
//! | `INPUT_AZDO_TOKEN` | Yes | - | Azure DevOps personal access token |
//! | `INPUT_AZDO_ORGANIZATION` | Yes | - | Azure DevOps organization |
//! | `INPUT_AZDO_PROJECT` | Yes | - | Azure DevOps project |
//! | `INPUT_AZDO_TEAM` | No | project | Team owning the board |
//! | `INPUT_AZDO_CLOSED` | No | `Closed` | Board column for closed items |
//! | `INPUT_AZDO_NEW_COLUMN` | No | - | Board column for new items |
//! | `INPUT_AZDO_LANE` | No | - | Board lane for new items |
//! | `INPUT_AZDO_WORK_ITEM_TYPE` | No | `Bug` | Type of created work items |
//! | `INPUT_AZDO_URL` | No | `https://dev.azure.com` | Azure DevOps base URL |
//! | `INPUT_TODO_PATTERN` | No | `(?://\|#)\s*(TODO\b.*)` | Marker regex |
//! | `INPUT_LABELS_PATTERN` | No | - | Inline label regex |
//! | `INPUT_LABELS_REPLACE_PATTERN` | No | labels pattern | Regex removed from titles |
//! | `INPUT_GH_LABEL` | No | `todo` | Label added to every item |
//! | `INPUT_TRIM` | No | `` :"`` | Characters trimmed from titles |
//! | `INPUT_FILE_PATTERN` | No | - | File path regex |
//! | `INPUT_TIMEOUT` | No | 1000 | Milliseconds between writes (1-3000) |
//! | `INPUT_IGNORED_LINES_LENGTH` | No | 255 | Longer diff lines are skipped (min 1) |
//! | `INPUT_LINES_BEFORE` | No | 3 | Permalink lines before a marker (0-15) |
//! | `INPUT_LINES_AFTER` | No | 7 | Permalink lines after a marker (0-15) |
//! | `INPUT_INCLUDED_PATHS` | No | - | `\|`-separated path prefixes |
//! | `INPUT_EXCLUDED_PATHS` | No | - | `\|`-separated path prefixes |
//! | `INPUT_NOPUBLISH` | No | `false` | Scan and report without writing |
//! | `GITHUB_API_URL` | No | `https://api.github.com` | GitHub REST API |
//! | `GITHUB_SERVER_URL` | No | `https://github.com` | GitHub web URL for permalinks |
//!
//! \* Required unless the event payload supplies it.
//!
//! Blank values count as unset. Numeric values outside their range are
//! clamped; values that are not numbers are rejected. Boolean inputs other
//! than `true`/`false` are read as `false`.
//!
//! # Example
//!
//! ```no_run
//! use todoticket_action::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Repository: {}", config.repository);
//! ```

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use todoticket_engine::config::{ScanConfig, DEFAULT_MAX_LINE_LENGTH, MIN_MAX_LINE_LENGTH};
use todoticket_engine::filter::PathFilter;
use todoticket_engine::marker::{DEFAULT_MARKER_PATTERN, DEFAULT_TRIM_CHARS};
use todoticket_engine::pacing::{PacingDelay, DEFAULT_PACING_MS};
use todoticket_engine::todo::{
    ContextWindow, SourceRef, DEFAULT_LINES_AFTER, DEFAULT_LINES_BEFORE, MAX_CONTEXT_LINES,
};
use todoticket_engine::PatternError;
use tracing::warn;

/// Default label attached to every item.
const DEFAULT_FIXED_LABEL: &str = "todo";

/// Default board column for closed items.
const DEFAULT_CLOSED_COLUMN: &str = "Closed";

/// Default type of created work items.
const DEFAULT_WORK_ITEM_TYPE: &str = "Bug";

/// Default GitHub REST API URL.
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default GitHub web URL.
const DEFAULT_GITHUB_SERVER_URL: &str = "https://github.com";

/// Default Azure DevOps URL.
const DEFAULT_AZDO_URL: &str = "https://dev.azure.com";

/// Separator of the path prefix lists.
const PATH_LIST_SEPARATOR: char = '|';

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// The push event file could not be read or parsed.
    #[error("failed to load event file {path}: {message}")]
    EventFile { path: String, message: String },
}

/// The parts of a GitHub push event payload the action uses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushEvent {
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub forced: bool,
    #[serde(default)]
    pub pusher: Option<Pusher>,
    #[serde(default)]
    pub repository: Option<EventRepository>,
}

/// Account that pushed the commits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pusher {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Repository the push went to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRepository {
    #[serde(default)]
    pub full_name: Option<String>,
}

impl PushEvent {
    /// Loads an event payload from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EventFile`] if the file cannot be read or is not
    /// valid event JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let event_file_error = |message: String| ConfigError::EventFile {
            path: path.display().to_string(),
            message,
        };

        let contents = fs::read_to_string(path).map_err(|e| event_file_error(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| event_file_error(e.to_string()))
    }

    /// `Name <email>` of the pusher, as far as the payload provides it.
    pub fn author(&self) -> Option<String> {
        let pusher = self.pusher.as_ref()?;
        let name = pusher.name.as_deref().filter(|n| !n.trim().is_empty());
        let email = pusher.email.as_deref().filter(|e| !e.trim().is_empty());
        match (name, email) {
            (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
            (Some(name), None) => Some(name.to_string()),
            (None, Some(email)) => Some(format!("<{email}>")),
            (None, None) => None,
        }
    }
}

/// Settings that control how a diff is scanned.
///
/// Patterns are kept as text here and compiled by [`ScanSettings::scan_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub marker_pattern: String,
    pub labels_pattern: Option<String>,
    pub labels_replace_pattern: Option<String>,
    pub fixed_label: Option<String>,
    pub trim_chars: Vec<char>,
    pub file_pattern: Option<String>,
    pub included_paths: Vec<String>,
    pub excluded_paths: Vec<String>,
    pub lines_before: u32,
    pub lines_after: u32,
    pub max_line_length: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            marker_pattern: DEFAULT_MARKER_PATTERN.to_string(),
            labels_pattern: None,
            labels_replace_pattern: None,
            fixed_label: Some(DEFAULT_FIXED_LABEL.to_string()),
            trim_chars: DEFAULT_TRIM_CHARS.to_vec(),
            file_pattern: None,
            included_paths: Vec::new(),
            excluded_paths: Vec::new(),
            lines_before: DEFAULT_LINES_BEFORE,
            lines_after: DEFAULT_LINES_AFTER,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ScanSettings {
    /// Reads the scan inputs. None of them is required.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a numeric input is not a
    /// number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let trim_chars = match optional("INPUT_TRIM") {
            Some(val) => val.chars().collect(),
            None => defaults.trim_chars,
        };

        Ok(Self {
            marker_pattern: optional("INPUT_TODO_PATTERN").unwrap_or(defaults.marker_pattern),
            labels_pattern: optional("INPUT_LABELS_PATTERN"),
            labels_replace_pattern: optional("INPUT_LABELS_REPLACE_PATTERN"),
            fixed_label: optional("INPUT_GH_LABEL").or(defaults.fixed_label),
            trim_chars,
            file_pattern: optional("INPUT_FILE_PATTERN"),
            included_paths: path_list("INPUT_INCLUDED_PATHS"),
            excluded_paths: path_list("INPUT_EXCLUDED_PATHS"),
            lines_before: clamped_number(
                "INPUT_LINES_BEFORE",
                DEFAULT_LINES_BEFORE,
                0,
                MAX_CONTEXT_LINES,
            )?,
            lines_after: clamped_number(
                "INPUT_LINES_AFTER",
                DEFAULT_LINES_AFTER,
                0,
                MAX_CONTEXT_LINES,
            )?,
            max_line_length: clamped_number(
                "INPUT_IGNORED_LINES_LENGTH",
                DEFAULT_MAX_LINE_LENGTH,
                MIN_MAX_LINE_LENGTH,
                usize::MAX,
            )?,
        })
    }

    /// Compiles the settings into an engine [`ScanConfig`].
    ///
    /// A replace pattern without a labels pattern is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if any pattern does not compile.
    pub fn scan_config(&self) -> Result<ScanConfig, PatternError> {
        let mut filter = PathFilter::new(self.included_paths.clone(), self.excluded_paths.clone());
        if let Some(pattern) = &self.file_pattern {
            filter = filter.with_file_pattern(pattern)?;
        }

        let mut config = ScanConfig::new(&self.marker_pattern)?
            .with_fixed_label(self.fixed_label.clone())
            .with_trim_chars(self.trim_chars.clone())
            .with_filter(filter)
            .with_context(ContextWindow::new(self.lines_before, self.lines_after))
            .with_max_line_length(self.max_line_length);

        if let Some(find) = &self.labels_pattern {
            config = config.with_labels(find, self.labels_replace_pattern.as_deref())?;
        }

        Ok(config)
    }
}

/// GitHub connection settings.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_url: String,
    pub server_url: String,
    pub token: String,
}

/// Azure DevOps connection and board placement settings.
#[derive(Debug, Clone)]
pub struct AzdoConfig {
    pub base_url: String,
    pub organization: String,
    pub project: String,
    pub team: String,
    pub token: String,
    /// Column closed items move to. When `None`, items are closed through
    /// their `System.State`.
    pub closed_column: Option<String>,
    pub new_column: Option<String>,
    pub lane: Option<String>,
    pub work_item_type: String,
}

/// Configuration for a sync run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository as `owner/repo`.
    pub repository: String,

    /// Commit the diff starts from.
    pub base_sha: String,

    /// Commit the diff ends at; permalinks point here.
    pub head_sha: String,

    /// Pusher attribution appended to work item descriptions.
    pub author: Option<String>,

    /// Whether the push was a force push.
    pub forced: bool,

    pub github: GithubConfig,
    pub azdo: AzdoConfig,
    pub scan: ScanSettings,

    /// Delay between work item writes.
    pub pacing: PacingDelay,

    /// Scan and report only; no work item is touched.
    pub no_publish: bool,
}

impl Config {
    /// Creates a new `Config` from the event payload and the environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - the event file named by `GITHUB_EVENT_PATH` cannot be loaded
    /// - the repository or either commit is known neither from inputs nor
    ///   from the event
    /// - a token, the organization or the project is not set
    /// - a numeric input cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        let event = match optional("GITHUB_EVENT_PATH") {
            Some(path) => PushEvent::load(Path::new(&path))?,
            None => PushEvent::default(),
        };

        // Inputs override the event payload.
        let repository = optional("INPUT_REPOSITORY")
            .or_else(|| {
                event
                    .repository
                    .as_ref()
                    .and_then(|r| r.full_name.clone())
            })
            .ok_or_else(|| ConfigError::MissingEnvVar("INPUT_REPOSITORY".to_string()))?;
        let head_sha = optional("INPUT_SHA")
            .or_else(|| event.after.clone())
            .ok_or_else(|| ConfigError::MissingEnvVar("INPUT_SHA".to_string()))?;
        let base_sha = optional("INPUT_BASE_SHA")
            .or_else(|| event.before.clone())
            .ok_or_else(|| ConfigError::MissingEnvVar("INPUT_BASE_SHA".to_string()))?;

        let github = GithubConfig {
            api_url: optional("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            server_url: optional("GITHUB_SERVER_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_SERVER_URL.to_string()),
            token: required("INPUT_TOKEN")?,
        };

        let project = required("INPUT_AZDO_PROJECT")?;
        let azdo = AzdoConfig {
            base_url: optional("INPUT_AZDO_URL").unwrap_or_else(|| DEFAULT_AZDO_URL.to_string()),
            organization: required("INPUT_AZDO_ORGANIZATION")?,
            team: optional("INPUT_AZDO_TEAM").unwrap_or_else(|| project.clone()),
            project,
            token: required("INPUT_AZDO_TOKEN")?,
            closed_column: closed_column(),
            new_column: optional("INPUT_AZDO_NEW_COLUMN"),
            lane: optional("INPUT_AZDO_LANE"),
            work_item_type: optional("INPUT_AZDO_WORK_ITEM_TYPE")
                .unwrap_or_else(|| DEFAULT_WORK_ITEM_TYPE.to_string()),
        };

        let pacing = PacingDelay::from_millis(clamped_number(
            "INPUT_TIMEOUT",
            DEFAULT_PACING_MS,
            0,
            u64::MAX,
        )?);

        Ok(Self {
            repository,
            base_sha,
            head_sha,
            author: event.author(),
            forced: event.forced,
            github,
            azdo,
            scan: ScanSettings::from_env()?,
            pacing,
            no_publish: flag("INPUT_NOPUBLISH"),
        })
    }

    /// Web location of the head commit, for permalinks.
    pub fn source_ref(&self) -> SourceRef {
        SourceRef::new(
            format!(
                "{}/{}",
                self.github.server_url.trim_end_matches('/'),
                self.repository
            ),
            self.head_sha.clone(),
        )
    }
}

/// Masks all but the first and last character of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => String::new(),
        n if n <= 2 => "*".repeat(n),
        n => format!("{}{}{}", chars[0], "*".repeat(n - 2), chars[n - 1]),
    }
}

/// Value of `key` unless it is unset or blank.
fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &str) -> Result<String, ConfigError> {
    optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// `INPUT_AZDO_CLOSED`, where an explicitly empty value selects state-based
/// closing.
fn closed_column() -> Option<String> {
    match env::var("INPUT_AZDO_CLOSED") {
        Ok(val) if val.trim().is_empty() => None,
        Ok(val) => Some(val),
        Err(_) => Some(DEFAULT_CLOSED_COLUMN.to_string()),
    }
}

fn path_list(key: &str) -> Vec<String> {
    optional(key)
        .map(|val| {
            val.split(PATH_LIST_SEPARATOR)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Parses a numeric input and clamps it into `min..=max`. Negative numbers
/// clamp to `min`.
fn clamped_number<T>(key: &str, default: T, min: T, max: T) -> Result<T, ConfigError>
where
    T: TryFrom<i64> + Ord + Copy,
{
    let Some(val) = optional(key) else {
        return Ok(default);
    };

    let parsed = val
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected integer, got '{val}'"),
        })?;

    let value = T::try_from(parsed).unwrap_or(if parsed < 0 { min } else { max });
    Ok(value.clamp(min, max))
}

/// Boolean input. Anything other than `true`/`false` counts as `false`.
fn flag(key: &str) -> bool {
    let Some(val) = optional(key) else {
        return false;
    };
    match val.trim().to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => {
            warn!(key, value = %val, "Not a boolean, using false");
            false
        }
    }
}
