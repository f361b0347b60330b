//! Human-readable run report written to stdout.
//!
//! Structured logs go through `tracing`; this module prints what a person
//! reading the workflow log wants to see: the effective parameters (secrets
//! masked) and the markers found in the diff.

use std::io::{self, Write};

use todoticket_engine::filter::PathFilter;
use todoticket_engine::marker::DiffType;
use todoticket_engine::todo::TodoItem;

use crate::config::{mask_secret, Config, ScanSettings};

/// Line separating report sections.
pub const SEPARATOR: &str = "------------------------------------------";

/// Writes the effective configuration.
pub fn write_parameters<W: Write>(out: &mut W, config: &Config) -> io::Result<()> {
    writeln!(out, "{SEPARATOR}")?;
    writeln!(out, "Repository:\t{}", config.repository)?;
    writeln!(out, "Base SHA:\t{}", config.base_sha)?;
    writeln!(out, "Head SHA:\t{}", config.head_sha)?;
    if config.forced {
        writeln!(out, "Forced push:\tyes")?;
    }
    writeln!(out, "Token:\t{}", mask_secret(&config.github.token))?;
    writeln!(out, "AzDO Token:\t{}", mask_secret(&config.azdo.token))?;
    writeln!(
        out,
        "AzDO Org\\Project\\Team:\t{}\\{}\\{}",
        config.azdo.organization, config.azdo.project, config.azdo.team
    )?;
    writeln!(out, "AzDO Lane:\t{}", config.azdo.lane.as_deref().unwrap_or(""))?;
    writeln!(
        out,
        "AzDO Columns:\tNew: {}\tClosed: {}",
        config.azdo.new_column.as_deref().unwrap_or(""),
        config.azdo.closed_column.as_deref().unwrap_or("(state)")
    )?;
    writeln!(out, "AzDO Work item type:\t{}", config.azdo.work_item_type)?;
    writeln!(out, "Timeout:\t{}", config.pacing.as_millis())?;
    if config.no_publish {
        writeln!(out, "No publish:\tyes")?;
    }
    write_scan_settings(out, &config.scan)
}

/// Writes the settings that shape the scan.
pub fn write_scan_settings<W: Write>(out: &mut W, scan: &ScanSettings) -> io::Result<()> {
    writeln!(out, "TODO regular expression:\t{}", scan.marker_pattern)?;
    writeln!(
        out,
        "Inline label regular expression:\t{}",
        scan.labels_pattern.as_deref().unwrap_or("")
    )?;
    writeln!(
        out,
        "Inline label replace regular expression:\t{}",
        scan.labels_replace_pattern.as_deref().unwrap_or("")
    )?;
    writeln!(out, "GH Label:\t{}", scan.fixed_label.as_deref().unwrap_or(""))?;
    writeln!(
        out,
        "Trimmed Characters:\t{{{}}}",
        scan.trim_chars.iter().collect::<String>()
    )?;
    writeln!(out, "Snippet size:")?;
    writeln!(out, "Lines before todo:\t{}", scan.lines_before)?;
    writeln!(out, "Lines after todo:\t{}", scan.lines_after)?;
    writeln!(out, "Maximum processed line length:\t{}", scan.max_line_length)?;
    writeln!(
        out,
        "Regex to filter files:\t{}",
        scan.file_pattern.as_deref().unwrap_or("")
    )?;

    writeln!(out, "List of included paths:")?;
    for (i, prefix) in scan.included_paths.iter().enumerate() {
        writeln!(out, "{}:\t{prefix}", i + 1)?;
    }
    writeln!(out, "List of excluded paths:")?;
    for (i, prefix) in scan.excluded_paths.iter().enumerate() {
        writeln!(out, "{}:\t{prefix}", i + 1)?;
    }

    let filter = PathFilter::new(scan.included_paths.clone(), scan.excluded_paths.clone());
    writeln!(out, "{}", filter.mode().describe())
}

/// Writes the parsed markers, additions first.
pub fn write_todos<W: Write>(out: &mut W, items: &[TodoItem]) -> io::Result<()> {
    let additions: Vec<&TodoItem> = items
        .iter()
        .filter(|i| i.diff_type() == DiffType::Addition)
        .collect();
    let removals: Vec<&TodoItem> = items
        .iter()
        .filter(|i| i.diff_type() == DiffType::Deletion)
        .collect();

    writeln!(out, "{SEPARATOR}")?;
    writeln!(out, "Parsed new TODOs ({}):", additions.len())?;
    for item in additions {
        write_todo(out, item)?;
    }
    writeln!(out, "Parsed removed TODOs ({}):", removals.len())?;
    for item in removals {
        write_todo(out, item)?;
    }
    Ok(())
}

fn write_todo<W: Write>(out: &mut W, item: &TodoItem) -> io::Result<()> {
    writeln!(out, "{}\t{item}", item.diff_type().symbol())
}

#[cfg(test)]
mod tests {
    use super::*;
    use todoticket_engine::todo::{ContextWindow, SourceRef};

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).expect("write to vec");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn todos_are_grouped_by_polarity() {
        let source = SourceRef::new("https://github.com/acme/app", "abc");
        let builder = TodoItem::builder(&source, ContextWindow::default());
        let items = vec![
            builder.build("TODO old", 3, "a.rs", DiffType::Deletion, vec!["todo".into()]),
            builder.build("TODO new", 4, "a.rs", DiffType::Addition, vec!["todo".into()]),
        ];

        let text = render(|out| write_todos(out, &items));

        assert!(text.contains("Parsed new TODOs (1):\n+\tTODO new @ a.rs:4 (Labels: todo)\n"));
        assert!(text.contains("Parsed removed TODOs (1):\n-\tTODO old @ a.rs:3 (Labels: todo)\n"));
    }

    #[test]
    fn scan_settings_list_paths_and_mode() {
        let scan = ScanSettings {
            included_paths: vec!["vendor/ours/".to_string()],
            excluded_paths: vec!["vendor/".to_string()],
            ..ScanSettings::default()
        };

        let text = render(|out| write_scan_settings(out, &scan));

        assert!(text.contains("List of included paths:\n1:\tvendor/ours/\n"));
        assert!(text.contains("List of excluded paths:\n1:\tvendor/\n"));
        assert!(text.contains("Trimmed Characters:\t{ :\"}"));
        assert!(text.contains("(included paths are exceptions to the exclusions)"));
    }
}
