//! Comparison table for several coverage reports in one comment

use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;

use super::{badge_url, test_summary_table};
use crate::collect::{load_coverage, CollectOptions, CoverageReport};
use crate::junit::parse_test_results;
use crate::utils::{resolve_path, BadgeColor};

const TABLE_HEADER: &str = "<table><tr><th>Title</th><th>Coverage</th><th>Tests</th><th>Status</th></tr><tbody>";

/// One `title, coverage_path[, test_results_path]` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiFileEntry {
    pub title: String,
    pub coverage_path: String,
    pub test_results_path: Option<String>,
}

impl MultiFileEntry {
    /// `None` for lines without both a title and a coverage path
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split(',').map(str::trim);
        let title = parts.next().filter(|t| !t.is_empty())?;
        let coverage_path = parts.next().filter(|p| !p.is_empty())?;
        let test_results_path = parts.next().filter(|p| !p.is_empty()).map(str::to_string);

        Some(Self {
            title: title.to_string(),
            coverage_path: coverage_path.to_string(),
            test_results_path,
        })
    }
}

/// Rendered values for one row
#[derive(Debug, Clone, PartialEq)]
pub struct MultiFileRow {
    pub title: String,
    /// Coverage as displayed, e.g. `75.00%`
    pub coverage: String,
    pub color: BadgeColor,
    pub tests: String,
    pub status: &'static str,
}

impl MultiFileRow {
    fn failed(title: &str) -> Self {
        Self {
            title: title.to_string(),
            coverage: "0%".to_string(),
            color: BadgeColor::Red,
            tests: String::new(),
            status: status_label(0.0),
        }
    }

    pub fn to_html(&self) -> String {
        format!(
            "<tr><td>{}</td><td><img alt=\"Coverage\" src=\"{}\" /></td><td>{}</td><td>{}</td></tr>",
            crate::utils::escape_html(&self.title),
            badge_url("Coverage", &self.coverage, self.color),
            self.tests,
            self.status
        )
    }
}

/// Qualitative label for a coverage percentage
pub fn status_label(percentage: f64) -> &'static str {
    if percentage >= 90.0 {
        "🟢 Excellent"
    } else if percentage >= 80.0 {
        "🟡 Good"
    } else if percentage >= 70.0 {
        "🟠 Fair"
    } else {
        "🔴 Poor"
    }
}

/// First `| N |` cell of a rendered test summary table
pub fn scrape_test_count(summary: &str) -> Option<String> {
    static COUNT: OnceLock<Option<Regex>> = OnceLock::new();
    let re = COUNT.get_or_init(|| Regex::new(r"\| (\d+) \|").ok()).as_ref()?;

    re.captures(summary)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Build the row for one entry; unreadable coverage degrades to a red 0% row
pub fn multi_file_row(entry: &MultiFileEntry, options: &CollectOptions) -> MultiFileRow {
    let Some(report) = load_coverage(&resolve_path(&entry.coverage_path), options) else {
        tracing::warn!("No coverage for '{}' at {}", entry.title, entry.coverage_path);
        return MultiFileRow::failed(&entry.title);
    };

    let percentage = report.percentage();
    let coverage = match report {
        CoverageReport::SimpleCov(_) => format!("{:.2}%", percentage),
        CoverageReport::Cobertura(_) => format!("{:.1}%", percentage),
    };

    let tests = entry
        .test_results_path
        .as_deref()
        .map(resolve_path)
        .and_then(|path| parse_test_results(&path))
        .map(|results| test_summary_table(&results.summary))
        .and_then(|table| scrape_test_count(&table))
        .unwrap_or_default();

    MultiFileRow {
        title: entry.title.clone(),
        coverage,
        color: BadgeColor::for_percentage(percentage),
        tests,
        status: status_label(percentage),
    }
}

/// HTML table with one row per valid line, empty when no line is valid
pub fn multi_file_report(lines: &[String], options: &CollectOptions) -> String {
    let entries: Vec<_> = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let entry = MultiFileEntry::parse(line);
            if entry.is_none() {
                tracing::warn!("Skipping multiple-files line: {}", line);
            }
            entry
        })
        .collect();

    if entries.is_empty() {
        return String::new();
    }

    let mut html = String::from(TABLE_HEADER);
    for entry in &entries {
        let row = multi_file_row(entry, options);
        tracing::debug!("{} coverage: {}", row.title, row.coverage);
        let _ = write!(html, "{}", row.to_html());
    }
    html.push_str("</tbody></table>");

    html
}
