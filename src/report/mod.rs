//! Report rendering
//!
//! Provides:
//! - Markdown sections for SimpleCov, last run and test results
//! - HTML table for Cobertura reports
//! - Multi-file comparison table

mod html;
mod markdown;
mod multi;

pub use html::*;
pub use markdown::*;
pub use multi::*;

use crate::utils::BadgeColor;

/// Builds links to source files on the hosting site
#[derive(Debug, Clone, Default)]
pub struct SourceLinks {
    /// e.g. `https://github.com/owner/repo`
    pub repo_url: String,
    pub commit: String,
    pub path_prefix: String,
}

impl SourceLinks {
    pub fn file_url(&self, file: &str) -> String {
        format!("{}/blob/{}/{}{}", self.repo_url, self.commit, self.path_prefix, file)
    }

    /// Link to a line or a `start-end` range of lines
    pub fn line_url(&self, file: &str, range: &str) -> String {
        format!("{}#L{}", self.file_url(file), range)
    }
}

/// shields.io static badge URL for a percentage
pub fn badge_url(label: &str, value: &str, color: BadgeColor) -> String {
    format!(
        "https://img.shields.io/badge/{}-{}-{}.svg",
        escape_badge_text(label),
        escape_badge_text(value),
        color
    )
}

/// shields.io path escaping: `-` doubles, `_` doubles, spaces and `%` are
/// percent-encoded
fn escape_badge_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '-' => escaped.push_str("--"),
            '_' => escaped.push_str("__"),
            ' ' => escaped.push_str("%20"),
            '%' => escaped.push_str("%25"),
            _ => escaped.push(c),
        }
    }
    escaped
}
