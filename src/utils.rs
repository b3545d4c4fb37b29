//! Small helpers shared by the parsers and the report formatter

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve a configured path against the working directory.
///
/// `~` and `$VAR` references are expanded first; an unknown variable leaves
/// the path untouched.
pub fn resolve_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_string());
    let candidate = PathBuf::from(expanded);

    if candidate.is_absolute() {
        return candidate;
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(&candidate))
        .unwrap_or(candidate)
}

/// Read a file, returning `None` when it is missing or unreadable
pub fn read_content(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::error!("Error reading file {}: {}", path.display(), e);
            None
        }
    }
}

/// shields.io color for a coverage percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor {
    BrightGreen,
    Green,
    YellowGreen,
    Yellow,
    Orange,
    Red,
}

impl BadgeColor {
    pub fn for_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            BadgeColor::BrightGreen
        } else if percentage >= 80.0 {
            BadgeColor::Green
        } else if percentage >= 70.0 {
            BadgeColor::YellowGreen
        } else if percentage >= 60.0 {
            BadgeColor::Yellow
        } else if percentage >= 50.0 {
            BadgeColor::Orange
        } else {
            BadgeColor::Red
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeColor::BrightGreen => "brightgreen",
            BadgeColor::Green => "green",
            BadgeColor::YellowGreen => "yellowgreen",
            BadgeColor::Yellow => "yellow",
            BadgeColor::Orange => "orange",
            BadgeColor::Red => "red",
        }
    }
}

impl fmt::Display for BadgeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Percentage of `covered` over `total`, 0 when there is nothing to cover
pub fn percentage(covered: u64, total: u64, decimals: i32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(covered as f64 / total as f64 * 100.0, decimals)
}

/// Human readable duration: `12.345s`, `2m 5.0s` or `1h 3m`
pub fn format_time(seconds: f64) -> String {
    if seconds <= 0.0 || !seconds.is_finite() {
        return "0s".to_string();
    }

    if seconds < 60.0 {
        format!("{:.3}s", seconds)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        let remaining = seconds % 60.0;
        format!("{}m {:.1}s", minutes as u64, remaining)
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours as u64, minutes as u64)
    }
}

/// Escape text for use inside HTML markup
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
