//! Coverage module
//!
//! Provides:
//! - SimpleCov JSON parsing
//! - Cobertura XML parsing
//! - SimpleCov `.last_run.json` parsing

mod cobertura;
mod last_run;
mod simplecov;

pub use cobertura::*;
pub use last_run::*;
pub use simplecov::*;

use serde::Serialize;

/// Coverage totals across every file of a SimpleCov report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverallCoverage {
    pub files: u64,
    pub lines: u64,
    pub covered: u64,
    pub missed: u64,
    /// Rounded to two decimals
    pub percentage: f64,
    pub branches: Option<BranchCoverage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BranchCoverage {
    pub total: u64,
    pub covered: u64,
    pub missed: u64,
    pub percentage: f64,
}

/// Totals for one category of files (Models, Controllers, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupCoverage {
    pub name: String,
    pub files: u64,
    pub lines: u64,
    pub covered: u64,
    pub missed: u64,
    /// Rounded to one decimal
    pub percentage: f64,
}

/// Coverage data for a single file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileCoverage {
    /// Base name of the file
    pub name: String,
    /// Path as written in the report
    pub path: String,
    pub lines: u64,
    pub covered: u64,
    pub missed: u64,
    /// Rounded to one decimal
    pub percentage: f64,
    /// 1-based line numbers with zero hits
    pub missed_lines: Vec<u32>,
}

/// Normalized SimpleCov report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub overall: OverallCoverage,
    pub groups: Vec<GroupCoverage>,
    /// Only present when file details were requested
    pub files: Option<Vec<FileCoverage>>,
    pub files_truncated: bool,
}

impl CoverageSummary {
    /// Keep at most `max` file rows
    pub fn truncate_files(&mut self, max: usize) {
        if let Some(ref mut files) = self.files {
            if files.len() > max {
                files.truncate(max);
                self.files_truncated = true;
            }
        }
    }
}

/// Shape of a coverage report, decided once from its content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageKind {
    SimpleCovJson,
    CoberturaXml,
}

impl CoverageKind {
    /// Sniff the report format from the first non-blank character
    pub fn detect(content: &str) -> Self {
        match content.trim_start_matches('\u{feff}').trim_start().chars().next() {
            Some('<') => CoverageKind::CoberturaXml,
            _ => CoverageKind::SimpleCovJson,
        }
    }
}
