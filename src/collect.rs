//! Report discovery
//!
//! Checks which report files are present, sniffs their format once and hands
//! each to the matching parser. A missing report is never an error: its slot
//! in [`ParsedReports`] is simply left empty.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::coverage::{
    parse_cobertura_string, parse_last_run, parse_simplecov_string, CoberturaReport, CoverageKind,
    CoverageSummary, LastRunSummary,
};
use crate::junit::{parse_test_results, TestResults};
use crate::utils::read_content;

pub const DEFAULT_COVERAGE_FILE: &str = "coverage/coverage.json";
pub const DEFAULT_LAST_RUN_FILE: &str = "coverage/.last_run.json";
pub const DEFAULT_TEST_RESULTS_FILE: &str = "test-results.xml";
pub const DEFAULT_MAX_FILES_TO_SHOW: usize = 50;

/// Where to look for each report
#[derive(Debug, Clone)]
pub struct ReportSources {
    pub coverage_file: PathBuf,
    pub coverage_xml_file: Option<PathBuf>,
    pub last_run_file: PathBuf,
    pub test_results_file: PathBuf,
}

impl Default for ReportSources {
    fn default() -> Self {
        Self {
            coverage_file: PathBuf::from(DEFAULT_COVERAGE_FILE),
            coverage_xml_file: None,
            last_run_file: PathBuf::from(DEFAULT_LAST_RUN_FILE),
            test_results_file: PathBuf::from(DEFAULT_TEST_RESULTS_FILE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Build per-file rows for SimpleCov reports
    pub file_details: bool,
    pub max_files_to_show: usize,
    /// Prefix removed from Cobertura filenames
    pub strip_prefix: String,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            file_details: false,
            max_files_to_show: DEFAULT_MAX_FILES_TO_SHOW,
            strip_prefix: String::new(),
        }
    }
}

/// Everything that could be read for one run
#[derive(Debug, Default)]
pub struct ParsedReports {
    pub coverage: Option<CoverageSummary>,
    pub cobertura: Option<CoberturaReport>,
    pub last_run: Option<LastRunSummary>,
    pub test_results: Option<TestResults>,
}

impl ParsedReports {
    pub fn is_empty(&self) -> bool {
        self.coverage.is_none()
            && self.cobertura.is_none()
            && self.last_run.is_none()
            && self.test_results.is_none()
    }

    /// JSON view of the parsed data, used by `covcomment parse`
    pub fn to_json(&self) -> Value {
        json!({
            "coverage": self.coverage,
            "cobertura": self.cobertura,
            "lastRun": self.last_run,
            "testResults": self.test_results.as_ref().map(|r| json!({
                "kind": r.kind,
                "summary": r.summary,
                "notSuccess": r.not_success_info(),
            })),
        })
    }
}

/// A coverage report of either supported shape
#[derive(Debug)]
pub enum CoverageReport {
    SimpleCov(CoverageSummary),
    Cobertura(CoberturaReport),
}

impl CoverageReport {
    /// Overall line coverage percentage
    pub fn percentage(&self) -> f64 {
        match self {
            CoverageReport::SimpleCov(summary) => summary.overall.percentage,
            CoverageReport::Cobertura(report) => report.total,
        }
    }
}

/// Read, sniff and parse one coverage file.
///
/// `None` when the file is absent or its content does not parse.
pub fn load_coverage(path: &Path, options: &CollectOptions) -> Option<CoverageReport> {
    let Some(content) = read_content(path) else {
        tracing::warn!("Coverage file not found: {}", path.display());
        return None;
    };

    let kind = CoverageKind::detect(&content);
    tracing::debug!("Detected {:?} in {}", kind, path.display());

    let parsed = match kind {
        CoverageKind::SimpleCovJson => {
            parse_simplecov_string(&content, options.file_details).map(|mut summary| {
                // Rows are sorted best covered first and cut here, before any
                // changed-files filter sees them, so a poorly covered changed
                // file past the limit is left out of the changed-files table.
                summary.truncate_files(options.max_files_to_show);
                CoverageReport::SimpleCov(summary)
            })
        }
        CoverageKind::CoberturaXml => {
            parse_cobertura_string(&content, &options.strip_prefix).map(CoverageReport::Cobertura)
        }
    };

    match parsed {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::error!("Error parsing coverage file {}: {:#}", path.display(), e);
            None
        }
    }
}

/// Parse every report that is present
pub fn collect_reports(sources: &ReportSources, options: &CollectOptions) -> ParsedReports {
    let mut reports = ParsedReports::default();

    let coverage_paths = std::iter::once(&sources.coverage_file).chain(sources.coverage_xml_file.as_ref());
    for path in coverage_paths {
        match load_coverage(path, options) {
            Some(CoverageReport::SimpleCov(summary)) => {
                if reports.coverage.replace(summary).is_some() {
                    tracing::warn!("More than one SimpleCov report found, using {}", path.display());
                }
            }
            Some(CoverageReport::Cobertura(report)) => {
                if reports.cobertura.replace(report).is_some() {
                    tracing::warn!("More than one Cobertura report found, using {}", path.display());
                }
            }
            None => {}
        }
    }

    if sources.last_run_file.exists() {
        reports.last_run = parse_last_run(&sources.last_run_file);
    }

    if sources.test_results_file.exists() {
        reports.test_results = parse_test_results(&sources.test_results_file);
    }

    reports
}
