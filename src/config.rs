use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::collect::{
    CollectOptions, ReportSources, DEFAULT_COVERAGE_FILE, DEFAULT_LAST_RUN_FILE,
    DEFAULT_MAX_FILES_TO_SHOW, DEFAULT_TEST_RESULTS_FILE,
};
use crate::utils::resolve_path;

pub const DEFAULT_TITLE: &str = "Coverage Report";
pub const DEFAULT_BADGE_TITLE: &str = "Coverage";
pub const DEFAULT_LAST_RUN_TITLE: &str = "Last Run Coverage";
pub const DEFAULT_TEST_RESULTS_TITLE: &str = "Test Results";
pub const DEFAULT_CHANGED_FILES_TITLE: &str = "Changed Files Coverage";

/// Full run configuration, built once in `main` and passed down by reference
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub report: ReportOptions,
    pub sources: SourcesConfig,
    pub comment: CommentConfig,
    pub github: GithubConfig,
}

/// What to render and how
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReportOptions {
    pub title: String,
    pub badge_title: String,
    pub hide_badge: bool,
    pub hide_report: bool,
    pub include_file_details: bool,
    pub max_files_to_show: usize,
    pub include_category_summary: bool,
    pub include_last_run: bool,
    pub last_run_title: String,
    pub test_results_title: String,
    /// Replace the coverage section with changed files only (pull requests)
    pub report_only_changed_files: bool,
    /// Append a changed files section below the full report (pull requests)
    pub include_changed_files_details: bool,
    /// Changed files kept for matching; empty keeps every file
    pub changed_files_extensions: Vec<String>,
    /// Prefix removed from Cobertura filenames
    pub strip_prefix: String,
    /// Prefix inserted between the commit and the file in source links
    pub path_prefix: String,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            badge_title: DEFAULT_BADGE_TITLE.to_string(),
            hide_badge: false,
            hide_report: false,
            include_file_details: false,
            max_files_to_show: DEFAULT_MAX_FILES_TO_SHOW,
            include_category_summary: true,
            include_last_run: false,
            last_run_title: DEFAULT_LAST_RUN_TITLE.to_string(),
            test_results_title: DEFAULT_TEST_RESULTS_TITLE.to_string(),
            report_only_changed_files: false,
            include_changed_files_details: false,
            changed_files_extensions: vec!["rb".to_string()],
            strip_prefix: String::new(),
            path_prefix: String::new(),
        }
    }
}

impl ReportOptions {
    /// Whether any feature needs per-file coverage rows
    pub fn needs_file_details(&self) -> bool {
        self.include_file_details || self.report_only_changed_files || self.include_changed_files_details
    }

    pub fn wants_changed_files(&self) -> bool {
        self.report_only_changed_files || self.include_changed_files_details
    }
}

/// Report file locations. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SourcesConfig {
    pub coverage_file: Option<String>,
    pub coverage_xml_file: Option<String>,
    pub last_run_file: Option<String>,
    pub test_results_file: Option<String>,
    /// `title, coverage_path[, test_results_path]` lines. Malformed lines are
    /// skipped with a warning when the table is rendered.
    pub multiple_files: Vec<String>,
}

impl SourcesConfig {
    pub fn report_sources(&self) -> ReportSources {
        ReportSources {
            coverage_file: resolve_path(self.coverage_file.as_deref().unwrap_or(DEFAULT_COVERAGE_FILE)),
            coverage_xml_file: self.coverage_xml_file.as_deref().map(resolve_path),
            last_run_file: resolve_path(self.last_run_file.as_deref().unwrap_or(DEFAULT_LAST_RUN_FILE)),
            test_results_file: resolve_path(
                self.test_results_file.as_deref().unwrap_or(DEFAULT_TEST_RESULTS_FILE),
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CommentConfig {
    /// Render and export, but never post
    pub hide_comment: bool,
    /// Always create a comment instead of updating the previous one
    pub create_new_comment: bool,
    /// Distinguishes several comments posted from the same job
    pub unique_id: Option<String>,
    /// Overrides the number taken from the event payload
    pub issue_number: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GithubConfig {
    pub token: Option<String>,
    pub api_url: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.report.max_files_to_show == 0 {
            anyhow::bail!("max-files-to-show must be greater than zero");
        }

        Ok(())
    }

    pub fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            file_details: self.report.needs_file_details(),
            max_files_to_show: self.report.max_files_to_show,
            strip_prefix: self.report.strip_prefix.clone(),
        }
    }
}
