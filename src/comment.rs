//! Comment assembly
//!
//! Turns parsed reports into the sections of the pull-request comment and
//! joins them under a hidden watermark used to find the comment again.

use crate::collect::ParsedReports;
use crate::config::{CommentConfig, Config, DEFAULT_CHANGED_FILES_TITLE};
use crate::report::{
    changed_files_section, cobertura_html, coverage_summary, file_details, last_run_section,
    multi_file_report, test_results_section, SourceLinks,
};

/// GitHub rejects comment bodies above this many characters
pub const MAX_COMMENT_LENGTH: usize = 65536;

/// Events with no pull request to comment on; the length check is skipped
const NON_COMMENT_EVENTS: [&str; 2] = ["workflow_dispatch", "workflow_run"];

/// Hidden first line identifying comments written by one job
pub fn watermark(job: &str, unique_id: Option<&str>) -> String {
    let unique = match unique_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => format!("| {} ", id),
        None => String::new(),
    };
    format!("<!-- Coverage Comment: {} {}-->\n", job, unique)
}

/// Rendered pieces of the comment, each possibly empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentSections {
    pub coverage: String,
    pub test_results: String,
    pub last_run: String,
    pub multiple_files: String,
}

impl CommentSections {
    /// Characters across all sections, excluding the watermark
    pub fn content_len(&self) -> usize {
        [&self.coverage, &self.test_results, &self.last_run, &self.multiple_files]
            .iter()
            .map(|s| s.chars().count())
            .sum()
    }

    /// Full comment body in fixed section order
    pub fn body(&self, watermark: &str) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\n{}\n\n{}",
            watermark, self.coverage, self.test_results, self.last_run, self.multiple_files
        )
    }
}

/// Warn when the comment would exceed GitHub's limit. Nothing is truncated.
///
/// Returns whether the warning was emitted.
pub fn check_length(sections: &CommentSections, event_name: &str) -> bool {
    let length = sections.content_len();
    if length <= MAX_COMMENT_LENGTH || NON_COMMENT_EVENTS.contains(&event_name) {
        return false;
    }

    tracing::warn!(
        "Your comment is too long (maximum is {} characters, got {}); GitHub may reject it.",
        MAX_COMMENT_LENGTH,
        length
    );
    tracing::warn!("Try `hide-report: true` or `include-file-details: false` to reduce comment size.");
    true
}

/// Render every section that has data.
///
/// `changed_files` is `Some` only when a changed-files list could be
/// obtained; an empty list falls back to the full report.
pub fn render_sections(
    reports: &ParsedReports,
    config: &Config,
    changed_files: Option<&[String]>,
    links: &SourceLinks,
) -> CommentSections {
    let options = &config.report;
    let changed = changed_files.filter(|files| !files.is_empty());

    let mut coverage_parts = Vec::new();

    if let (Some(summary), false) = (&reports.coverage, options.hide_report) {
        let simplecov = match changed {
            Some(files) if options.report_only_changed_files => {
                changed_files_section(summary, files, &options.title)
            }
            _ => {
                let mut md = coverage_summary(summary, options);
                if options.include_file_details {
                    md.push_str(&file_details(summary, options.max_files_to_show));
                }
                if let (Some(files), true) = (changed, options.include_changed_files_details) {
                    let section = changed_files_section(summary, files, DEFAULT_CHANGED_FILES_TITLE);
                    if !section.is_empty() {
                        md.push_str("\n\n");
                        md.push_str(&section);
                    }
                }
                md
            }
        };
        coverage_parts.push(simplecov);
    } else if reports.coverage.is_some() {
        tracing::info!("Coverage report hidden");
    }

    if let Some(ref cobertura) = reports.cobertura {
        let html = cobertura_html(cobertura, options, links);
        if !html.is_empty() {
            coverage_parts.push(html);
        }
    }

    let last_run = match (&reports.last_run, options.include_last_run) {
        (Some(last_run), true) => last_run_section(last_run, &options.last_run_title, options.hide_badge),
        _ => String::new(),
    };

    let test_results = reports
        .test_results
        .as_ref()
        .map(|results| test_results_section(&results.summary, &options.test_results_title))
        .unwrap_or_default();

    let multiple_files = if config.sources.multiple_files.is_empty() {
        String::new()
    } else {
        multi_file_report(&config.sources.multiple_files, &config.collect_options())
    };

    CommentSections {
        coverage: coverage_parts.join("\n\n"),
        test_results,
        last_run,
        multiple_files,
    }
}

/// What to do with the rendered body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    /// `hide_comment` is set
    Hidden,
    /// No issue or pull request number; the run still succeeds
    NoTarget,
    Create(u64),
    /// Update the watermarked comment, or create one
    Upsert(u64),
}

pub fn post_action(comment: &CommentConfig, number: Option<u64>) -> PostAction {
    if comment.hide_comment {
        return PostAction::Hidden;
    }

    match number {
        None => PostAction::NoTarget,
        Some(number) if comment.create_new_comment => PostAction::Create(number),
        Some(number) => PostAction::Upsert(number),
    }
}

/// Id of the first comment whose body starts with the watermark
pub fn find_previous<'a, I>(comments: I, watermark: &str) -> Option<u64>
where
    I: IntoIterator<Item = (u64, &'a str)>,
{
    comments
        .into_iter()
        .find(|(_, body)| body.starts_with(watermark))
        .map(|(id, _)| id)
}
