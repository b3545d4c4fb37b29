//! Markdown sections of the comment

use std::fmt::Write;

use super::badge_url;
use crate::changed_files::{filter_changed, ChangedTotals};
use crate::config::ReportOptions;
use crate::coverage::{CoverageSummary, LastRunSummary};
use crate::junit::TestResultsSummary;
use crate::utils::{format_time, BadgeColor};

/// Overall table, optional badge and optional category breakdown
pub fn coverage_summary(summary: &CoverageSummary, options: &ReportOptions) -> String {
    let overall = &summary.overall;
    let mut md = String::new();

    let _ = write!(md, "## {}\n\n", section_title(&options.title, crate::config::DEFAULT_TITLE));

    if !options.hide_badge {
        let value = format!("{:.2}%", overall.percentage);
        let color = BadgeColor::for_percentage(overall.percentage);
        let _ = write!(
            md,
            "![{}]({})\n\n",
            options.badge_title,
            badge_url(&options.badge_title, &value, color)
        );
    }

    md.push_str("Code coverage analysis completed successfully.\n\n");

    md.push_str("### Overall Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("|--------|-------|\n");
    let _ = writeln!(md, "| Files | {} |", overall.files);
    let _ = writeln!(md, "| Lines | {} |", overall.lines);
    let _ = writeln!(md, "| Covered | {} |", overall.covered);
    let _ = writeln!(md, "| Missed | {} |", overall.missed);
    let _ = writeln!(md, "| **Coverage** | **{:.2}%** |", overall.percentage);
    if let Some(ref branches) = overall.branches {
        let _ = writeln!(md, "| **Branch Coverage** | **{:.2}%** |", branches.percentage);
    }
    md.push('\n');

    if options.include_category_summary && !summary.groups.is_empty() {
        md.push_str("### Coverage by Category\n\n");
        md.push_str("| Category | Files | Lines | Covered | Missed | Coverage |\n");
        md.push_str("|----------|-------|-------|---------|--------|----------|\n");
        for group in &summary.groups {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} | {:.1}% |",
                group.name, group.files, group.lines, group.covered, group.missed, group.percentage
            );
        }
        md.push('\n');
    }

    md
}

/// Per-file table, empty when the summary carries no file rows
pub fn file_details(summary: &CoverageSummary, max_files_to_show: usize) -> String {
    let Some(ref files) = summary.files else {
        return String::new();
    };

    let mut md = String::new();
    md.push_str("### File Coverage Details\n\n");
    md.push_str("Individual file coverage breakdown:\n\n");
    md.push_str("| File | Lines | Covered | Missed | Coverage |\n");
    md.push_str("|------|-------|---------|--------|----------|\n");

    for file in files {
        let _ = writeln!(
            md,
            "| `{}` | {} | {} | {} | {:.1}% |",
            file.name, file.lines, file.covered, file.missed, file.percentage
        );
    }

    if summary.files_truncated {
        let _ = writeln!(
            md,
            "\n*Showing first {} files. Increase `max-files-to-show` to see more.*",
            max_files_to_show
        );
    }

    md.push('\n');
    md
}

/// Coverage of the files touched by a pull request.
///
/// Empty when there are no file rows, no changed files, or nothing matches.
pub fn changed_files_section(summary: &CoverageSummary, changed: &[String], title: &str) -> String {
    let Some(ref files) = summary.files else {
        tracing::info!("Changed files section skipped: no file details");
        return String::new();
    };
    if changed.is_empty() {
        tracing::info!("Changed files section skipped: no changed files");
        return String::new();
    }

    tracing::debug!("Changed files from PR: {:?}", changed);
    let selected = filter_changed(files, changed);
    tracing::info!(
        "Files included in changed files section: {:?}",
        selected.iter().map(|f| f.name.as_str()).collect::<Vec<_>>()
    );

    if selected.is_empty() {
        return String::new();
    }

    let totals = ChangedTotals::from_files(&selected);
    let mut md = String::new();

    let _ = write!(md, "## {}\n\n", section_title(title, crate::config::DEFAULT_CHANGED_FILES_TITLE));
    md.push_str("Coverage analysis for files changed in this PR:\n\n");

    md.push_str("### Changed Files Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("|--------|-------|\n");
    let _ = writeln!(md, "| Files Changed | {} |", totals.files);
    let _ = writeln!(md, "| Lines Changed | {} |", totals.lines);
    let _ = writeln!(md, "| Covered | {} |", totals.covered);
    let _ = writeln!(md, "| Missed | {} |", totals.missed);
    let _ = write!(md, "| **Coverage** | **{:.2}%** |\n\n", totals.percentage);

    md.push_str("### Changed Files Details\n\n");
    md.push_str("| File | Lines | Covered | Missed | Coverage |\n");
    md.push_str("|------|-------|---------|--------|----------|\n");
    for file in &selected {
        let _ = writeln!(
            md,
            "| {} `{}` | {} | {} | {} | {:.1}% |",
            file_status(file.percentage),
            file.name,
            file.lines,
            file.covered,
            file.missed,
            file.percentage
        );
    }

    md.push('\n');
    md
}

fn file_status(percentage: f64) -> &'static str {
    if percentage >= 100.0 {
        "✅"
    } else if percentage >= 80.0 {
        "⚠️"
    } else {
        "❌"
    }
}

/// Line and branch percentages of the previous SimpleCov run
pub fn last_run_section(last_run: &LastRunSummary, title: &str, hide_badge: bool) -> String {
    let mut md = String::new();
    let _ = write!(md, "## {}\n\n", section_title(title, crate::config::DEFAULT_LAST_RUN_TITLE));

    if !hide_badge {
        let line = format!("{:.1}%", last_run.line);
        let branch = format!("{:.1}%", last_run.branch);
        let _ = writeln!(
            md,
            "![Line Coverage]({})",
            badge_url("Line", &line, BadgeColor::for_percentage(last_run.line))
        );
        let _ = write!(
            md,
            "![Branch Coverage]({})\n\n",
            badge_url("Branch", &branch, BadgeColor::for_percentage(last_run.branch))
        );
    }

    md.push_str("| Coverage Type | Percentage |\n");
    md.push_str("|---------------|------------|\n");
    let _ = writeln!(md, "| Line | {:.1}% |", last_run.line);
    let _ = write!(md, "| Branch | {:.1}% |\n\n", last_run.branch);

    md
}

/// Totals and overall status of the test run
pub fn test_results_section(summary: &TestResultsSummary, title: &str) -> String {
    let mut md = String::new();
    let _ = write!(md, "## {}\n\n", section_title(title, crate::config::DEFAULT_TEST_RESULTS_TITLE));

    md.push_str("**Test Execution Summary:**\n\n");
    let _ = writeln!(md, "📊 **Total Tests:** {}", summary.tests);
    let _ = writeln!(md, "❌ **Failures:** {}", summary.failures);
    let _ = writeln!(md, "⚠️ **Errors:** {}", summary.errors);
    let _ = writeln!(md, "⏭️ **Skipped:** {}", summary.skipped);
    let _ = write!(md, "⏱️ **Execution Time:** {}s\n\n", summary.time);

    if summary.all_passed() {
        md.push_str("✅ **Status:** All tests passed successfully!\n\n");
    } else {
        md.push_str("❌ **Status:** Some tests failed or encountered errors.\n\n");
    }

    md
}

/// One-row table of test totals; the test count is the first numeric cell
pub fn test_summary_table(summary: &TestResultsSummary) -> String {
    format!(
        "| Test Results | Skipped | Failures | Errors | Time |\n\
         | ----- | ------- | -------- | -------- | ------------------ |\n\
         | {} | {} :zzz: | {} :x: | {} :fire: | {} :stopwatch: |",
        summary.tests,
        summary.skipped,
        summary.failures,
        summary.errors,
        format_time(summary.time)
    )
}

fn section_title<'a>(title: &'a str, fallback: &'a str) -> &'a str {
    if title.trim().is_empty() {
        fallback
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{BranchCoverage, FileCoverage, GroupCoverage, OverallCoverage};

    fn summary() -> CoverageSummary {
        CoverageSummary {
            overall: OverallCoverage {
                files: 2,
                lines: 20,
                covered: 15,
                missed: 5,
                percentage: 75.0,
                branches: Some(BranchCoverage { total: 4, covered: 3, missed: 1, percentage: 75.0 }),
            },
            groups: vec![GroupCoverage {
                name: "Models".into(),
                files: 2,
                lines: 20,
                covered: 15,
                missed: 5,
                percentage: 75.0,
            }],
            files: Some(vec![
                FileCoverage {
                    name: "user.rb".into(),
                    path: "app/models/user.rb".into(),
                    lines: 10,
                    covered: 10,
                    missed: 0,
                    percentage: 100.0,
                    missed_lines: vec![],
                },
                FileCoverage {
                    name: "order.rb".into(),
                    path: "app/models/order.rb".into(),
                    lines: 10,
                    covered: 5,
                    missed: 5,
                    percentage: 50.0,
                    missed_lines: vec![1, 2, 3, 4, 5],
                },
            ]),
            files_truncated: true,
        }
    }

    #[test]
    fn test_coverage_summary() {
        let md = coverage_summary(&summary(), &ReportOptions::default());

        assert!(md.starts_with("## Coverage Report\n\n"));
        assert!(md.contains("https://img.shields.io/badge/Coverage-75.00%25-yellowgreen.svg"));
        assert!(md.contains("| **Coverage** | **75.00%** |"));
        assert!(md.contains("| **Branch Coverage** | **75.00%** |"));
        assert!(md.contains("| Models | 2 | 20 | 15 | 5 | 75.0% |"));
    }

    #[test]
    fn test_coverage_summary_options() {
        let options = ReportOptions {
            title: "API".into(),
            hide_badge: true,
            include_category_summary: false,
            ..Default::default()
        };
        let md = coverage_summary(&summary(), &options);

        assert!(md.starts_with("## API\n\n"));
        assert!(!md.contains("img.shields.io"));
        assert!(!md.contains("Coverage by Category"));
    }

    #[test]
    fn test_file_details() {
        let md = file_details(&summary(), 2);

        assert!(md.contains("| `user.rb` | 10 | 10 | 0 | 100.0% |"));
        assert!(md.contains("*Showing first 2 files."));

        let no_files = CoverageSummary::default();
        assert!(file_details(&no_files, 50).is_empty());
    }

    #[test]
    fn test_changed_files_section() {
        let changed = vec!["app/models/order.rb".to_string()];
        let md = changed_files_section(&summary(), &changed, "Changed Files Coverage");

        assert!(md.contains("| Files Changed | 1 |"));
        assert!(md.contains("| **Coverage** | **50.00%** |"));
        assert!(md.contains("| ❌ `order.rb` | 10 | 5 | 5 | 50.0% |"));
        assert!(!md.contains("`user.rb`"));
    }

    #[test]
    fn test_changed_files_section_empty_cases() {
        assert!(changed_files_section(&summary(), &[], "t").is_empty());
        assert!(changed_files_section(&summary(), &["nonexistent.rb".into()], "t").is_empty());
        assert!(changed_files_section(&CoverageSummary::default(), &["user.rb".into()], "t").is_empty());
    }

    #[test]
    fn test_full_coverage_file_gets_check_mark() {
        let md = changed_files_section(&summary(), &["user.rb".into()], "");

        assert!(md.starts_with("## Changed Files Coverage"));
        assert!(md.contains("| ✅ `user.rb` |"));
    }

    #[test]
    fn test_last_run_section() {
        let last_run = LastRunSummary { line: 92.34, branch: 55.0 };

        let md = last_run_section(&last_run, "Last Run Coverage", false);
        assert!(md.contains("Line-92.3%25-brightgreen.svg"));
        assert!(md.contains("Branch-55.0%25-orange.svg"));
        assert!(md.contains("| Line | 92.3% |"));

        let hidden = last_run_section(&last_run, "Last Run Coverage", true);
        assert!(!hidden.contains("img.shields.io"));
    }

    #[test]
    fn test_test_results_section() {
        let passing = TestResultsSummary { tests: 10, time: 1.5, ..Default::default() };
        let md = test_results_section(&passing, "Test Results");
        assert!(md.contains("📊 **Total Tests:** 10"));
        assert!(md.contains("⏱️ **Execution Time:** 1.5s"));
        assert!(md.contains("All tests passed successfully!"));

        let failing = TestResultsSummary { tests: 10, errors: 1, ..Default::default() };
        assert!(test_results_section(&failing, "Test Results").contains("Some tests failed"));
    }

    #[test]
    fn test_summary_table_layout() {
        let table = test_summary_table(&TestResultsSummary {
            tests: 12,
            failures: 1,
            errors: 0,
            skipped: 2,
            time: 75.0,
        });

        let rows: Vec<_> = table.lines().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], "| 12 | 2 :zzz: | 1 :x: | 0 :fire: | 1m 15.0s :stopwatch: |");
    }
}
