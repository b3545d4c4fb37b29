//! Summary values exported to the calling workflow

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::changed_files::{filter_changed, ChangedTotals};
use crate::collect::ParsedReports;
use crate::comment::CommentSections;
use crate::config::ReportOptions;
use crate::report::test_summary_table;
use crate::utils::BadgeColor;

/// Ordered `name = value` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outputs {
    values: Vec<(String, String)>,
}

impl Outputs {
    /// Set a value, replacing an earlier one with the same name
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize in the `name<<DELIMITER` block format
    pub fn to_output_file_format(&self) -> Result<String> {
        let delimiter = delimiter();
        let mut out = String::new();

        for (name, value) in self.iter() {
            if value.lines().any(|line| line == delimiter) {
                anyhow::bail!("Output '{}' contains the delimiter", name);
            }
            out.push_str(&format!("{}<<{}\n{}\n{}\n", name, delimiter, value, delimiter));
        }

        Ok(out)
    }

    /// Append to `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let content = self.to_output_file_format()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write output file: {}", path.display()))?;
        Ok(())
    }

    /// Write to the file named by `GITHUB_OUTPUT`, or log when it is unset
    pub fn export(&self) -> Result<()> {
        match std::env::var_os("GITHUB_OUTPUT").filter(|p| !p.is_empty()) {
            Some(path) => self.write_to(Path::new(&path)),
            None => {
                for (name, value) in self.iter() {
                    tracing::debug!("output {} = {}", name, value);
                }
                Ok(())
            }
        }
    }
}

fn delimiter() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!("ghadelimiter_{}_{}", std::process::id(), nanos)
}

/// Collect every exported value for one run
pub fn build_outputs(
    reports: &ParsedReports,
    sections: &CommentSections,
    options: &ReportOptions,
    changed_files: Option<&[String]>,
) -> Outputs {
    let mut outputs = Outputs::default();

    if let Some(ref coverage) = reports.coverage {
        let changed_totals = changed_files
            .filter(|files| options.report_only_changed_files && !files.is_empty())
            .zip(coverage.files.as_deref())
            .map(|(changed, files)| filter_changed(files, changed))
            .filter(|selected| !selected.is_empty())
            .map(|selected| ChangedTotals::from_files(&selected));

        let percentage = match changed_totals {
            Some(totals) => totals.percentage,
            None => coverage.overall.percentage,
        };
        outputs.set("coverage", format!("{:.2}%", percentage));
        outputs.set("color", BadgeColor::for_percentage(percentage).as_str());
        outputs.set("warnings", "0");
    } else if let Some(ref cobertura) = reports.cobertura {
        outputs.set("coverage", format!("{:.1}%", cobertura.total));
        outputs.set("color", BadgeColor::for_percentage(cobertura.total).as_str());
        outputs.set("warnings", "0");
    }

    if !sections.coverage.is_empty() {
        outputs.set("coverageHtml", sections.coverage.clone());
    }

    if let (Some(last_run), true) = (reports.last_run, options.include_last_run) {
        outputs.set("line-coverage", format!("{:.1}%", last_run.line));
        outputs.set("branch-coverage", format!("{:.1}%", last_run.branch));
    }

    if let Some(ref results) = reports.test_results {
        let summary = &results.summary;
        outputs.set("tests", summary.tests.to_string());
        outputs.set("failures", summary.failures.to_string());
        outputs.set("errors", summary.errors.to_string());
        outputs.set("skipped", summary.skipped.to_string());
        outputs.set("time", summary.time.to_string());
        outputs.set("summaryReport", test_summary_table(summary));

        let not_success = serde_json::to_string(&results.not_success_info()).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize failed test info: {}", e);
            "{}".to_string()
        });
        outputs.set("notSuccessTestInfo", not_success);
    }

    outputs
}
