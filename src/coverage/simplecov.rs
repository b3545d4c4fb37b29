//! SimpleCov JSON format parser
//!
//! Reads the `coverage.json` document written by the SimpleCov JSON
//! formatter:
//!
//! ```json
//! { "files": [{ "filename": "...", "covered_percent": 90.0, "covered_lines": 9,
//!               "lines_of_code": 10, "coverage": { "lines": [1, 0, null] } }] }
//! ```

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

use super::{BranchCoverage, CoverageSummary, FileCoverage, GroupCoverage, OverallCoverage};
use crate::utils::{percentage, read_content, round_to};

const REQUIRED_FIELDS: [&str; 5] = [
    "filename",
    "covered_percent",
    "coverage",
    "covered_lines",
    "lines_of_code",
];

const NUMERIC_FIELDS: [&str; 3] = ["covered_percent", "covered_lines", "lines_of_code"];

/// Directories whose first child names the category of a file
const CATEGORY_ROOTS: [&str; 4] = ["app", "lib", "spec", "test"];

/// One validated entry of the `files` array
#[derive(Debug, Clone)]
struct SourceFile<'a> {
    filename: &'a str,
    covered_percent: f64,
    covered_lines: u64,
    lines_of_code: u64,
    line_hits: &'a [Value],
    branches: Option<&'a Map<String, Value>>,
}

/// Parse a SimpleCov JSON file.
///
/// Returns `None` when the file is missing or malformed; the reason is logged.
pub fn parse_simplecov(path: &Path, include_file_details: bool) -> Option<CoverageSummary> {
    if !path.exists() {
        tracing::warn!("SimpleCov coverage file not found: {}", path.display());
        return None;
    }

    let content = read_content(path)?;

    match parse_simplecov_string(&content, include_file_details) {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::error!("Error parsing SimpleCov file {}: {:#}", path.display(), e);
            None
        }
    }
}

/// Parse SimpleCov JSON content from a string
pub fn parse_simplecov_string(content: &str, include_file_details: bool) -> Result<CoverageSummary> {
    let data: Value = serde_json::from_str(content).context("Invalid JSON")?;
    let files = validate(&data)?;

    Ok(CoverageSummary {
        overall: overall_summary(&files),
        groups: group_by_directory(&files),
        files: include_file_details.then(|| file_details(&files)),
        files_truncated: false,
    })
}

fn validate(data: &Value) -> Result<Vec<SourceFile<'_>>> {
    let Some(root) = data.as_object() else {
        bail!("Invalid SimpleCov JSON format: top level is not an object");
    };

    let Some(entries) = root.get("files").and_then(Value::as_array) else {
        bail!("Invalid SimpleCov JSON format: missing `files` array");
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            validate_file(entry)
                .with_context(|| format!("Invalid SimpleCov JSON format in files[{}]", index))
        })
        .collect()
}

fn validate_file(entry: &Value) -> Result<SourceFile<'_>> {
    let Some(file) = entry.as_object() else {
        bail!("entry is not an object");
    };

    for field in REQUIRED_FIELDS {
        if !file.contains_key(field) {
            bail!("missing required field `{}`", field);
        }
    }

    let Some(coverage) = file.get("coverage").and_then(Value::as_object) else {
        bail!("`coverage` is not an object");
    };

    let Some(line_hits) = coverage.get("lines").and_then(Value::as_array) else {
        bail!("`coverage.lines` is not an array");
    };

    let mut numbers = [0f64; 3];
    for (slot, field) in numbers.iter_mut().zip(NUMERIC_FIELDS) {
        match file.get(field).and_then(Value::as_f64) {
            Some(value) if value.is_finite() => *slot = value,
            _ => bail!("`{}` is not a number", field),
        }
    }
    let [covered_percent, covered_lines, lines_of_code] = numbers;

    for (field, value) in [("covered_lines", covered_lines), ("lines_of_code", lines_of_code)] {
        if value < 0.0 {
            bail!("`{}` is negative", field);
        }
        if value.fract() != 0.0 {
            tracing::debug!("Truncating fractional `{}` {} to {}", field, value, value.trunc());
        }
    }

    let filename = file.get("filename").and_then(Value::as_str).unwrap_or("");
    let lines_of_code = lines_of_code as u64;
    let mut covered = covered_lines as u64;
    if covered > lines_of_code {
        tracing::debug!(
            "{}: covered_lines {} exceeds lines_of_code {}, clamping",
            filename,
            covered,
            lines_of_code
        );
        covered = lines_of_code;
    }

    Ok(SourceFile {
        filename,
        covered_percent,
        covered_lines: covered,
        lines_of_code,
        line_hits,
        branches: coverage.get("branches").and_then(Value::as_object),
    })
}

fn overall_summary(files: &[SourceFile<'_>]) -> OverallCoverage {
    let mut lines = 0u64;
    let mut covered = 0u64;
    let mut branches_total = 0u64;
    let mut branches_covered = 0u64;

    for file in files {
        lines += file.lines_of_code;
        covered += file.covered_lines;

        if let Some(branches) = file.branches.filter(|b| !b.is_empty()) {
            let (total, hit) = count_branches(branches);
            branches_total += total;
            branches_covered += hit;
        }
    }

    let branches = (branches_total > 0).then(|| BranchCoverage {
        total: branches_total,
        covered: branches_covered,
        missed: branches_total - branches_covered,
        percentage: percentage(branches_covered, branches_total, 2),
    });

    OverallCoverage {
        files: files.len() as u64,
        lines,
        covered,
        missed: lines - covered,
        percentage: percentage(covered, lines, 2),
        branches,
    }
}

/// Every numeric leaf is one branch, covered when its count is positive
fn count_branches(branches: &Map<String, Value>) -> (u64, u64) {
    let mut total = 0;
    let mut covered = 0;

    for group in branches.values().filter_map(Value::as_object) {
        for count in group.values().filter_map(Value::as_f64) {
            total += 1;
            if count > 0.0 {
                covered += 1;
            }
        }
    }

    (total, covered)
}

/// Aggregate files by category, largest categories first
pub(crate) fn group_by_directory_names<'a>(
    entries: impl Iterator<Item = (&'a str, u64, u64)>,
) -> Vec<GroupCoverage> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, GroupCoverage> = HashMap::new();

    for (filename, lines, covered) in entries {
        let name = extract_category(filename);
        let group = groups.entry(name.clone()).or_insert_with(|| {
            order.push(name.clone());
            GroupCoverage {
                name,
                ..Default::default()
            }
        });
        group.files += 1;
        group.lines += lines;
        group.covered += covered;
        group.missed += lines - covered;
    }

    let mut result: Vec<GroupCoverage> = order
        .into_iter()
        .filter_map(|name| groups.remove(&name))
        .map(|mut group| {
            group.percentage = percentage(group.covered, group.lines, 1);
            group
        })
        .collect();

    // Stable sort keeps first-seen order between equally sized groups
    result.sort_by(|a, b| b.lines.cmp(&a.lines));
    result
}

fn group_by_directory(files: &[SourceFile<'_>]) -> Vec<GroupCoverage> {
    group_by_directory_names(
        files
            .iter()
            .map(|f| (f.filename, f.lines_of_code, f.covered_lines)),
    )
}

/// Category of a file: the directory under `app/`, `lib/`, `spec/` or
/// `test/`, else its parent directory, capitalised.
pub fn extract_category(path: &str) -> String {
    let parts: Vec<&str> = path.split(['/', '\\']).collect();

    let under_root = CATEGORY_ROOTS.iter().find_map(|root| {
        let index = parts.iter().position(|part| part == root)?;
        parts.get(index + 1).copied()
    });

    let dir = under_root.or_else(|| {
        if parts.len() >= 2 {
            Some(parts[parts.len() - 2])
        } else {
            None
        }
    });

    match dir {
        Some(dir) if !dir.is_empty() => capitalize(dir),
        _ => "Other".to_string(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn file_details(files: &[SourceFile<'_>]) -> Vec<FileCoverage> {
    let mut details: Vec<FileCoverage> = files
        .iter()
        .map(|file| FileCoverage {
            name: base_name(file.filename),
            path: file.filename.to_string(),
            lines: file.lines_of_code,
            covered: file.covered_lines,
            missed: file.lines_of_code - file.covered_lines,
            percentage: round_to(file.covered_percent, 1),
            missed_lines: missed_lines(file.line_hits),
        })
        .collect();

    details.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    details
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 1-based line numbers whose hit count is exactly zero; `null` entries are
/// not relevant lines
pub fn missed_lines(line_hits: &[Value]) -> Vec<u32> {
    line_hits
        .iter()
        .enumerate()
        .filter(|(_, hits)| hits.as_f64() == Some(0.0))
        .map(|(index, _)| index as u32 + 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn sample() -> String {
        json!({
            "files": [
                {
                    "filename": "/project/app/models/user.rb",
                    "covered_percent": 100.0,
                    "covered_lines": 10,
                    "lines_of_code": 10,
                    "coverage": { "lines": [1, 1, null, 1] }
                },
                {
                    "filename": "/project/app/controllers/users_controller.rb",
                    "covered_percent": 50.0,
                    "covered_lines": 5,
                    "lines_of_code": 10,
                    "coverage": {
                        "lines": [1, 0, 0, 1, 0],
                        "branches": {
                            "[:if, 0, 3, 4, 3, 10]": {
                                "[:then, 1, 4, 6, 4, 15]": 2,
                                "[:else, 2, 4, 6, 4, 15]": 0
                            }
                        }
                    }
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn test_overall_summary() {
        let summary = parse_simplecov_string(&sample(), false).unwrap();

        assert_eq!(summary.overall.files, 2);
        assert_eq!(summary.overall.lines, 20);
        assert_eq!(summary.overall.covered, 15);
        assert_eq!(summary.overall.missed, 5);
        assert_eq!(format!("{:.2}", summary.overall.percentage), "75.00");
        assert!(summary.files.is_none());
    }

    #[test]
    fn test_branch_coverage() {
        let summary = parse_simplecov_string(&sample(), false).unwrap();
        let branches = summary.overall.branches.unwrap();

        assert_eq!(branches.total, 2);
        assert_eq!(branches.covered, 1);
        assert_eq!(branches.missed, 1);
        assert_eq!(branches.percentage, 50.0);
    }

    #[test]
    fn test_no_branches_when_maps_empty() {
        let content = json!({
            "files": [{
                "filename": "lib/a.rb",
                "covered_percent": 0.0,
                "covered_lines": 0,
                "lines_of_code": 0,
                "coverage": { "lines": [], "branches": {} }
            }]
        })
        .to_string();

        let summary = parse_simplecov_string(&content, false).unwrap();
        assert!(summary.overall.branches.is_none());
        assert_eq!(format!("{:.2}", summary.overall.percentage), "0.00");
    }

    #[test]
    fn test_groups_preserve_totals() {
        let summary = parse_simplecov_string(&sample(), false).unwrap();

        let names: Vec<_> = summary.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Models", "Controllers"]);

        let lines: u64 = summary.groups.iter().map(|g| g.lines).sum();
        assert_eq!(lines, summary.overall.lines);
        for group in &summary.groups {
            assert_eq!(group.covered + group.missed, group.lines);
        }
    }

    #[test]
    fn test_groups_sorted_by_lines() {
        let groups = group_by_directory_names(
            vec![("lib/a/x.rb", 5, 5), ("app/models/y.rb", 50, 10), ("z.rb", 7, 0)].into_iter(),
        );

        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Models", "Other", "A"]);
        assert_eq!(groups[0].percentage, 20.0);
    }

    #[test]
    fn test_extract_category() {
        assert_eq!(extract_category("/srv/app/models/user.rb"), "Models");
        assert_eq!(extract_category("lib/utils/helper.rb"), "Utils");
        assert_eq!(extract_category("spec/requests/api_spec.rb"), "Requests");
        assert_eq!(extract_category("test\\unit\\foo_test.rb"), "Unit");
        assert_eq!(extract_category("config/initializers/x.rb"), "Initializers");
        assert_eq!(extract_category("Rakefile"), "Other");
    }

    #[test]
    fn test_file_details_sorted_by_coverage() {
        let summary = parse_simplecov_string(&sample(), true).unwrap();
        let files = summary.files.unwrap();

        assert_eq!(files[0].name, "user.rb");
        assert_eq!(files[0].percentage, 100.0);
        assert_eq!(files[1].name, "users_controller.rb");
        assert_eq!(files[1].path, "/project/app/controllers/users_controller.rb");
        assert_eq!(files[1].missed_lines, vec![2, 3, 5]);
        assert_eq!(files[1].covered + files[1].missed, files[1].lines);
    }

    #[test]
    fn test_missed_lines_ignores_null() {
        let hits = vec![json!(1), json!(null), json!(0), json!(3), json!(0)];
        assert_eq!(missed_lines(&hits), vec![3, 5]);
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(parse_simplecov_string("{ invalid json }", false).is_err());
        assert!(parse_simplecov_string("", false).is_err());
        assert!(parse_simplecov_string("[]", false).is_err());
        assert!(parse_simplecov_string(r#"{"files": {}}"#, false).is_err());
        assert!(parse_simplecov_string(r#"{"meta": {}}"#, false).is_err());

        let missing_field = json!({
            "files": [{ "filename": "a.rb", "covered_percent": 1.0, "coverage": { "lines": [] }, "covered_lines": 1 }]
        });
        assert!(parse_simplecov_string(&missing_field.to_string(), false).is_err());

        let bad_number = json!({
            "files": [{ "filename": "a.rb", "covered_percent": "90", "covered_lines": 1,
                        "lines_of_code": 1, "coverage": { "lines": [] } }]
        });
        assert!(parse_simplecov_string(&bad_number.to_string(), false).is_err());

        let bad_lines = json!({
            "files": [{ "filename": "a.rb", "covered_percent": 90.0, "covered_lines": 1,
                        "lines_of_code": 1, "coverage": { "lines": {} } }]
        });
        assert!(parse_simplecov_string(&bad_lines.to_string(), false).is_err());
    }

    #[test]
    fn test_negative_line_counts_are_rejected() {
        for (covered, total) in [(-1.0, 4.0), (2.0, -4.0)] {
            let data = json!({
                "files": [{ "filename": "a.rb", "covered_percent": 50.0, "covered_lines": covered,
                            "lines_of_code": total, "coverage": { "lines": [1, 0] } }]
            });
            let err = parse_simplecov_string(&data.to_string(), false).unwrap_err();
            assert!(format!("{:#}", err).contains("is negative"));
        }
    }

    #[test]
    fn test_covered_lines_clamped_to_lines_of_code() {
        let data = json!({
            "files": [{ "filename": "a.rb", "covered_percent": 100.0, "covered_lines": 9,
                        "lines_of_code": 4, "coverage": { "lines": [1, 1, 1, 1] } }]
        });
        let summary = parse_simplecov_string(&data.to_string(), false).unwrap();

        assert_eq!(summary.overall.covered, 4);
        assert_eq!(summary.overall.missed, 0);
    }

    #[test]
    fn test_parse_file_returns_none_when_missing_or_malformed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(parse_simplecov(&dir.path().join("missing.json"), false).is_none());

        let path = dir.path().join("coverage.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"{ invalid json }").unwrap();
        assert!(parse_simplecov(&path, false).is_none());

        std::fs::write(&path, sample()).unwrap();
        assert!(parse_simplecov(&path, false).is_some());
    }
}
