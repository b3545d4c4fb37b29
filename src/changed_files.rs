//! Restricting coverage to the files changed by a pull request

use anyhow::Result;

use crate::coverage::FileCoverage;
use crate::utils::percentage;

/// Where a run gets its changed-files list from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangedFilesSource {
    /// Neither changed-files mode is on
    Disabled,
    /// Local git diff against a reference
    Git(String),
    /// Files of a pull request, from the API
    PullRequest(u64),
    /// No pull request to ask about; the full report is used
    Unavailable,
}

impl ChangedFilesSource {
    /// A local reference wins over the pull request API
    pub fn select(
        wants_changed_files: bool,
        changed_since: Option<&str>,
        is_pull_request: bool,
        number: Option<u64>,
    ) -> Self {
        if !wants_changed_files {
            return ChangedFilesSource::Disabled;
        }

        match (changed_since, is_pull_request, number) {
            (Some(since), _, _) => ChangedFilesSource::Git(since.to_string()),
            (None, true, Some(number)) => ChangedFilesSource::PullRequest(number),
            _ => ChangedFilesSource::Unavailable,
        }
    }
}

/// Filter a fetched changed-files list by extension.
///
/// A failed fetch is logged and yields `None`, so the run falls back to the
/// full report instead of aborting.
pub fn resolve_changed_files(fetched: Result<Vec<String>>, extensions: &[String]) -> Option<Vec<String>> {
    match fetched {
        Ok(files) => {
            let files = filter_by_extension(files, extensions);
            tracing::info!("Changed files: {:?}", files);
            Some(files)
        }
        Err(e) => {
            tracing::warn!("Could not fetch changed files: {:#}", e);
            None
        }
    }
}

/// Loose path match: either name contains the other.
///
/// This tolerates absolute vs relative paths on either side, at the cost of
/// false positives on short names (`b.rb` matches `ab.rb`).
pub fn matches_changed(file_name: &str, changed_file: &str) -> bool {
    file_name.contains(changed_file) || changed_file.contains(file_name)
}

/// Coverage rows whose name matches any changed path, in report order
pub fn filter_changed<'a>(files: &'a [FileCoverage], changed: &[String]) -> Vec<&'a FileCoverage> {
    files
        .iter()
        .filter(|file| changed.iter().any(|c| matches_changed(&file.name, c)))
        .collect()
}

/// Keep changed paths with one of the given extensions; no extensions keeps all
pub fn filter_by_extension(paths: Vec<String>, extensions: &[String]) -> Vec<String> {
    if extensions.is_empty() {
        return paths;
    }

    paths
        .into_iter()
        .filter(|path| {
            extensions
                .iter()
                .any(|ext| path.ends_with(&format!(".{}", ext.trim_start_matches('.'))))
        })
        .collect()
}

/// Totals over the changed files
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChangedTotals {
    pub files: usize,
    pub lines: u64,
    pub covered: u64,
    pub missed: u64,
    /// Rounded to two decimals
    pub percentage: f64,
}

impl ChangedTotals {
    pub fn from_files(files: &[&FileCoverage]) -> Self {
        let lines = files.iter().map(|f| f.lines).sum();
        let covered = files.iter().map(|f| f.covered).sum();
        let missed = files.iter().map(|f| f.missed).sum();

        Self {
            files: files.len(),
            lines,
            covered,
            missed,
            percentage: percentage(covered, lines, 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, lines: u64, covered: u64) -> FileCoverage {
        FileCoverage {
            name: name.to_string(),
            path: format!("/project/{}", name),
            lines,
            covered,
            missed: lines - covered,
            percentage: percentage(covered, lines, 1),
            missed_lines: Vec::new(),
        }
    }

    #[test]
    fn test_matches_in_both_directions() {
        assert!(matches_changed("app/models/user.rb", "user.rb"));
        assert!(matches_changed("user.rb", "app/models/user.rb"));
        assert!(!matches_changed("app/models/user.rb", "nonexistent.rb"));
    }

    #[test]
    fn test_loose_match_accepts_suffix_collisions() {
        // Kept deliberately: `b.rb` is contained in `ab.rb`
        assert!(matches_changed("ab.rb", "b.rb"));
    }

    #[test]
    fn test_filter_changed() {
        let files = vec![file("user.rb", 20, 19), file("email_job.rb", 16, 12), file("helper.rb", 11, 10)];

        let changed = vec!["app/models/user.rb".to_string(), "lib/utils/helper.rb".to_string()];
        let selected = filter_changed(&files, &changed);
        let names: Vec<_> = selected.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["user.rb", "helper.rb"]);

        assert!(filter_changed(&files, &["nonexistent.rb".to_string()]).is_empty());
    }

    #[test]
    fn test_changed_totals() {
        let files = vec![file("a.rb", 10, 10), file("b.rb", 10, 5)];
        let refs: Vec<_> = files.iter().collect();
        let totals = ChangedTotals::from_files(&refs);

        assert_eq!(totals.files, 2);
        assert_eq!(totals.lines, 20);
        assert_eq!(totals.covered + totals.missed, totals.lines);
        assert_eq!(format!("{:.2}", totals.percentage), "75.00");

        assert_eq!(ChangedTotals::from_files(&[]).percentage, 0.0);
    }

    #[test]
    fn test_select_source() {
        assert_eq!(ChangedFilesSource::select(false, Some("main"), true, Some(7)), ChangedFilesSource::Disabled);
        assert_eq!(
            ChangedFilesSource::select(true, Some("main"), true, Some(7)),
            ChangedFilesSource::Git("main".to_string())
        );
        assert_eq!(ChangedFilesSource::select(true, None, true, Some(7)), ChangedFilesSource::PullRequest(7));
        assert_eq!(ChangedFilesSource::select(true, None, true, None), ChangedFilesSource::Unavailable);
        assert_eq!(ChangedFilesSource::select(true, None, false, Some(7)), ChangedFilesSource::Unavailable);
    }

    #[test]
    fn test_failed_fetch_falls_back_to_full_report() {
        let fetched = Err(anyhow::anyhow!("GitHub list files request failed: connection refused"));
        assert_eq!(resolve_changed_files(fetched, &["rb".to_string()]), None);
    }

    #[test]
    fn test_fetched_files_are_filtered() {
        let fetched = Ok(vec!["app/a.rb".to_string(), "README.md".to_string()]);
        assert_eq!(
            resolve_changed_files(fetched, &["rb".to_string()]),
            Some(vec!["app/a.rb".to_string()])
        );
    }

    #[test]
    fn test_filter_by_extension() {
        let paths = vec!["app/a.rb".to_string(), "README.md".to_string(), "lib/b.rb".to_string()];

        assert_eq!(
            filter_by_extension(paths.clone(), &["rb".to_string()]),
            vec!["app/a.rb".to_string(), "lib/b.rb".to_string()]
        );
        assert_eq!(filter_by_extension(paths.clone(), &[".md".to_string()]), vec!["README.md".to_string()]);
        assert_eq!(filter_by_extension(paths.clone(), &[]).len(), 3);
    }
}
