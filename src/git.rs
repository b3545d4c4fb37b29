//! Changed files from the local git repository

use anyhow::{Context, Result};
use git2::{DiffOptions, Repository, StatusOptions};
use std::collections::BTreeSet;
use std::path::Path;

pub struct GitChanges {
    repo: Repository,
}

impl GitChanges {
    /// Open the repository containing `path`
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("Failed to find git repository at {}", path.display()))?;

        Ok(Self { repo })
    }

    /// Uncommitted changes plus files changed between `since` and HEAD,
    /// sorted and deduplicated
    pub fn changed_since(&self, since: &str) -> Result<Vec<String>> {
        let mut files = self.uncommitted()?;
        files.extend(self.committed_since(since)?);

        Ok(files.into_iter().collect())
    }

    /// Staged, unstaged and untracked paths
    pub fn uncommitted(&self) -> Result<BTreeSet<String>> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true);
        opts.recurse_untracked_dirs(true);

        let statuses = self.repo.statuses(Some(&mut opts))?;

        Ok(statuses
            .iter()
            .filter_map(|entry| entry.path().map(str::to_string))
            .collect())
    }

    fn committed_since(&self, since: &str) -> Result<BTreeSet<String>> {
        let mut files = BTreeSet::new();

        let old_tree = self
            .repo
            .revparse_single(since)
            .with_context(|| format!("Failed to resolve reference: {}", since))?
            .peel_to_commit()?
            .tree()?;
        let new_tree = self.repo.head()?.peel_to_commit()?.tree()?;

        let mut diff_opts = DiffOptions::new();
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut diff_opts))?;

        // Deleted files have no coverage rows, only the new side matters
        for delta in diff.deltas() {
            if let Some(path) = delta.new_file().path() {
                files.insert(path.to_string_lossy().to_string());
            }
        }

        Ok(files)
    }
}
