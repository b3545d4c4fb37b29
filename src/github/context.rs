//! Workflow run context read from the GitHub Actions environment

use anyhow::{Context, Result};
use serde_json::Value;
use std::env;
use std::fs;

use crate::report::SourceLinks;

const DEFAULT_SERVER_URL: &str = "https://github.com";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Default)]
pub struct GithubContext {
    /// `owner/repo`
    pub repository: String,
    pub sha: String,
    pub job: String,
    pub event_name: String,
    pub server_url: String,
    pub api_url: String,
    pub pull_request_number: Option<u64>,
    pub issue_number: Option<u64>,
}

impl GithubContext {
    /// Read the context from the process environment.
    ///
    /// Missing variables leave fields empty so local runs still render.
    pub fn from_env() -> Self {
        let mut context = Self::from_lookup(|name| env::var(name).ok());

        if let Ok(path) = env::var("GITHUB_EVENT_PATH") {
            match read_event(&path) {
                Ok(payload) => context.apply_payload(&payload),
                Err(e) => tracing::warn!("Could not read event payload: {:#}", e),
            }
        }

        context
    }

    /// Build a context from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Self {
            repository: var("GITHUB_REPOSITORY").unwrap_or_default(),
            sha: var("GITHUB_SHA").or_else(|| var("GIT_COMMIT")).unwrap_or_default(),
            job: var("GITHUB_JOB").unwrap_or_else(|| "local".to_string()),
            event_name: var("GITHUB_EVENT_NAME").unwrap_or_default(),
            server_url: var("GITHUB_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            api_url: var("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            pull_request_number: None,
            issue_number: None,
        }
    }

    /// Pick up `pull_request.number` and `issue.number` from an event payload
    pub fn apply_payload(&mut self, payload: &Value) {
        self.pull_request_number = payload.pointer("/pull_request/number").and_then(Value::as_u64);
        self.issue_number = payload.pointer("/issue/number").and_then(Value::as_u64);
    }

    pub fn is_pull_request(&self) -> bool {
        matches!(self.event_name.as_str(), "pull_request" | "pull_request_target")
    }

    /// Explicit number first, then the pull request, then the issue
    pub fn target_number(&self, configured: Option<u64>) -> Option<u64> {
        configured.or(self.pull_request_number).or(self.issue_number)
    }

    pub fn repo_url(&self) -> String {
        format!("{}/{}", self.server_url.trim_end_matches('/'), self.repository)
    }

    pub fn source_links(&self, path_prefix: &str) -> SourceLinks {
        SourceLinks {
            repo_url: self.repo_url(),
            commit: self.sha.clone(),
            path_prefix: path_prefix.to_string(),
        }
    }
}

fn read_event(path: &str) -> Result<Value> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn context_from(vars: &[(&str, &str)]) -> GithubContext {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        GithubContext::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_for_local_runs() {
        let context = context_from(&[]);

        assert_eq!(context.job, "local");
        assert_eq!(context.api_url, DEFAULT_API_URL);
        assert!(!context.is_pull_request());
        assert_eq!(context.target_number(None), None);
    }

    #[test]
    fn test_reads_variables() {
        let context = context_from(&[
            ("GITHUB_REPOSITORY", "acme/shop"),
            ("GITHUB_SHA", "abc"),
            ("GITHUB_JOB", "rspec"),
            ("GITHUB_EVENT_NAME", "pull_request"),
            ("GITHUB_SERVER_URL", "https://ghe.example.com/"),
        ]);

        assert!(context.is_pull_request());
        assert_eq!(context.repo_url(), "https://ghe.example.com/acme/shop");
        assert_eq!(
            context.source_links("api/").file_url("a.rb"),
            "https://ghe.example.com/acme/shop/blob/abc/api/a.rb"
        );
    }

    #[test]
    fn test_target_number_precedence() {
        let mut context = context_from(&[]);
        context.apply_payload(&json!({"pull_request": {"number": 7}, "issue": {"number": 9}}));

        assert_eq!(context.target_number(Some(1)), Some(1));
        assert_eq!(context.target_number(None), Some(7));

        context.apply_payload(&json!({"issue": {"number": 9}}));
        assert_eq!(context.target_number(None), Some(9));
    }
}
