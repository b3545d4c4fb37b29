//! GitHub REST client for pull-request files and issue comments

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use crate::comment::find_previous;

const PER_PAGE: usize = 100;
const USER_AGENT: &str = "covcomment";

/// One entry of `GET /repos/{repo}/issues/{n}/comments`
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullFile {
    filename: String,
}

/// What happened to the comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOutcome {
    Created,
    Updated(u64),
}

pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    repository: String,
    token: String,
}

impl GithubClient {
    pub fn new(token: &str, api_url: &str, repository: &str) -> Result<Self> {
        if repository.is_empty() {
            anyhow::bail!("GITHUB_REPOSITORY not set");
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, self.repository, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("GitHub {} request failed", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub {} failed: {} - {}", what, status, text);
        }

        Ok(response)
    }

    /// Fetch every page of a list endpoint
    async fn paginate<T>(&self, path: &str, what: &str) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut items = Vec::new();
        let url = self.url(path);

        for page in 1.. {
            let request = self
                .request(reqwest::Method::GET, &url)
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let batch: Vec<T> = self
                .send(request, what)
                .await?
                .json()
                .await
                .with_context(|| format!("Invalid GitHub {} response", what))?;

            let last = batch.len() < PER_PAGE;
            items.extend(batch);
            if last {
                break;
            }
        }

        Ok(items)
    }

    /// Paths of every file touched by a pull request
    pub async fn list_pull_files(&self, number: u64) -> Result<Vec<String>> {
        let files: Vec<PullFile> = self.paginate(&format!("pulls/{}/files", number), "list files").await?;
        tracing::debug!("Pull request #{} touches {} files", number, files.len());
        Ok(files.into_iter().map(|f| f.filename).collect())
    }

    pub async fn list_issue_comments(&self, number: u64) -> Result<Vec<IssueComment>> {
        self.paginate(&format!("issues/{}/comments", number), "list comments").await
    }

    pub async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        let request = self
            .request(reqwest::Method::POST, &self.url(&format!("issues/{}/comments", number)))
            .json(&json!({ "body": body }));
        self.send(request, "create comment").await?;
        Ok(())
    }

    pub async fn update_comment(&self, comment_id: u64, body: &str) -> Result<()> {
        let request = self
            .request(reqwest::Method::PATCH, &self.url(&format!("issues/comments/{}", comment_id)))
            .json(&json!({ "body": body }));
        self.send(request, "update comment").await?;
        Ok(())
    }

    /// Update the comment carrying `watermark`, or create one
    pub async fn upsert_comment(&self, number: u64, body: &str, watermark: &str) -> Result<CommentOutcome> {
        let comments = self.list_issue_comments(number).await?;
        let previous = find_previous(
            comments.iter().map(|c| (c.id, c.body.as_deref().unwrap_or(""))),
            watermark,
        );

        match previous {
            Some(id) => {
                tracing::info!("Found previous comment {}, updating", id);
                self.update_comment(id, body).await?;
                Ok(CommentOutcome::Updated(id))
            }
            None => {
                tracing::info!("No previous comment found, creating a new one");
                self.create_comment(number, body).await?;
                Ok(CommentOutcome::Created)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = GithubClient::new("t", "https://api.github.com/", "acme/shop").unwrap();
        assert_eq!(
            client.url("issues/3/comments"),
            "https://api.github.com/repos/acme/shop/issues/3/comments"
        );
    }

    #[test]
    fn test_requires_repository() {
        assert!(GithubClient::new("t", "https://api.github.com", "").is_err());
    }

    #[test]
    fn test_comment_payload_shape() {
        let comments: Vec<IssueComment> =
            serde_json::from_str(r#"[{"id": 1, "body": "hi"}, {"id": 2, "body": null}, {"id": 3}]"#).unwrap();

        assert_eq!(comments.len(), 3);
        assert_eq!(comments[0].body.as_deref(), Some("hi"));
        assert!(comments[2].body.is_none());
    }
}
