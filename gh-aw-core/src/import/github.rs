//! Thin GitHub API client for resolving import refs to commit SHAs and
//! fetching raw file content, with bounded retry on transient failures.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{instrument, warn};

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("gh-aw")
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build HTTP client"),
            token,
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Resolves a tag or branch name to its commit SHA; a 40-hex ref passes through.
    #[instrument(skip(self), fields(owner = %owner, repo = %repo, git_ref = %git_ref))]
    pub async fn resolve_ref(&self, owner: &str, repo: &str, git_ref: &str) -> Result<String> {
        if git_ref.len() == 40 && git_ref.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(git_ref.to_string());
        }

        let tag_url = format!("{GITHUB_API_BASE}/repos/{owner}/{repo}/git/ref/tags/{git_ref}");
        if let Some(json) = self.api_get_optional_retried(&tag_url).await? {
            return self.extract_commit_sha(&json, owner, repo).await;
        }

        let branch_url = format!("{GITHUB_API_BASE}/repos/{owner}/{repo}/git/ref/heads/{git_ref}");
        let json = self
            .api_get_retried(&branch_url)
            .await
            .with_context(|| format!("ref '{git_ref}' not found as tag or branch in {owner}/{repo}"))?;

        self.extract_commit_sha(&json, owner, repo).await
    }

    #[instrument(skip(self, ref_json))]
    async fn extract_commit_sha(&self, ref_json: &Value, owner: &str, repo: &str) -> Result<String> {
        let obj = ref_json
            .get("object")
            .context("missing 'object' in ref response")?;
        let obj_type = obj
            .get("type")
            .and_then(|v| v.as_str())
            .context("missing 'type' in ref object")?;
        let sha = obj
            .get("sha")
            .and_then(|v| v.as_str())
            .context("missing 'sha' in ref object")?;

        if obj_type == "commit" {
            return Ok(sha.to_string());
        }

        if obj_type == "tag" {
            let tag_url = format!("{GITHUB_API_BASE}/repos/{owner}/{repo}/git/tags/{sha}");
            let tag_json = self.api_get_retried(&tag_url).await?;
            let commit_sha = tag_json
                .get("object")
                .and_then(|o| o.get("sha"))
                .and_then(|v| v.as_str())
                .context("missing commit sha in annotated tag")?;
            return Ok(commit_sha.to_string());
        }

        bail!("unexpected ref object type: {obj_type}");
    }

    async fn api_get_optional(&self, url: &str) -> Result<Option<Value>> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            bail!("{url} returned HTTP {status}");
        }

        response
            .json()
            .await
            .with_context(|| format!("failed to parse JSON from {url}"))
    }

    async fn api_get_optional_retried(&self, url: &str) -> Result<Option<Value>> {
        with_retry(url, || self.api_get_optional(url)).await
    }

    pub async fn api_get(&self, url: &str) -> Result<Value> {
        self.api_get_optional(url)
            .await?
            .ok_or_else(|| anyhow::anyhow!("{url} returned HTTP 404"))
    }

    async fn api_get_retried(&self, url: &str) -> Result<Value> {
        with_retry(url, || self.api_get(url)).await
    }

    /// Fetch raw file content from a repository via raw.githubusercontent.com.
    #[instrument(skip(self))]
    pub async fn get_raw_content(&self, owner: &str, repo: &str, git_ref: &str, path: &str) -> Result<String> {
        let url = format!("https://raw.githubusercontent.com/{owner}/{repo}/{git_ref}/{path}");
        with_retry(&url, || self.get_raw_content_once(&url)).await
    }

    async fn get_raw_content_once(&self, url: &str) -> Result<String> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to fetch {url}"))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            bail!("{url} not found");
        }
        if !status.is_success() {
            bail!("{url} returned HTTP {status}");
        }

        response
            .text()
            .await
            .with_context(|| format!("failed to read body from {url}"))
    }
}

/// Transient-network retry: up to `MAX_ATTEMPTS` tries with exponential
/// backoff. A 404 (surfaced as `Ok(None)`/a "not found" message) is not
/// retried — only genuine transport/5xx failures are.
async fn with_retry<T, F, Fut>(url: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut last_err = None;
    for attempt_no in 1..=MAX_ATTEMPTS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if is_not_found(&e) => return Err(e),
            Err(e) => {
                warn!(url, attempt_no, error = %e, "transient fetch failure, retrying");
                last_err = Some(e);
                if attempt_no < MAX_ATTEMPTS {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{url}: exhausted retries")))
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.to_string().contains("404") || e.to_string().contains("not found")
}
