//! Code-host REST client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HostError, HostResult};
use crate::logs::{extract_job_logs, JobLog};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "nightwatch-ci-agent";

/// A review request to open for a verified fix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestSpec {
    pub title: String,
    pub body: String,
    /// Branch carrying the fix
    pub head: String,
    /// Branch the run failed on
    pub base: String,
}

/// Code-host operations the pipeline depends on.
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Download a workflow run's logs, one entry per job.
    async fn download_run_logs(&self, repo: &str, run_id: i64) -> HostResult<Vec<JobLog>>;

    /// Open a review request; returns its URL.
    async fn create_pull_request(&self, repo: &str, spec: &PullRequestSpec) -> HostResult<String>;

    /// Open an escalation issue; returns its URL.
    async fn create_issue(&self, repo: &str, title: &str, body: &str) -> HostResult<String>;
}

/// GitHub REST implementation of [`CodeHost`].
pub struct GithubClient {
    token: String,
    api_base: String,
    client: reqwest::Client,
}

impl GithubClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the API base URL (used by tests against a local server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
    }

    async fn check(response: reqwest::Response) -> HostResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CodeHost for GithubClient {
    async fn download_run_logs(&self, repo: &str, run_id: i64) -> HostResult<Vec<JobLog>> {
        let url = format!("{}/repos/{}/actions/runs/{}/logs", self.api_base, repo, run_id);
        let response = self.request(reqwest::Method::GET, url).send().await?;
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        extract_job_logs(&bytes)
    }

    async fn create_pull_request(&self, repo: &str, spec: &PullRequestSpec) -> HostResult<String> {
        info!("Opening pull request on {} from {}", repo, spec.head);
        let url = format!("{}/repos/{}/pulls", self.api_base, repo);
        let response = self
            .request(reqwest::Method::POST, url)
            .json(spec)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let created: CreatedResource = response.json().await?;
        Ok(created.html_url)
    }

    async fn create_issue(&self, repo: &str, title: &str, body: &str) -> HostResult<String> {
        info!("Opening escalation issue on {}", repo);
        let url = format!("{}/repos/{}/issues", self.api_base, repo);
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&serde_json::json!({ "title": title, "body": body }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        let created: CreatedResource = response.json().await?;
        Ok(created.html_url)
    }
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    html_url: String,
}
