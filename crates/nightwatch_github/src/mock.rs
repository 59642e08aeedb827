//! Mock code host for testing.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::client::{CodeHost, PullRequestSpec};
use crate::error::{HostError, HostResult};
use crate::logs::JobLog;

/// A pull request captured by the mock.
#[derive(Debug, Clone)]
pub struct CapturedPullRequest {
    pub repo: String,
    pub spec: PullRequestSpec,
}

/// An issue captured by the mock.
#[derive(Debug, Clone)]
pub struct CapturedIssue {
    pub repo: String,
    pub title: String,
    pub body: String,
}

/// Mock code host with preset logs; records created PRs and issues.
#[derive(Clone, Default)]
pub struct MockCodeHost {
    logs: Arc<RwLock<Vec<JobLog>>>,
    pull_requests: Arc<RwLock<Vec<CapturedPullRequest>>>,
    issues: Arc<RwLock<Vec<CapturedIssue>>>,
    fail_logs: Arc<RwLock<Option<String>>>,
}

impl MockCodeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset the logs returned for any run.
    pub fn with_logs(self, logs: Vec<JobLog>) -> Self {
        *self.logs.write() = logs;
        self
    }

    pub fn with_job_log(self, job: impl Into<String>, text: impl Into<String>) -> Self {
        self.logs.write().push(JobLog {
            job: job.into(),
            text: text.into(),
        });
        self
    }

    /// Make log download fail with the given message.
    pub fn fail_log_download(self, message: impl Into<String>) -> Self {
        *self.fail_logs.write() = Some(message.into());
        self
    }

    pub fn pull_requests(&self) -> Vec<CapturedPullRequest> {
        self.pull_requests.read().clone()
    }

    pub fn issues(&self) -> Vec<CapturedIssue> {
        self.issues.read().clone()
    }
}

#[async_trait]
impl CodeHost for MockCodeHost {
    async fn download_run_logs(&self, _repo: &str, _run_id: i64) -> HostResult<Vec<JobLog>> {
        if let Some(msg) = self.fail_logs.read().clone() {
            return Err(HostError::Api {
                status: 502,
                body: msg,
            });
        }
        Ok(self.logs.read().clone())
    }

    async fn create_pull_request(&self, repo: &str, spec: &PullRequestSpec) -> HostResult<String> {
        self.pull_requests.write().push(CapturedPullRequest {
            repo: repo.to_string(),
            spec: spec.clone(),
        });
        Ok(format!(
            "https://github.test/{}/pull/{}",
            repo,
            self.pull_requests.read().len()
        ))
    }

    async fn create_issue(&self, repo: &str, title: &str, body: &str) -> HostResult<String> {
        self.issues.write().push(CapturedIssue {
            repo: repo.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(format!(
            "https://github.test/{}/issues/{}",
            repo,
            self.issues.read().len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_host_records_outputs() {
        let host = MockCodeHost::new().with_job_log("test", "FAILED tests/test_x.py");

        let logs = host.download_run_logs("acme/x", 1001).await.unwrap();
        assert_eq!(logs.len(), 1);

        let url = host
            .create_pull_request(
                "acme/x",
                &PullRequestSpec {
                    title: "Fix".into(),
                    body: "body".into(),
                    head: "nightwatch/fix-1001".into(),
                    base: "main".into(),
                },
            )
            .await
            .unwrap();
        assert!(url.contains("/pull/1"));

        let issue_url = host.create_issue("acme/x", "Escalation", "details").await.unwrap();
        assert!(issue_url.contains("/issues/1"));
        assert_eq!(host.pull_requests().len(), 1);
        assert_eq!(host.issues().len(), 1);
    }
}
