//! Scoped sandbox sessions.
//!
//! [`with_sandbox`] owns the session lifecycle: create, hand an exec handle
//! to the body, and remove the container on every exit path including body
//! errors. Removal failures are logged and swallowed so they never mask the
//! body's result.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::SandboxConfig;
use crate::error::RunnerError;
use crate::runner::{ContainerRunner, ExecOutcome};

/// Exec handle for a live sandbox session.
#[derive(Clone)]
pub struct SandboxHandle {
    runner: Arc<dyn ContainerRunner>,
    container_id: String,
}

impl SandboxHandle {
    /// Container ID of the underlying session.
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Run a command in the session with a timeout.
    pub async fn exec(
        &self,
        argv: &[String],
        timeout: Duration,
    ) -> Result<ExecOutcome, RunnerError> {
        self.runner.exec(&self.container_id, argv, timeout).await
    }

    /// Convenience for string-literal argv.
    pub async fn exec_args(
        &self,
        argv: &[&str],
        timeout: Duration,
    ) -> Result<ExecOutcome, RunnerError> {
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        self.exec(&argv, timeout).await
    }
}

/// Run `body` against a fresh sandbox session, guaranteeing teardown.
pub async fn with_sandbox<T, E, F, Fut>(
    runner: Arc<dyn ContainerRunner>,
    config: &SandboxConfig,
    body: F,
) -> Result<T, E>
where
    E: From<RunnerError>,
    F: FnOnce(SandboxHandle) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let container_id = runner.create_session(config).await.map_err(E::from)?;

    let handle = SandboxHandle {
        runner: runner.clone(),
        container_id: container_id.clone(),
    };

    let result = body(handle).await;

    if let Err(e) = runner.remove_session(&container_id).await {
        warn!("Failed to remove sandbox session {}: {}", container_id, e);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockExec, MockRunner};

    #[tokio::test]
    async fn test_with_sandbox_removes_session_on_success() {
        let mock = MockRunner::new();
        let runner: Arc<dyn ContainerRunner> = Arc::new(mock.clone());
        let config = SandboxConfig::new("python", "/tmp/ws");

        let out: Result<String, RunnerError> = with_sandbox(runner, &config, |sandbox| async move {
            let result = sandbox
                .exec_args(&["echo", "hello"], Duration::from_secs(5))
                .await?;
            Ok(result.stdout)
        })
        .await;

        assert!(out.is_ok());
        assert_eq!(mock.session_count(), 1);
        assert!(mock.active_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_with_sandbox_removes_session_on_body_error() {
        let mock = MockRunner::new();
        mock.queue_exec("pytest", MockExec::failure(2, "boom"));
        let runner: Arc<dyn ContainerRunner> = Arc::new(mock.clone());
        let config = SandboxConfig::new("python", "/tmp/ws");

        let out: Result<(), RunnerError> = with_sandbox(runner, &config, |sandbox| async move {
            let _ = sandbox.exec_args(&["pytest"], Duration::from_secs(5)).await?;
            Err(RunnerError::ExecFailed("body gave up".into()))
        })
        .await;

        assert!(out.is_err());
        assert!(mock.active_sessions().is_empty());
    }
}
