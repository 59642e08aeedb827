//! Integration tests for the sandbox execution layer.
//!
//! These tests exercise the runner trait through the mock implementation so
//! no Docker daemon is required.

use std::sync::Arc;
use std::time::Duration;

use nightwatch_runner::{
    with_sandbox, ContainerRunner, MockExec, MockRunner, RunnerError, SandboxConfig,
    TIMEOUT_EXIT_CODE,
};

/// A reproduction-shaped flow: install deps, run tests, observe the failure.
#[tokio::test]
async fn test_reproduction_shaped_flow() {
    let mock = MockRunner::new();
    mock.queue_exec("pip install --upgrade pip", MockExec::success("ok"));
    mock.queue_exec("pip install pytest", MockExec::success("ok"));
    mock.queue_exec(
        "pytest",
        MockExec::failure(1, "AssertionError: expected 3, got None"),
    );

    let runner: Arc<dyn ContainerRunner> = Arc::new(mock.clone());
    let config = SandboxConfig::new("python", "/tmp/repro-ws").tag("3.11-slim");

    let outcome = with_sandbox::<_, RunnerError, _, _>(runner, &config, |sandbox| async move {
        sandbox
            .exec_args(&["pip", "install", "--upgrade", "pip"], Duration::from_secs(60))
            .await?;
        sandbox
            .exec_args(&["pip", "install", "pytest"], Duration::from_secs(60))
            .await?;
        sandbox
            .exec_args(
                &["python", "-m", "pytest", "tests/", "-v", "--tb=short"],
                Duration::from_secs(300),
            )
            .await
    })
    .await
    .unwrap();

    assert_eq!(outcome.exit_code, 1);
    assert!(outcome.stderr.contains("AssertionError"));
    // Session released on exit
    assert!(mock.active_sessions().is_empty());
    assert_eq!(mock.exec_calls().len(), 3);
}

/// Timeouts synthesize exit code 124 and the timed_out flag.
#[tokio::test]
async fn test_timeout_synthesizes_exit_124() {
    let mock = MockRunner::new();
    mock.queue_exec("pytest", MockExec::timeout());

    let runner: Arc<dyn ContainerRunner> = Arc::new(mock.clone());
    let config = SandboxConfig::new("python", "/tmp/ws");

    let outcome = with_sandbox::<_, RunnerError, _, _>(runner, &config, |sandbox| async move {
        sandbox
            .exec_args(&["python", "-m", "pytest"], Duration::from_secs(1))
            .await
    })
    .await
    .unwrap();

    assert!(outcome.timed_out);
    assert_eq!(outcome.exit_code, TIMEOUT_EXIT_CODE);
    assert!(!outcome.success());
    assert!(mock.active_sessions().is_empty());
}

/// Session creation failure surfaces as an error with nothing to clean up.
#[tokio::test]
async fn test_create_failure_bubbles() {
    let mock = MockRunner::new().fail_create_session("daemon unreachable");
    let runner: Arc<dyn ContainerRunner> = Arc::new(mock.clone());
    let config = SandboxConfig::new("python", "/tmp/ws");

    let result = with_sandbox::<(), RunnerError, _, _>(runner, &config, |_| async move {
        panic!("body should not run")
    })
    .await;

    assert!(result.is_err());
    assert_eq!(mock.session_count(), 0);
}

/// Sessions advertise their bound workspace for the janitor.
#[tokio::test]
async fn test_list_sessions_reports_workspace_binding() {
    let mock = MockRunner::new();
    let runner: Arc<dyn ContainerRunner> = Arc::new(mock.clone());

    let config = SandboxConfig::new("python", "/tmp/nightwatch/ws-1");
    let id = runner.create_session(&config).await.unwrap();

    let sessions = runner.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].container_id, id);
    assert_eq!(
        sessions[0].workspace.as_deref(),
        Some(std::path::Path::new("/tmp/nightwatch/ws-1"))
    );

    runner.remove_session(&id).await.unwrap();
    assert!(runner.list_sessions().await.unwrap().is_empty());
}
