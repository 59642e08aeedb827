//! Mock container runner for testing.
//!
//! Provides a configurable mock implementation of the ContainerRunner trait
//! for use in tests without requiring an actual Docker daemon.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::config::SandboxConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{ContainerRunner, ExecOutcome, SessionInfo, TIMEOUT_EXIT_CODE};

/// Predefined mock outcome for an exec call.
#[derive(Debug, Clone)]
pub struct MockExec {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl MockExec {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            timed_out: false,
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    pub fn timeout() -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
        }
    }

    fn into_outcome(self) -> ExecOutcome {
        ExecOutcome {
            exit_code: self.exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
            timed_out: self.timed_out,
            duration_ms: 10,
        }
    }
}

/// Captured exec call for verification.
#[derive(Debug, Clone)]
pub struct CapturedExec {
    pub container_id: String,
    pub argv: Vec<String>,
    pub timeout: Duration,
}

#[derive(Debug)]
struct ExecRule {
    pattern: String,
    queue: VecDeque<MockExec>,
    last: Option<MockExec>,
}

#[derive(Debug, Clone)]
struct MockSession {
    container_id: String,
    workspace: PathBuf,
    created_at: DateTime<Utc>,
    removed: bool,
}

/// Mock container runner for testing.
///
/// Exec outcomes are scripted by command substring: `queue_exec("pytest", ...)`
/// answers the next exec whose argv contains "pytest". Outcomes queued under
/// the same pattern are consumed in order; the last one sticks. Commands with
/// no matching rule succeed with empty output.
#[derive(Clone, Default)]
pub struct MockRunner {
    rules: Arc<RwLock<Vec<ExecRule>>>,
    sessions: Arc<RwLock<Vec<MockSession>>>,
    captured_execs: Arc<RwLock<Vec<CapturedExec>>>,
    existing_images: Arc<RwLock<Vec<String>>>,
    fail_create: Arc<RwLock<Option<String>>>,
    fail_exec: Arc<RwLock<Option<String>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next exec whose argv contains `pattern`.
    pub fn queue_exec(&self, pattern: impl Into<String>, outcome: MockExec) -> &Self {
        let pattern = pattern.into();
        let mut rules = self.rules.write();
        if let Some(rule) = rules.iter_mut().find(|r| r.pattern == pattern) {
            rule.queue.push_back(outcome);
        } else {
            rules.push(ExecRule {
                pattern,
                queue: VecDeque::from([outcome]),
                last: None,
            });
        }
        self
    }

    /// Mark an image as locally present.
    pub fn add_existing_image(self, image: impl Into<String>) -> Self {
        self.existing_images.write().push(image.into());
        self
    }

    /// Make `create_session` fail with the given message.
    pub fn fail_create_session(self, message: impl Into<String>) -> Self {
        *self.fail_create.write() = Some(message.into());
        self
    }

    /// Make `exec` fail with the given message.
    pub fn fail_exec(self, message: impl Into<String>) -> Self {
        *self.fail_exec.write() = Some(message.into());
        self
    }

    /// All exec calls made so far.
    pub fn exec_calls(&self) -> Vec<CapturedExec> {
        self.captured_execs.read().clone()
    }

    /// Exec calls whose argv contains `pattern`.
    pub fn exec_calls_matching(&self, pattern: &str) -> Vec<CapturedExec> {
        self.captured_execs
            .read()
            .iter()
            .filter(|c| c.argv.join(" ").contains(pattern))
            .cloned()
            .collect()
    }

    /// Sessions created and not yet removed.
    pub fn active_sessions(&self) -> Vec<String> {
        self.sessions
            .read()
            .iter()
            .filter(|s| !s.removed)
            .map(|s| s.container_id.clone())
            .collect()
    }

    /// Total number of sessions ever created.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Backdate a session so janitor tests can see a stale one.
    pub fn backdate_session(&self, container_id: &str, created_at: DateTime<Utc>) {
        if let Some(s) = self
            .sessions
            .write()
            .iter_mut()
            .find(|s| s.container_id == container_id)
        {
            s.created_at = created_at;
        }
    }

    fn next_outcome(&self, argv: &[String]) -> ExecOutcome {
        let joined = argv.join(" ");
        let mut rules = self.rules.write();
        for rule in rules.iter_mut() {
            if joined.contains(&rule.pattern) {
                if let Some(outcome) = rule.queue.pop_front() {
                    rule.last = Some(outcome.clone());
                    return outcome.into_outcome();
                }
                if let Some(last) = &rule.last {
                    return last.clone().into_outcome();
                }
            }
        }
        MockExec::success("").into_outcome()
    }
}

#[async_trait]
impl ContainerRunner for MockRunner {
    async fn is_available(&self) -> RunnerResult<bool> {
        Ok(true)
    }

    async fn pull_image(&self, image: &str, tag: &str) -> RunnerResult<()> {
        self.existing_images.write().push(format!("{}:{}", image, tag));
        Ok(())
    }

    async fn image_exists(&self, image: &str, tag: &str) -> RunnerResult<bool> {
        let full_image = format!("{}:{}", image, tag);
        Ok(self.existing_images.read().contains(&full_image))
    }

    async fn create_session(&self, config: &SandboxConfig) -> RunnerResult<String> {
        if let Some(msg) = self.fail_create.read().clone() {
            return Err(RunnerError::ExecFailed(msg));
        }
        let container_id = format!("mock-{}", Uuid::new_v4());
        self.sessions.write().push(MockSession {
            container_id: container_id.clone(),
            workspace: config.workspace.clone(),
            created_at: Utc::now(),
            removed: false,
        });
        Ok(container_id)
    }

    async fn exec(
        &self,
        container_id: &str,
        argv: &[String],
        timeout: Duration,
    ) -> RunnerResult<ExecOutcome> {
        self.captured_execs.write().push(CapturedExec {
            container_id: container_id.to_string(),
            argv: argv.to_vec(),
            timeout,
        });
        if let Some(msg) = self.fail_exec.read().clone() {
            return Err(RunnerError::ExecFailed(msg));
        }
        Ok(self.next_outcome(argv))
    }

    async fn remove_session(&self, container_id: &str) -> RunnerResult<()> {
        let mut sessions = self.sessions.write();
        match sessions.iter_mut().find(|s| s.container_id == container_id) {
            Some(session) => {
                session.removed = true;
                Ok(())
            }
            None => Err(RunnerError::SessionNotFound(container_id.to_string())),
        }
    }

    async fn list_sessions(&self) -> RunnerResult<Vec<SessionInfo>> {
        Ok(self
            .sessions
            .read()
            .iter()
            .filter(|s| !s.removed)
            .map(|s| SessionInfo {
                container_id: s.container_id.clone(),
                workspace: Some(s.workspace.clone()),
                created_at: s.created_at,
            })
            .collect())
    }
}
