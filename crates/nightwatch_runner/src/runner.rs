//! Container runner trait and execution types.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SandboxConfig;
use crate::error::RunnerResult;

/// Exit code synthesized when an exec is killed on timeout.
pub const TIMEOUT_EXIT_CODE: i64 = 124;

/// Result of one command execution inside a sandbox session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutcome {
    /// Exit code of the command; 124 when killed on timeout
    pub exit_code: i64,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Whether the command was killed after exceeding its timeout
    pub timed_out: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl ExecOutcome {
    /// Check if the command succeeded (exit code 0, no timeout).
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// A live sandbox session as seen by the janitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Container ID
    pub container_id: String,
    /// Workspace directory the session is bound to, from the container label
    pub workspace: Option<PathBuf>,
    /// Session creation time
    pub created_at: DateTime<Utc>,
}

/// Container runner trait.
///
/// A session is one ephemeral container bound to a workspace directory.
/// Sessions stay alive between `exec` calls so dependency installation and
/// test runs share the same filesystem state; callers must release them on
/// all exit paths (see [`crate::session::with_sandbox`]).
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    /// Check if the container runtime is reachable.
    async fn is_available(&self) -> RunnerResult<bool>;

    /// Pull a container image.
    async fn pull_image(&self, image: &str, tag: &str) -> RunnerResult<()>;

    /// Check if an image exists locally.
    async fn image_exists(&self, image: &str, tag: &str) -> RunnerResult<bool>;

    /// Create and start a session container; returns the container ID.
    async fn create_session(&self, config: &SandboxConfig) -> RunnerResult<String>;

    /// Run a command inside a session with a timeout.
    ///
    /// On timeout the container is killed and the outcome carries exit
    /// code 124 with `timed_out = true`.
    async fn exec(
        &self,
        container_id: &str,
        argv: &[String],
        timeout: Duration,
    ) -> RunnerResult<ExecOutcome>;

    /// Stop and remove a session container.
    async fn remove_session(&self, container_id: &str) -> RunnerResult<()>;

    /// Enumerate live sessions created by this agent (label-filtered).
    async fn list_sessions(&self) -> RunnerResult<Vec<SessionInfo>>;
}
