//! Agent configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use nightwatch_store::FailureStore;

use crate::repro::DEFAULT_TEST_TIMEOUT;

/// Default sandbox image for Python projects.
pub const DEFAULT_SANDBOX_IMAGE: &str = "python:3.11-slim";

/// Process-wide agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Token for code-host API calls and pushes
    pub github_token: String,
    /// Shared webhook secret; unsigned events are accepted when absent
    /// (development mode only)
    pub webhook_secret: Option<String>,
    /// SQLite database path
    pub db_path: PathBuf,
    /// Managed directory all pipeline workspaces live under
    pub workspace_root: PathBuf,
    /// Sandbox image reference
    pub sandbox_image: String,
    /// Timeout for a full test-suite run
    pub test_timeout: Duration,
}

impl AgentConfig {
    /// Load configuration from environment variables.
    ///
    /// - `GITHUB_TOKEN`: required for code-host calls (empty allowed for
    ///   offline tooling)
    /// - `NIGHTWATCH_WEBHOOK_SECRET`: optional shared secret
    /// - `NIGHTWATCH_DB`: store path, defaults to `nightwatch.sqlite`
    /// - `NIGHTWATCH_WORKSPACE_ROOT`: defaults to `<tmp>/nightwatch`
    /// - `NIGHTWATCH_SANDBOX_IMAGE`: defaults to `python:3.11-slim`
    pub fn from_env() -> Self {
        let workspace_root = std::env::var("NIGHTWATCH_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("nightwatch"));

        Self {
            github_token: std::env::var("GITHUB_TOKEN").unwrap_or_default(),
            webhook_secret: std::env::var("NIGHTWATCH_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            db_path: FailureStore::default_path(),
            workspace_root,
            sandbox_image: std::env::var("NIGHTWATCH_SANDBOX_IMAGE")
                .unwrap_or_else(|_| DEFAULT_SANDBOX_IMAGE.to_string()),
            test_timeout: DEFAULT_TEST_TIMEOUT,
        }
    }
}
