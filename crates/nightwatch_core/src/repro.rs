//! Failure reproduction.
//!
//! Clones the repository at the failing commit into a fresh workspace,
//! detects the test harness, provisions a sandbox, and re-runs the test
//! suite. A non-zero exit code on the test command is the reproduction
//! signal; dependency-install failures are tolerated and logged so a broken
//! lockfile cannot mask the verdict the test run itself gives.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nightwatch_github::GitWorkspace;
use nightwatch_runner::{with_sandbox, ContainerRunner, ExecOutcome, SandboxConfig};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};

/// Default timeout for the test command.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for installing the project's declared dependencies.
const DEPS_INSTALL_TIMEOUT: Duration = Duration::from_secs(180);

/// Timeout for installing the package itself in editable mode.
const EDITABLE_INSTALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for bootstrapping pip and the test runner.
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(120);

/// What the workspace declares about its Python test setup.
#[derive(Debug, Clone, Default)]
pub struct Harness {
    pub has_requirements: bool,
    pub has_pytest_config: bool,
    pub has_setup_py: bool,
}

/// Inspect a checked-out workspace for its test harness.
pub fn detect_harness(workspace: &Path) -> Harness {
    let has_pytest_config = fs::read_to_string(workspace.join("pyproject.toml"))
        .map(|content| content.contains("[tool.pytest"))
        .unwrap_or(false);

    Harness {
        has_requirements: workspace.join("requirements.txt").is_file(),
        has_pytest_config,
        has_setup_py: workspace.join("setup.py").is_file(),
    }
}

/// Derive the default test command for a harness.
pub fn default_test_command(harness: &Harness) -> Vec<String> {
    if harness.has_pytest_config {
        vec!["python".into(), "-m".into(), "pytest".into()]
    } else {
        vec![
            "python".into(),
            "-m".into(),
            "pytest".into(),
            "tests/".into(),
            "-v".into(),
            "--tb=short".into(),
        ]
    }
}

/// Inputs to a reproduction run.
#[derive(Debug, Clone)]
pub struct ReproRequest {
    pub clone_url: String,
    pub sha: String,
    /// Override for the detected default test command
    pub test_command: Option<Vec<String>>,
    pub timeout: Duration,
    /// Sandbox image reference, e.g. `python:3.11-slim`
    pub image: String,
    /// Managed directory all workspaces live under
    pub workspace_root: PathBuf,
}

/// Outcome of a reproduction run.
#[derive(Debug, Clone)]
pub struct Reproduction {
    /// The tests failed in the sandbox, confirming the reported failure
    pub reproduced: bool,
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    /// Checked-out workspace; retained for the fix loop when reproduced
    pub workspace: PathBuf,
    pub test_command: Vec<String>,
}

/// Install the harness and run the test command in a fresh sandbox session.
///
/// Shared by reproduction and by each fix-loop attempt, which re-runs the
/// suite against the mutated workspace. Install steps that exit non-zero are
/// tolerated; only the test command's exit code matters.
pub async fn run_test_suite(
    runner: Arc<dyn ContainerRunner>,
    image: &str,
    workspace: &Path,
    test_command: &[String],
    timeout: Duration,
) -> PipelineResult<ExecOutcome> {
    let harness = detect_harness(workspace);
    let config = SandboxConfig::from_image_ref(image, workspace).name_prefix("nightwatch");
    let test_command = test_command.to_vec();

    with_sandbox(runner, &config, |sandbox| async move {
        let installs: Vec<(Vec<&str>, Duration)> = {
            let mut steps = vec![
                (vec!["pip", "install", "--upgrade", "pip"], BOOTSTRAP_TIMEOUT),
                (vec!["pip", "install", "pytest"], BOOTSTRAP_TIMEOUT),
            ];
            if harness.has_requirements {
                steps.push((
                    vec!["pip", "install", "-r", "requirements.txt"],
                    DEPS_INSTALL_TIMEOUT,
                ));
            }
            if harness.has_setup_py {
                steps.push((vec!["pip", "install", "-e", "."], EDITABLE_INSTALL_TIMEOUT));
            }
            steps
        };

        for (argv, step_timeout) in installs {
            let outcome = sandbox.exec_args(&argv, step_timeout).await?;
            if !outcome.success() {
                warn!(
                    "install step {:?} exited {} (timed_out={}); continuing",
                    argv, outcome.exit_code, outcome.timed_out
                );
            }
        }

        debug!("Running test command {:?}", test_command);
        let outcome = sandbox.exec(&test_command, timeout).await?;
        Ok::<_, PipelineError>(outcome)
    })
    .await
}

/// Clone the failing commit into a fresh workspace and try to reproduce.
///
/// On success the caller owns the returned workspace directory and must
/// delete it on every terminal path; on error the workspace is removed here
/// before the error propagates.
pub async fn reproduce(
    runner: Arc<dyn ContainerRunner>,
    request: &ReproRequest,
) -> PipelineResult<Reproduction> {
    fs::create_dir_all(&request.workspace_root)?;
    let workspace = request
        .workspace_root
        .join(format!("ws-{}", &Uuid::new_v4().to_string()[..8]));

    match reproduce_in(runner, request, &workspace).await {
        Ok(reproduction) => Ok(reproduction),
        Err(e) => {
            let _ = fs::remove_dir_all(&workspace);
            Err(e)
        }
    }
}

async fn reproduce_in(
    runner: Arc<dyn ContainerRunner>,
    request: &ReproRequest,
    workspace: &Path,
) -> PipelineResult<Reproduction> {
    GitWorkspace::clone_at(&request.clone_url, &request.sha, workspace).await?;

    let harness = detect_harness(workspace);
    let test_command = request
        .test_command
        .clone()
        .unwrap_or_else(|| default_test_command(&harness));

    info!(
        "Reproducing {} at {} with {:?}",
        request.clone_url, request.sha, test_command
    );

    let outcome = run_test_suite(
        runner,
        &request.image,
        workspace,
        &test_command,
        request.timeout,
    )
    .await?;

    Ok(Reproduction {
        reproduced: outcome.exit_code != 0,
        exit_code: outcome.exit_code,
        stdout: outcome.stdout,
        stderr: outcome.stderr,
        workspace: workspace.to_path_buf(),
        test_command,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_detect_harness_empty_workspace() {
        let dir = tempdir().unwrap();
        let harness = detect_harness(dir.path());
        assert!(!harness.has_requirements);
        assert!(!harness.has_pytest_config);
        assert!(!harness.has_setup_py);
    }

    #[test]
    fn test_detect_harness_full_project() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("requirements.txt"), "requests\n").unwrap();
        fs::write(dir.path().join("setup.py"), "from setuptools import setup\n").unwrap();
        fs::write(
            dir.path().join("pyproject.toml"),
            "[tool.pytest.ini_options]\ntestpaths = [\"tests\"]\n",
        )
        .unwrap();

        let harness = detect_harness(dir.path());
        assert!(harness.has_requirements);
        assert!(harness.has_pytest_config);
        assert!(harness.has_setup_py);
    }

    #[test]
    fn test_pyproject_without_pytest_section_is_ignored() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("pyproject.toml"),
            "[build-system]\nrequires = [\"setuptools\"]\n",
        )
        .unwrap();

        assert!(!detect_harness(dir.path()).has_pytest_config);
    }

    #[test]
    fn test_default_test_command_variants() {
        let bare = Harness::default();
        assert_eq!(
            default_test_command(&bare),
            vec!["python", "-m", "pytest", "tests/", "-v", "--tb=short"]
        );

        let configured = Harness {
            has_pytest_config: true,
            ..Harness::default()
        };
        assert_eq!(
            default_test_command(&configured),
            vec!["python", "-m", "pytest"]
        );
    }
}
