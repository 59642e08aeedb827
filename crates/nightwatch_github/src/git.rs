//! Git operations for workspace provisioning and fix publication.
//!
//! Clones are shallow but deep enough (depth 50) that the failing head
//! commit is reachable even when later pushes landed after the run.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{HostError, HostResult};

/// Shallow clone depth used for workspace provisioning.
pub const CLONE_DEPTH: u32 = 50;

/// Git operations bound to one repository directory.
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    repo_path: PathBuf,
}

impl GitWorkspace {
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.repo_path
    }

    /// Check if git is available on the system.
    pub async fn is_git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Clone `clone_url` into the directory and check out `sha`.
    pub async fn clone_at(clone_url: &str, sha: &str, dest: &Path) -> HostResult<Self> {
        info!("Cloning {} at {} into {}", clone_url, sha, dest.display());

        let depth = CLONE_DEPTH.to_string();
        let dest_arg = dest.to_string_lossy();
        let output = Command::new("git")
            .args(["clone", "--depth", depth.as_str(), clone_url, dest_arg.as_ref()])
            .output()
            .await
            .map_err(|e| HostError::Git(format!("Failed to run git clone: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostError::Git(format!("git clone failed: {}", stderr)));
        }

        let workspace = Self::new(dest);
        workspace.checkout(sha).await?;
        Ok(workspace)
    }

    /// Check out a commit or branch.
    pub async fn checkout(&self, rev: &str) -> HostResult<()> {
        let output = self.git(&["checkout", rev]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostError::Git(format!("git checkout failed: {}", stderr)));
        }
        Ok(())
    }

    /// Create and switch to a new branch.
    pub async fn create_branch(&self, branch: &str) -> HostResult<()> {
        debug!("Creating branch {}", branch);
        let output = self.git(&["checkout", "-b", branch]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostError::Git(format!("git checkout -b failed: {}", stderr)));
        }
        Ok(())
    }

    /// Stage all changes and commit with an explicit author identity.
    pub async fn commit_all(&self, message: &str) -> HostResult<()> {
        let output = self.git(&["add", "-A"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostError::Git(format!("git add failed: {}", stderr)));
        }

        let output = self
            .git(&[
                "-c",
                "user.name=nightwatch",
                "-c",
                "user.email=nightwatch@localhost",
                "commit",
                "-m",
                message,
            ])
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("nothing to commit") {
                return Err(HostError::Git("Nothing to commit".to_string()));
            }
            return Err(HostError::Git(format!("git commit failed: {}", stderr)));
        }
        Ok(())
    }

    /// Push a branch to origin.
    pub async fn push(&self, branch: &str) -> HostResult<()> {
        info!("Pushing branch {}", branch);
        let output = self
            .git(&["push", "--set-upstream", "origin", branch])
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostError::Git(format!("git push failed: {}", stderr)));
        }
        Ok(())
    }

    /// Resolve HEAD to a commit hash.
    pub async fn head_sha(&self) -> HostResult<String> {
        let output = self.git(&["rev-parse", "HEAD"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostError::Git(format!("git rev-parse failed: {}", stderr)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn git(&self, args: &[&str]) -> HostResult<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .await
            .map_err(|e| HostError::Git(format!("Failed to run git: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn init_repo(dir: &Path) -> String {
        let run = |args: Vec<&'static str>| {
            let dir = dir.to_path_buf();
            async move {
                let output = Command::new("git")
                    .args(&args)
                    .current_dir(&dir)
                    .output()
                    .await
                    .unwrap();
                assert!(
                    output.status.success(),
                    "git {:?} failed: {}",
                    args,
                    String::from_utf8_lossy(&output.stderr)
                );
            }
        };

        run(vec!["init", "-b", "main"]).await;
        std::fs::write(dir.join("README.md"), "# demo\n").unwrap();
        run(vec!["add", "-A"]).await;
        run(vec![
            "-c",
            "user.name=test",
            "-c",
            "user.email=test@localhost",
            "commit",
            "-m",
            "initial",
        ])
        .await;

        let ws = GitWorkspace::new(dir);
        ws.head_sha().await.unwrap()
    }

    #[tokio::test]
    async fn test_clone_at_sha_from_local_repo() {
        if !GitWorkspace::is_git_available().await {
            return;
        }

        let origin = tempdir().unwrap();
        let sha = init_repo(origin.path()).await;

        let dest = tempdir().unwrap();
        let dest_path = dest.path().join("clone");
        let ws = GitWorkspace::clone_at(&origin.path().to_string_lossy(), &sha, &dest_path)
            .await
            .unwrap();

        assert!(dest_path.join("README.md").exists());
        assert_eq!(ws.head_sha().await.unwrap(), sha);
    }

    #[tokio::test]
    async fn test_branch_and_commit() {
        if !GitWorkspace::is_git_available().await {
            return;
        }

        let origin = tempdir().unwrap();
        init_repo(origin.path()).await;

        let ws = GitWorkspace::new(origin.path());
        ws.create_branch("nightwatch/fix-42").await.unwrap();
        std::fs::write(origin.path().join("patched.txt"), "fixed\n").unwrap();
        ws.commit_all("Fix NoneType access").await.unwrap();

        let sha = ws.head_sha().await.unwrap();
        assert_eq!(sha.len(), 40);
    }

    #[tokio::test]
    async fn test_clone_failure_reports_stderr() {
        if !GitWorkspace::is_git_available().await {
            return;
        }

        let dest = tempdir().unwrap();
        let result =
            GitWorkspace::clone_at("/nonexistent/repo", "abc123", &dest.path().join("x")).await;
        assert!(matches!(result, Err(HostError::Git(_))));
    }
}
