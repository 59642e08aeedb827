//! Background cleanup of stale sandboxes and workspaces.
//!
//! A crashed pipeline can strand a container or a checkout. The janitor
//! sweeps on a timer: sessions whose workspace binding sits under the
//! managed prefix and workspace directories under that prefix are evicted
//! once they pass the age threshold. Cleanup failures are logged and never
//! propagate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use nightwatch_runner::ContainerRunner;
use tracing::{debug, info, warn};

/// Sessions and workspaces older than this are evicted.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepReport {
    pub sessions_removed: usize,
    pub workspaces_removed: usize,
}

/// Periodic cleaner for leaked sandboxes and workspaces.
pub struct Janitor {
    runner: Arc<dyn ContainerRunner>,
    workspace_root: PathBuf,
    max_age: Duration,
}

impl Janitor {
    pub fn new(runner: Arc<dyn ContainerRunner>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            workspace_root: workspace_root.into(),
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Run one sweep over sessions and workspace directories.
    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        report.sessions_removed = self.sweep_sessions().await;
        report.workspaces_removed = self.sweep_workspaces();
        info!(
            "Janitor sweep: {} sessions, {} workspaces removed",
            report.sessions_removed, report.workspaces_removed
        );
        report
    }

    /// Spawn the janitor on an interval; runs until the handle is dropped.
    pub fn spawn(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }

    async fn sweep_sessions(&self) -> usize {
        let sessions = match self.runner.list_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Janitor could not list sessions: {}", e);
                return 0;
            }
        };

        let cutoff = chrono::Utc::now()
            - chrono::Duration::from_std(self.max_age).unwrap_or(chrono::Duration::hours(24));

        let mut removed = 0;
        for session in sessions {
            let managed = session
                .workspace
                .as_ref()
                .map(|ws| ws.starts_with(&self.workspace_root))
                .unwrap_or(false);
            if !managed || session.created_at > cutoff {
                continue;
            }

            debug!("Evicting stale session {}", session.container_id);
            match self.runner.remove_session(&session.container_id).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    "Janitor failed to remove session {}: {}",
                    session.container_id, e
                ),
            }
        }
        removed
    }

    fn sweep_workspaces(&self) -> usize {
        let entries = match std::fs::read_dir(&self.workspace_root) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let now = SystemTime::now();
        let mut removed = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let stale = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|mtime| now.duration_since(mtime).ok())
                .map(|age| age > self.max_age)
                .unwrap_or(false);
            if !stale {
                continue;
            }

            debug!("Removing stale workspace {}", path.display());
            match std::fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Janitor failed to remove {}: {}", path.display(), e),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightwatch_runner::{MockRunner, SandboxConfig};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sweep_evicts_only_stale_managed_sessions() {
        let root = tempdir().unwrap();
        let mock = MockRunner::new();
        let runner: Arc<dyn ContainerRunner> = Arc::new(mock.clone());

        let stale = runner
            .create_session(&SandboxConfig::new("python", root.path().join("ws-old")))
            .await
            .unwrap();
        let fresh = runner
            .create_session(&SandboxConfig::new("python", root.path().join("ws-new")))
            .await
            .unwrap();
        let unmanaged = runner
            .create_session(&SandboxConfig::new("python", "/somewhere/else"))
            .await
            .unwrap();

        mock.backdate_session(&stale, chrono::Utc::now() - chrono::Duration::hours(48));
        mock.backdate_session(&unmanaged, chrono::Utc::now() - chrono::Duration::hours(48));

        let janitor = Janitor::new(runner, root.path());
        let report = janitor.run_once().await;

        assert_eq!(report.sessions_removed, 1);
        let active = mock.active_sessions();
        assert!(active.contains(&fresh));
        assert!(active.contains(&unmanaged));
        assert!(!active.contains(&stale));
    }

    #[tokio::test]
    async fn test_sweep_removes_old_workspace_directories() {
        let root = tempdir().unwrap();
        let old_ws = root.path().join("ws-old");
        std::fs::create_dir_all(&old_ws).unwrap();
        std::fs::write(old_ws.join("file.py"), "x = 1").unwrap();

        let new_ws = root.path().join("ws-new");
        std::fs::create_dir_all(&new_ws).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let runner: Arc<dyn ContainerRunner> = Arc::new(MockRunner::new());
        // Zero max age: everything qualifies as stale
        let janitor = Janitor::new(runner, root.path()).max_age(Duration::ZERO);
        let report = janitor.run_once().await;

        assert_eq!(report.workspaces_removed, 2);
        assert!(!old_ws.exists());
        assert!(!new_ws.exists());
    }

    #[tokio::test]
    async fn test_sweep_tolerates_missing_root() {
        let runner: Arc<dyn ContainerRunner> = Arc::new(MockRunner::new());
        let janitor = Janitor::new(runner, "/nonexistent/nightwatch-root");
        let report = janitor.run_once().await;
        assert_eq!(report.workspaces_removed, 0);
    }
}
