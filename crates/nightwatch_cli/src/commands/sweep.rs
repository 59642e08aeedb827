//! `nightwatch sweep` - one janitor pass.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use nightwatch_core::{AgentConfig, Janitor};
use nightwatch_runner::DockerRunner;

use super::SweepArgs;

pub async fn execute(args: SweepArgs) -> anyhow::Result<()> {
    let config = AgentConfig::from_env();
    let runner = DockerRunner::new()
        .await
        .context("connecting to Docker daemon")?;

    let janitor = Janitor::new(Arc::new(runner), &config.workspace_root)
        .max_age(Duration::from_secs(args.max_age_hours * 3600));

    let report = janitor.run_once().await;
    println!(
        "Removed {} stale sessions and {} stale workspaces under {}",
        report.sessions_removed,
        report.workspaces_removed,
        config.workspace_root.display()
    );
    Ok(())
}
