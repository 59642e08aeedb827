//! `nightwatch status` - list recent failures.

use anyhow::Context;
use chrono::DateTime;
use nightwatch_core::AgentConfig;
use nightwatch_store::FailureStore;

use super::StatusArgs;

pub async fn execute(args: StatusArgs) -> anyhow::Result<()> {
    let config = AgentConfig::from_env();
    let store = FailureStore::new(&config.db_path).context("opening store")?;

    let failures = store.list_failures(args.limit).await?;
    if failures.is_empty() {
        println!("No failures recorded.");
        return Ok(());
    }

    for failure in failures {
        let when = DateTime::from_timestamp(failure.created_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| failure.created_at.to_string());
        let outcome = failure
            .pr_url
            .or(failure.issue_url)
            .or(failure.error)
            .unwrap_or_default();

        println!(
            "{:<6} {:>8}  {:<24} {:<15} {}",
            failure.id, failure.run_id, failure.repo, failure.status, when
        );
        if !outcome.is_empty() {
            println!("       -> {}", outcome);
        }
    }
    Ok(())
}
