//! `nightwatch process` - drive one event through the pipeline.

use std::sync::Arc;

use anyhow::{bail, Context};
use nightwatch_core::{
    screen_event, AgentConfig, EventDecision, Pipeline, PipelineConfig, WorkflowRunEvent,
};
use nightwatch_github::GithubClient;
use nightwatch_llm::ChatClient;
use nightwatch_runner::DockerRunner;
use nightwatch_store::FailureStore;
use tracing::info;

use super::ProcessArgs;

pub async fn execute(args: ProcessArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.event)
        .with_context(|| format!("reading event file {}", args.event.display()))?;
    let event: WorkflowRunEvent =
        serde_json::from_str(&raw).context("parsing workflow-run event")?;

    let failure = match screen_event(&event) {
        EventDecision::Accept(failure) => failure,
        EventDecision::Ignore(reason) => {
            println!("Event ignored: {}", reason);
            return Ok(());
        }
    };

    let config = AgentConfig::from_env();
    if config.github_token.is_empty() {
        bail!("GITHUB_TOKEN is not configured");
    }

    let store = FailureStore::new(&config.db_path).context("opening store")?;
    let host = GithubClient::new(config.github_token.clone());
    let model = ChatClient::from_env().context("configuring LLM client")?;
    let runner = DockerRunner::new()
        .await
        .context("connecting to Docker daemon")?;

    let pipeline = Pipeline::new(
        store.clone(),
        Arc::new(host),
        Arc::new(model),
        Arc::new(runner),
        PipelineConfig::from(&config),
    );

    info!(
        "Processing run {} for {} at {}",
        failure.run_id, failure.repo, failure.sha
    );

    let run_id = failure.run_id;
    let repo = failure.repo.clone();
    match pipeline.process(failure).await {
        Some(status) => {
            let record = store.get_failure_by_key(run_id, &repo).await?;
            println!("Terminal status: {}", status);
            if let Some(record) = record {
                if let Some(url) = record.pr_url {
                    println!("Review request: {}", url);
                }
                if let Some(url) = record.issue_url {
                    println!("Escalation issue: {}", url);
                }
                if let Some(error) = record.error {
                    println!("Error: {}", error);
                }
            }
            Ok(())
        }
        None => {
            println!("Event dropped: run already in flight");
            Ok(())
        }
    }
}
