//! Pipeline orchestrator.
//!
//! Drives one ingested failure through the healing state machine:
//!
//! ```text
//! pending → fetching_logs → analyzing → {reproducing | escalated}
//! reproducing → {not_reproduced | generating_test | failed}
//! generating_test → fixing
//! fixing → {creating_pr | escalated}
//! creating_pr → fixed
//! any → failed (on uncaught error)
//! ```
//!
//! Every transition is persisted before the next stage begins, terminal
//! transitions release the workspace, and no error escapes [`Pipeline::process`].

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nightwatch_github::{CodeHost, GitWorkspace, PullRequestSpec};
use nightwatch_llm::CompletionModel;
use nightwatch_runner::ContainerRunner;
use nightwatch_store::{
    AnalysisUpdate, AttemptVerdict, FailureStatus, FailureStore, NewFailure,
};
use tracing::{debug, error, info, warn};

use crate::analysis::{analyze_failure, AnalysisArtifact, LOW_CONFIDENCE_THRESHOLD};
use crate::config::AgentConfig;
use crate::error::PipelineResult;
use crate::event::{screen_event, EventDecision, FailureEvent, WorkflowRunEvent};
use crate::fix_loop::{run_fix_loop, AttemptOutcome, FixLoopContext};
use crate::logs::{localize_failure_log, truncate_log, DEFAULT_LOG_BUDGET};
use crate::repro::{reproduce, ReproRequest, Reproduction};
use crate::testgen::{derive_test_path, synthesize_test};

/// Acknowledgment returned to the ingestion caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// Pipeline started in the background
    Accepted,
    /// Event dropped; the reason says why
    Ignored(&'static str),
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workspace_root: PathBuf,
    pub sandbox_image: String,
    pub test_timeout: Duration,
}

impl From<&AgentConfig> for PipelineConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            workspace_root: config.workspace_root.clone(),
            sandbox_image: config.sandbox_image.clone(),
            test_timeout: config.test_timeout,
        }
    }
}

/// The healing pipeline.
///
/// One instance serves the whole process; each accepted event runs as its
/// own independent task. Events for a (run, repo) pair already in flight are
/// dropped, so replays cannot race their predecessor.
pub struct Pipeline {
    store: FailureStore,
    host: Arc<dyn CodeHost>,
    model: Arc<dyn CompletionModel>,
    runner: Arc<dyn ContainerRunner>,
    config: PipelineConfig,
    in_flight: Mutex<HashSet<(i64, String)>>,
}

impl Pipeline {
    pub fn new(
        store: FailureStore,
        host: Arc<dyn CodeHost>,
        model: Arc<dyn CompletionModel>,
        runner: Arc<dyn ContainerRunner>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            host,
            model,
            runner,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Screen an incoming event and, if actionable, start a pipeline task.
    ///
    /// Returns immediately; the pipeline continues in the background.
    pub fn handle_event(self: &Arc<Self>, event: &WorkflowRunEvent) -> Ack {
        let failure = match screen_event(event) {
            EventDecision::Ignore(reason) => return Ack::Ignored(reason),
            EventDecision::Accept(failure) => failure,
        };

        if !self.try_claim(&failure) {
            debug!(
                "Dropping replay for in-flight run {} on {}",
                failure.run_id, failure.repo
            );
            return Ack::Ignored("run already in flight");
        }

        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let status = pipeline.run_claimed(&failure).await;
            pipeline.release(&failure);
            info!(
                "Pipeline for {} run {} finished: {}",
                failure.repo, failure.run_id, status
            );
        });

        Ack::Accepted
    }

    /// Run one failure event to completion.
    ///
    /// Returns `None` when the event was dropped because the same
    /// (run, repo) pair is already in flight. Never returns an error: every
    /// failure path lands in a terminal store state instead.
    pub async fn process(&self, event: FailureEvent) -> Option<FailureStatus> {
        if !self.try_claim(&event) {
            debug!(
                "Dropping replay for in-flight run {} on {}",
                event.run_id, event.repo
            );
            return None;
        }
        let status = self.run_claimed(&event).await;
        self.release(&event);
        Some(status)
    }

    fn try_claim(&self, event: &FailureEvent) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((event.run_id, event.repo.clone()))
    }

    fn release(&self, event: &FailureEvent) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&(event.run_id, event.repo.clone()));
    }

    async fn run_claimed(&self, event: &FailureEvent) -> FailureStatus {
        let failure_id = match self
            .store
            .upsert_failure(&NewFailure {
                run_id: event.run_id,
                repo: &event.repo,
                sha: &event.sha,
                branch: &event.branch,
                workflow_name: &event.workflow_name,
            })
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!("Could not persist failure for {}: {}", event.repo, e);
                return FailureStatus::Failed;
            }
        };

        let mut workspace: Option<PathBuf> = None;
        let result = self.drive(event, failure_id, &mut workspace).await;

        // Terminal transitions always release the workspace
        if let Some(workspace) = workspace {
            if let Err(e) = fs::remove_dir_all(&workspace) {
                warn!("Could not remove workspace {}: {}", workspace.display(), e);
            }
        }

        match result {
            Ok(status) => status,
            Err(e) => {
                error!(
                    "Pipeline for {} run {} failed: {}",
                    event.repo, event.run_id, e
                );
                let _ = self
                    .store
                    .complete_failure(
                        failure_id,
                        FailureStatus::Failed,
                        None,
                        None,
                        Some(&e.to_string()),
                    )
                    .await;
                FailureStatus::Failed
            }
        }
    }

    async fn drive(
        &self,
        event: &FailureEvent,
        failure_id: i64,
        workspace_slot: &mut Option<PathBuf>,
    ) -> PipelineResult<FailureStatus> {
        // fetching_logs
        self.store
            .update_status(failure_id, FailureStatus::FetchingLogs)
            .await?;
        let logs = self.host.download_run_logs(&event.repo, event.run_id).await?;

        let Some(failure_log) = localize_failure_log(&logs) else {
            self.store
                .complete_failure(
                    failure_id,
                    FailureStatus::Failed,
                    None,
                    None,
                    Some("No logs available"),
                )
                .await?;
            return Ok(FailureStatus::Failed);
        };
        let excerpt = truncate_log(&failure_log, DEFAULT_LOG_BUDGET);

        // analyzing
        self.store
            .update_status(failure_id, FailureStatus::Analyzing)
            .await?;
        let analysis = analyze_failure(self.model.as_ref(), &excerpt).await?;
        self.store
            .record_analysis(
                failure_id,
                &AnalysisUpdate {
                    error_type: analysis.error_kind.as_str(),
                    file_path: &analysis.file_path,
                    line_number: analysis.line_number,
                    function_name: analysis.function_name.as_deref(),
                    error_message: &analysis.error_message,
                    failing_test: analysis.failing_test.as_deref(),
                    confidence: analysis.confidence,
                    raw_log_snippet: &analysis.raw_excerpt,
                },
            )
            .await?;

        // Confidence gate: too uncertain to touch a sandbox
        if analysis.confidence < LOW_CONFIDENCE_THRESHOLD {
            info!(
                "Confidence {:.2} below threshold for {} run {}; escalating",
                analysis.confidence, event.repo, event.run_id
            );
            let issue_url = self
                .open_escalation_issue(event, &analysis, &[], "Low confidence analysis")
                .await?;
            self.store
                .complete_failure(
                    failure_id,
                    FailureStatus::Escalated,
                    None,
                    Some(&issue_url),
                    Some("Low confidence analysis"),
                )
                .await?;
            return Ok(FailureStatus::Escalated);
        }

        // reproducing
        self.store
            .update_status(failure_id, FailureStatus::Reproducing)
            .await?;
        let reproduction = reproduce(
            self.runner.clone(),
            &ReproRequest {
                clone_url: event.clone_url.clone(),
                sha: event.sha.clone(),
                test_command: None,
                timeout: self.config.test_timeout,
                image: self.config.sandbox_image.clone(),
                workspace_root: self.config.workspace_root.clone(),
            },
        )
        .await?;
        *workspace_slot = Some(reproduction.workspace.clone());

        if !reproduction.reproduced {
            info!(
                "Tests pass at {} for {}; not reproduced",
                event.sha, event.repo
            );
            self.store
                .complete_failure(failure_id, FailureStatus::NotReproduced, None, None, None)
                .await?;
            return Ok(FailureStatus::NotReproduced);
        }

        // generating_test
        self.store
            .update_status(failure_id, FailureStatus::GeneratingTest)
            .await?;
        self.generate_regression_test(failure_id, &reproduction, &analysis)
            .await?;

        // fixing
        self.store
            .update_status(failure_id, FailureStatus::Fixing)
            .await?;
        let fix = run_fix_loop(FixLoopContext {
            model: self.model.as_ref(),
            runner: self.runner.clone(),
            store: &self.store,
            failure_id,
            workspace: &reproduction.workspace,
            analysis: &analysis,
            test_command: &reproduction.test_command,
            initial_test_output: combined_output(&reproduction),
            image: &self.config.sandbox_image,
            test_timeout: self.config.test_timeout,
        })
        .await?;

        if !fix.fixed {
            let issue_url = self
                .open_escalation_issue(event, &analysis, &fix.attempts, "All fix attempts failed")
                .await?;
            self.store
                .complete_failure(
                    failure_id,
                    FailureStatus::Escalated,
                    None,
                    Some(&issue_url),
                    Some("All fix attempts failed"),
                )
                .await?;
            return Ok(FailureStatus::Escalated);
        }

        // creating_pr
        self.store
            .update_status(failure_id, FailureStatus::CreatingPr)
            .await?;
        let pr_url = self
            .open_pull_request(event, &analysis, &reproduction.workspace, &fix.attempts)
            .await?;
        self.store
            .complete_failure(failure_id, FailureStatus::Fixed, Some(&pr_url), None, None)
            .await?;
        Ok(FailureStatus::Fixed)
    }

    async fn generate_regression_test(
        &self,
        failure_id: i64,
        reproduction: &Reproduction,
        analysis: &AnalysisArtifact,
    ) -> PipelineResult<()> {
        let subject_path = reproduction.workspace.join(&analysis.file_path);
        let subject_source = fs::read_to_string(&subject_path)?;

        let test_path = derive_test_path(&analysis.file_path);
        let existing_tests = fs::read_to_string(reproduction.workspace.join(&test_path)).ok();

        let test = synthesize_test(
            self.model.as_ref(),
            &subject_source,
            existing_tests.as_deref(),
            analysis,
        )
        .await?;

        self.store
            .upsert_generated_test(
                failure_id,
                &test.name,
                &test.code,
                &test.target_file,
                &test.imports_needed,
            )
            .await?;

        // Materialize the test so fix verification runs it too
        let target = reproduction.workspace.join(&test.target_file);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if target.is_file() {
            let mut contents = fs::read_to_string(&target)?;
            contents.push_str("\n\n");
            contents.push_str(&test.code);
            fs::write(&target, contents)?;
        } else {
            fs::write(&target, &test.code)?;
        }
        Ok(())
    }

    async fn open_pull_request(
        &self,
        event: &FailureEvent,
        analysis: &AnalysisArtifact,
        workspace: &Path,
        attempts: &[AttemptOutcome],
    ) -> PipelineResult<String> {
        let branch = format!("nightwatch/fix-{}", event.run_id);
        let winning = attempts
            .iter()
            .rev()
            .find(|a| a.verdict == AttemptVerdict::Pass);
        let explanation = winning
            .and_then(|a| a.patch.as_ref())
            .map(|p| p.explanation.clone())
            .unwrap_or_default();

        let git = GitWorkspace::new(workspace);
        git.create_branch(&branch).await?;
        git.commit_all(&format!(
            "Fix {} in {}",
            analysis.error_kind.as_str(),
            analysis.file_path
        ))
        .await?;
        git.push(&branch).await?;

        let title = format!(
            "Fix {} in {}",
            analysis.error_kind.as_str(),
            analysis.file_path
        );
        let body = format!(
            "Automated fix for workflow run {} on `{}`.\n\n\
             ## Diagnosis\n\
             - error type: {}\n\
             - location: {}{}\n\
             - message: {}\n\
             - confidence: {:.2}\n\n\
             ## Fix\n{}\n\n\
             A regression test covering this failure is included. \
             Verified by re-running the test suite in a clean sandbox ({} attempt{}).",
            event.run_id,
            event.branch,
            analysis.error_kind.as_str(),
            analysis.file_path,
            analysis
                .line_number
                .map(|l| format!(":{}", l))
                .unwrap_or_default(),
            analysis.error_message,
            analysis.confidence,
            explanation,
            attempts.len(),
            if attempts.len() == 1 { "" } else { "s" },
        );

        let url = self
            .host
            .create_pull_request(
                &event.repo,
                &PullRequestSpec {
                    title,
                    body,
                    head: branch,
                    base: event.branch.clone(),
                },
            )
            .await?;
        Ok(url)
    }

    async fn open_escalation_issue(
        &self,
        event: &FailureEvent,
        analysis: &AnalysisArtifact,
        attempts: &[AttemptOutcome],
        reason: &str,
    ) -> PipelineResult<String> {
        let title = format!(
            "CI failure needs attention: {} in {} (run {})",
            analysis.error_kind.as_str(),
            analysis.file_path,
            event.run_id
        );

        let mut body = format!(
            "Automated repair did not succeed: {}.\n\n\
             ## Diagnosis\n\
             - error type: {}\n\
             - location: {}{}\n\
             - message: {}\n\
             - confidence: {:.2}\n",
            reason,
            analysis.error_kind.as_str(),
            analysis.file_path,
            analysis
                .line_number
                .map(|l| format!(":{}", l))
                .unwrap_or_default(),
            analysis.error_message,
            analysis.confidence,
        );

        if !attempts.is_empty() {
            body.push_str("\n## Attempts\n");
            for attempt in attempts {
                body.push_str(&format!(
                    "- attempt {} ({}): {}\n",
                    attempt.number,
                    attempt.verdict.as_str(),
                    attempt
                        .patch
                        .as_ref()
                        .map(|p| p.explanation.as_str())
                        .or(attempt.error_output.as_deref())
                        .unwrap_or("no details"),
                ));
            }
        }

        if !analysis.raw_excerpt.is_empty() {
            body.push_str(&format!("\n## Log excerpt\n```\n{}\n```\n", analysis.raw_excerpt));
        }

        let url = self.host.create_issue(&event.repo, &title, &body).await?;
        Ok(url)
    }
}

fn combined_output(reproduction: &Reproduction) -> String {
    if reproduction.stdout.is_empty() {
        reproduction.stderr.clone()
    } else if reproduction.stderr.is_empty() {
        reproduction.stdout.clone()
    } else {
        format!("{}\n{}", reproduction.stdout, reproduction.stderr)
    }
}
