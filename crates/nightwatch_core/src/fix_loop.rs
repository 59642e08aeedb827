//! Bounded fix loop.
//!
//! Each attempt synthesizes a patch, applies it, re-runs the test suite in a
//! fresh sandbox, and records a verdict row before the next iteration.
//! Failed patches are reverted so every attempt starts from the pristine
//! checkout; failed *applications* skip the revert since nothing landed.
//! Errors inside an iteration are caught and recorded as a failed attempt so
//! one bad synthesis cannot abort the whole loop.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use nightwatch_llm::CompletionModel;
use nightwatch_runner::ContainerRunner;
use nightwatch_store::{AttemptVerdict, FailureStore, NewFixAttempt};
use tracing::{info, warn};

use crate::analysis::AnalysisArtifact;
use crate::error::{PatchError, PipelineResult};
use crate::fixgen::{synthesize_fix, PriorAttempt};
use crate::patch::{apply_patch, revert_patch, PatchArtifact};
use crate::repro::run_test_suite;

/// Bounded attempts per failure; a first-class invariant, not a tunable.
pub const MAX_FIX_ATTEMPTS: i64 = 3;

/// Everything one fix-loop run needs.
pub struct FixLoopContext<'a> {
    pub model: &'a dyn CompletionModel,
    pub runner: Arc<dyn ContainerRunner>,
    pub store: &'a FailureStore,
    pub failure_id: i64,
    pub workspace: &'a Path,
    pub analysis: &'a AnalysisArtifact,
    pub test_command: &'a [String],
    pub initial_test_output: String,
    pub image: &'a str,
    pub test_timeout: Duration,
}

/// One attempt's outcome, mirrored into the store as it happens.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub number: i64,
    pub patch: Option<PatchArtifact>,
    pub verdict: AttemptVerdict,
    pub error_output: Option<String>,
}

/// Result of the whole loop.
#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub fixed: bool,
    pub attempts: Vec<AttemptOutcome>,
}

impl FixOutcome {
    /// The patch that made the suite pass, if any.
    pub fn winning_patch(&self) -> Option<&PatchArtifact> {
        self.attempts
            .iter()
            .rev()
            .find(|a| a.verdict == AttemptVerdict::Pass)
            .and_then(|a| a.patch.as_ref())
    }
}

enum AttemptResult {
    Passed(PatchArtifact),
    Failed {
        patch: Option<PatchArtifact>,
        reason: String,
        test_output: Option<String>,
    },
}

/// Drive up to [`MAX_FIX_ATTEMPTS`] synthesize/apply/verify cycles.
pub async fn run_fix_loop(ctx: FixLoopContext<'_>) -> PipelineResult<FixOutcome> {
    let mut attempts: Vec<AttemptOutcome> = Vec::new();
    let mut prior: Vec<PriorAttempt> = Vec::new();
    let mut last_test_output = ctx.initial_test_output.clone();
    let mut fixed = false;

    for number in 1..=MAX_FIX_ATTEMPTS {
        let result = run_attempt(&ctx, &prior, &last_test_output).await;

        let outcome = match result {
            Ok(AttemptResult::Passed(patch)) => {
                info!("Attempt {} fixed the failure", number);
                fixed = true;
                AttemptOutcome {
                    number,
                    patch: Some(patch),
                    verdict: AttemptVerdict::Pass,
                    error_output: None,
                }
            }
            Ok(AttemptResult::Failed {
                patch,
                reason,
                test_output,
            }) => {
                warn!("Attempt {} failed: {}", number, reason);
                if let Some(output) = &test_output {
                    last_test_output = output.clone();
                }
                AttemptOutcome {
                    number,
                    patch,
                    verdict: AttemptVerdict::Fail,
                    error_output: Some(reason),
                }
            }
            Err(e) => {
                // Per-iteration errors become a synthetic failed attempt
                warn!("Attempt {} errored: {}", number, e);
                AttemptOutcome {
                    number,
                    patch: None,
                    verdict: AttemptVerdict::Fail,
                    error_output: Some(e.to_string()),
                }
            }
        };

        persist_attempt(&ctx, &outcome).await?;

        let verdict = outcome.verdict;
        prior.push(PriorAttempt {
            number: outcome.number,
            explanation: outcome
                .patch
                .as_ref()
                .map(|p| p.explanation.clone())
                .unwrap_or_else(|| outcome.error_output.clone().unwrap_or_default()),
            verdict,
            error_output: outcome.error_output.clone(),
        });
        attempts.push(outcome);

        if verdict == AttemptVerdict::Pass {
            break;
        }
    }

    Ok(FixOutcome { fixed, attempts })
}

async fn run_attempt(
    ctx: &FixLoopContext<'_>,
    prior: &[PriorAttempt],
    last_test_output: &str,
) -> PipelineResult<AttemptResult> {
    let source_path = ctx.workspace.join(&ctx.analysis.file_path);
    let source = fs::read_to_string(&source_path)?;

    let patch = synthesize_fix(ctx.model, &source, ctx.analysis, prior, last_test_output).await?;

    match apply_patch(ctx.workspace, &patch) {
        Ok(()) => {}
        Err(PatchError::Io(e)) => return Err(PatchError::Io(e).into()),
        Err(e) => {
            // Nothing landed, so no revert before the next iteration
            return Ok(AttemptResult::Failed {
                patch: Some(patch),
                reason: format!("Failed to apply fix - original code not found ({})", e),
                test_output: None,
            });
        }
    }

    let outcome = run_test_suite(
        ctx.runner.clone(),
        ctx.image,
        ctx.workspace,
        ctx.test_command,
        ctx.test_timeout,
    )
    .await?;

    if outcome.exit_code == 0 {
        return Ok(AttemptResult::Passed(patch));
    }

    revert_patch(ctx.workspace, &patch)?;
    let combined = outcome.combined_output();
    Ok(AttemptResult::Failed {
        patch: Some(patch),
        reason: if outcome.stderr.is_empty() {
            format!("Tests still failing (exit {})", outcome.exit_code)
        } else {
            outcome.stderr.clone()
        },
        test_output: Some(combined),
    })
}

async fn persist_attempt(
    ctx: &FixLoopContext<'_>,
    outcome: &AttemptOutcome,
) -> PipelineResult<()> {
    let (file_path, original_code, fixed_code, explanation) = match &outcome.patch {
        Some(patch) => (
            patch.file_path.as_str(),
            patch.original_span.as_str(),
            patch.replacement_span.as_str(),
            patch.explanation.as_str(),
        ),
        None => (ctx.analysis.file_path.as_str(), "", "", ""),
    };

    ctx.store
        .insert_fix_attempt(&NewFixAttempt {
            failure_id: ctx.failure_id,
            attempt_number: outcome.number,
            file_path,
            original_code,
            fixed_code,
            explanation,
            test_result: outcome.verdict,
            error_output: outcome.error_output.as_deref(),
        })
        .await?;
    Ok(())
}
