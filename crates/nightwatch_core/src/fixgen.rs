//! Fix synthesis stage.
//!
//! Asks the completion model for a minimal exact-span patch. Prior failed
//! attempts ride along in the prompt so the model stops repeating itself.
//! Unlike analysis, a malformed response here is an error: the fix loop
//! records it as a failed attempt and continues.

use nightwatch_llm::CompletionModel;
use nightwatch_store::AttemptVerdict;
use serde::Deserialize;

use crate::analysis::{strip_code_fences, truncate_chars, AnalysisArtifact};
use crate::error::{PipelineError, PipelineResult};
use crate::patch::PatchArtifact;

/// Bytes of test output included in the prompt.
const TEST_OUTPUT_LIMIT: usize = 2000;

/// Bytes of each prior attempt's error output included in the prompt.
const ATTEMPT_ERROR_LIMIT: usize = 500;

/// Summary of an earlier attempt, fed back into the next prompt.
#[derive(Debug, Clone)]
pub struct PriorAttempt {
    pub number: i64,
    pub explanation: String,
    pub verdict: AttemptVerdict,
    pub error_output: Option<String>,
}

const FIXGEN_SYSTEM_PROMPT: &str = "You are a careful software engineer producing minimal bug \
fixes. You change as few lines as possible and respond with a single JSON object and nothing else.";

fn fixgen_prompt(
    source: &str,
    analysis: &AnalysisArtifact,
    prior_attempts: &[PriorAttempt],
    test_output: &str,
) -> String {
    let mut prompt = format!(
        "Fix this bug with the smallest possible change.\n\n\
         Diagnosis:\n\
         - error type: {}\n\
         - file: {}\n\
         - line: {}\n\
         - function: {}\n\
         - message: {}\n\n\
         Current source of {}:\n```python\n{}\n```\n\n\
         Failing test output:\n```\n{}\n```\n",
        analysis.error_kind.as_str(),
        analysis.file_path,
        analysis
            .line_number
            .map(|l| l.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        analysis.function_name.as_deref().unwrap_or("unknown"),
        analysis.error_message,
        analysis.file_path,
        source,
        truncate_chars(test_output, TEST_OUTPUT_LIMIT),
    );

    if !prior_attempts.is_empty() {
        prompt.push_str("\nEarlier attempts that did NOT fix the bug; try something different:\n");
        for attempt in prior_attempts {
            prompt.push_str(&format!(
                "- attempt {} ({}): {}\n",
                attempt.number,
                attempt.verdict.as_str(),
                attempt.explanation,
            ));
            if let Some(error) = &attempt.error_output {
                prompt.push_str(&format!(
                    "  output: {}\n",
                    truncate_chars(error, ATTEMPT_ERROR_LIMIT)
                ));
            }
        }
    }

    prompt.push_str(
        "\nRespond with a single JSON object:\n\
         {\n\
           \"file_path\": \"file to change, relative to the repository root\",\n\
           \"original_code\": \"the exact lines to replace, copied VERBATIM from the source above\",\n\
           \"fixed_code\": \"the replacement lines\",\n\
           \"explanation\": \"one or two sentences on why this fixes the bug\"\n\
         }\n\
         Do not wrap the JSON in markdown.",
    );

    prompt
}

#[derive(Debug, Deserialize)]
struct RawFix {
    file_path: String,
    original_code: String,
    fixed_code: String,
    explanation: Option<String>,
}

/// Run the fix-synthesis stage.
pub async fn synthesize_fix(
    model: &dyn CompletionModel,
    source: &str,
    analysis: &AnalysisArtifact,
    prior_attempts: &[PriorAttempt],
    test_output: &str,
) -> PipelineResult<PatchArtifact> {
    let prompt = fixgen_prompt(source, analysis, prior_attempts, test_output);
    let response = model.complete(Some(FIXGEN_SYSTEM_PROMPT), &prompt).await?;

    let body = strip_code_fences(&response);
    let raw: RawFix = serde_json::from_str(body).map_err(|e| {
        PipelineError::InvalidLlmResponse(format!(
            "fix response is not valid JSON ({}): {}",
            e,
            truncate_chars(&response, 200)
        ))
    })?;

    Ok(PatchArtifact {
        file_path: raw.file_path,
        original_span: raw.original_code,
        replacement_span: raw.fixed_code,
        explanation: raw.explanation.unwrap_or_default(),
    })
}
