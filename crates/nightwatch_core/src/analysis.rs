//! Failure analysis stage.
//!
//! Sends the localized, truncated log to the completion model with a strict
//! JSON-only prompt and normalizes whatever comes back into an
//! [`AnalysisArtifact`]. A response that does not parse yields a
//! zero-confidence artifact instead of an error, so the orchestrator routes
//! it through the escalation path like any other low-confidence diagnosis.

use nightwatch_llm::CompletionModel;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

/// Diagnoses below this confidence skip reproduction and escalate directly.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.3;

/// Bytes of raw response or log kept on the artifact for later triage.
const RAW_EXCERPT_LIMIT: usize = 1000;

/// Closed set of error kinds the diagnosis can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ImportError,
    ModuleNotFoundError,
    TypeError,
    AttributeError,
    AssertionError,
    SyntaxError,
    NameError,
    ValueError,
    KeyError,
    Other,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImportError => "ImportError",
            Self::ModuleNotFoundError => "ModuleNotFoundError",
            Self::TypeError => "TypeError",
            Self::AttributeError => "AttributeError",
            Self::AssertionError => "AssertionError",
            Self::SyntaxError => "SyntaxError",
            Self::NameError => "NameError",
            Self::ValueError => "ValueError",
            Self::KeyError => "KeyError",
            Self::Other => "Other",
        }
    }

    /// Anything outside the closed set coerces to `Other`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "ImportError" => Self::ImportError,
            "ModuleNotFoundError" => Self::ModuleNotFoundError,
            "TypeError" => Self::TypeError,
            "AttributeError" => Self::AttributeError,
            "AssertionError" => Self::AssertionError,
            "SyntaxError" => Self::SyntaxError,
            "NameError" => Self::NameError,
            "ValueError" => Self::ValueError,
            "KeyError" => Self::KeyError,
            _ => Self::Other,
        }
    }
}

/// Structured diagnosis of one failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    pub error_kind: ErrorKind,
    /// Path relative to the repository root; "unknown" when the model
    /// could not localize the fault
    pub file_path: String,
    pub line_number: Option<i64>,
    pub function_name: Option<String>,
    pub error_message: String,
    pub stack_trace: Vec<String>,
    pub failing_test: Option<String>,
    /// In [0, 1]; clamped on ingestion
    pub confidence: f64,
    pub raw_excerpt: String,
}

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a CI failure analyst. You read build and test logs \
and produce precise, structured diagnoses. You respond with a single JSON object and nothing else.";

const ANALYSIS_PROMPT: &str = r#"Analyze this CI failure log and identify the root cause.

Respond with a single JSON object matching exactly this schema:
{
  "error_type": one of ["ImportError", "ModuleNotFoundError", "TypeError", "AttributeError", "AssertionError", "SyntaxError", "NameError", "ValueError", "KeyError", "Other"],
  "file_path": "path of the faulty file relative to the repository root",
  "line_number": integer line of the fault or null,
  "function_name": "name of the faulty function or null",
  "error_message": "the error message, verbatim",
  "stack_trace": ["most relevant stack frames, innermost last"],
  "failing_test": "name of the failing test or null",
  "confidence": number between 0.0 and 1.0
}

Do not wrap the JSON in markdown. Log:

"#;

/// Strip a leading/trailing fenced code-block marker from a model response.
pub(crate) fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. ```json) up to the first newline
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub(crate) fn truncate_chars(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        return s;
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    error_type: Option<String>,
    file_path: Option<String>,
    line_number: Option<i64>,
    function_name: Option<String>,
    error_message: Option<String>,
    stack_trace: Option<Vec<String>>,
    failing_test: Option<String>,
    confidence: Option<f64>,
}

/// Run the analysis stage over a localized, truncated log excerpt.
///
/// Only transport failures bubble up; a malformed response degrades to a
/// zero-confidence `Other` artifact.
pub async fn analyze_failure(
    model: &dyn CompletionModel,
    log_excerpt: &str,
) -> PipelineResult<AnalysisArtifact> {
    let prompt = format!("{}{}", ANALYSIS_PROMPT, log_excerpt);
    let response = model.complete(Some(ANALYSIS_SYSTEM_PROMPT), &prompt).await?;

    Ok(parse_analysis(&response, log_excerpt))
}

fn parse_analysis(response: &str, log_excerpt: &str) -> AnalysisArtifact {
    let body = strip_code_fences(response);

    let raw: RawAnalysis = match serde_json::from_str(body) {
        Ok(raw) => raw,
        Err(_) => {
            return AnalysisArtifact {
                error_kind: ErrorKind::Other,
                file_path: "unknown".to_string(),
                line_number: None,
                function_name: None,
                error_message: "Analysis response was not valid JSON".to_string(),
                stack_trace: Vec::new(),
                failing_test: None,
                confidence: 0.0,
                raw_excerpt: truncate_chars(response, RAW_EXCERPT_LIMIT).to_string(),
            };
        }
    };

    AnalysisArtifact {
        error_kind: ErrorKind::from_str(raw.error_type.as_deref().unwrap_or("")),
        file_path: raw
            .file_path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        line_number: raw.line_number,
        function_name: raw.function_name,
        error_message: raw.error_message.unwrap_or_default(),
        stack_trace: raw.stack_trace.unwrap_or_default(),
        failing_test: raw.failing_test,
        confidence: raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        raw_excerpt: truncate_chars(log_excerpt, RAW_EXCERPT_LIMIT).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightwatch_llm::MockModel;

    #[tokio::test]
    async fn test_analysis_parses_well_formed_response() {
        let model = MockModel::new();
        model.push_response(
            r#"{
                "error_type": "TypeError",
                "file_path": "src/payment/processor.py",
                "line_number": 42,
                "function_name": "process_payment",
                "error_message": "'NoneType' object has no attribute 'amount'",
                "stack_trace": ["File \"src/payment/processor.py\", line 42"],
                "failing_test": "test_process_payment",
                "confidence": 0.92
            }"#,
        );

        let artifact = analyze_failure(&model, "TypeError: boom").await.unwrap();
        assert_eq!(artifact.error_kind, ErrorKind::TypeError);
        assert_eq!(artifact.file_path, "src/payment/processor.py");
        assert_eq!(artifact.line_number, Some(42));
        assert_eq!(artifact.confidence, 0.92);
        assert_eq!(artifact.raw_excerpt, "TypeError: boom");
    }

    #[tokio::test]
    async fn test_analysis_strips_code_fences() {
        let model = MockModel::new();
        model.push_response(
            "```json\n{\"error_type\": \"KeyError\", \"error_message\": \"'id'\", \"confidence\": 0.7}\n```",
        );

        let artifact = analyze_failure(&model, "log").await.unwrap();
        assert_eq!(artifact.error_kind, ErrorKind::KeyError);
        assert_eq!(artifact.confidence, 0.7);
    }

    #[tokio::test]
    async fn test_analysis_unknown_kind_coerces_to_other() {
        let model = MockModel::new();
        model.push_response(r#"{"error_type": "SegfaultError", "confidence": 0.8}"#);

        let artifact = analyze_failure(&model, "log").await.unwrap();
        assert_eq!(artifact.error_kind, ErrorKind::Other);
        assert_eq!(artifact.file_path, "unknown");
    }

    #[tokio::test]
    async fn test_analysis_clamps_confidence_and_defaults() {
        let model = MockModel::new();
        model.push_response(r#"{"error_type": "ValueError", "confidence": 3.5}"#);
        let artifact = analyze_failure(&model, "log").await.unwrap();
        assert_eq!(artifact.confidence, 1.0);

        model.push_response(r#"{"error_type": "ValueError"}"#);
        let artifact = analyze_failure(&model, "log").await.unwrap();
        assert_eq!(artifact.confidence, 0.5);
        assert!(artifact.stack_trace.is_empty());
    }

    #[tokio::test]
    async fn test_analysis_unparseable_response_degrades() {
        let model = MockModel::new();
        model.push_response("I think the problem is somewhere in the payment code.");

        let artifact = analyze_failure(&model, "log").await.unwrap();
        assert_eq!(artifact.error_kind, ErrorKind::Other);
        assert_eq!(artifact.confidence, 0.0);
        assert!(artifact.raw_excerpt.starts_with("I think the problem"));
    }

    #[tokio::test]
    async fn test_transport_error_bubbles() {
        let model = MockModel::new().fail_with("provider down");
        assert!(analyze_failure(&model, "log").await.is_err());
    }

    #[test]
    fn test_strip_code_fences_variants() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }
}
