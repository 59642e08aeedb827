//! Regression-test synthesis stage.
//!
//! Asks the completion model for one minimal failing-case test against the
//! diagnosed file, then derives the metadata the pipeline needs: the test
//! name, the target test file, and which subject symbols the test touches.

use std::path::Path;
use std::sync::OnceLock;

use nightwatch_llm::CompletionModel;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analysis::{strip_code_fences, truncate_chars, AnalysisArtifact};
use crate::error::PipelineResult;

/// Bytes of any existing test file included in the prompt.
const EXISTING_TESTS_LIMIT: usize = 2000;

/// A synthesized regression test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTest {
    pub name: String,
    pub code: String,
    /// Workspace-relative path the test should live at
    pub target_file: String,
    /// Subject-file symbols the test body references
    pub imports_needed: Vec<String>,
}

const TESTGEN_SYSTEM_PROMPT: &str = "You are a senior test engineer. You write minimal, \
deterministic pytest regression tests that reproduce diagnosed bugs.";

fn testgen_prompt(
    source: &str,
    existing_tests: Option<&str>,
    analysis: &AnalysisArtifact,
) -> String {
    let mut prompt = format!(
        "A CI run failed with this diagnosis:\n\
         - error type: {}\n\
         - file: {}\n\
         - line: {}\n\
         - function: {}\n\
         - message: {}\n\n\
         Write exactly ONE Python test function that reproduces the bug.\n\
         Requirements:\n\
         - minimal: no fixtures or helpers beyond what the bug needs\n\
         - descriptive name of the form test_<subject>_<edge_case>\n\
         - a short docstring stating what it guards against\n\
         - no mocking unless strictly required\n\
         - include the imports the test needs\n\
         Respond with only the test code, no prose.\n\n\
         Source of {}:\n```python\n{}\n```\n",
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
    );

    if let Some(existing) = existing_tests {
        prompt.push_str(&format!(
            "\nExisting tests for this module (excerpt):\n```python\n{}\n```\n",
            truncate_chars(existing, EXISTING_TESTS_LIMIT)
        ));
    }

    prompt
}

fn test_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"def (test_\w+)\s*\(").expect("test name regex"))
}

fn def_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^\s*def\s+(\w+)\s*\(").expect("def regex"))
}

/// Extract the test function name, or derive a fallback from the subject file.
fn extract_test_name(code: &str, subject_path: &str) -> String {
    if let Some(captures) = test_name_pattern().captures(code) {
        return captures[1].to_string();
    }
    let stem = Path::new(subject_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "subject".to_string());
    format!("test_{}_regression", stem)
}

/// Subject functions referenced by the test body.
fn required_symbols(subject_source: &str, test_code: &str) -> Vec<String> {
    def_pattern()
        .captures_iter(subject_source)
        .map(|c| c[1].to_string())
        .filter(|name| !name.starts_with("test_") && test_code.contains(name.as_str()))
        .collect()
}

/// Derive the test file path for a subject file.
///
/// `src/payment/processor.py` maps to `tests/payment/test_processor.py`;
/// files outside a `src` tree land directly under `tests/`.
pub fn derive_test_path(subject_path: &str) -> String {
    let path = Path::new(subject_path);
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "subject.py".to_string());
    let test_file = format!("test_{}", file_name);

    let components: Vec<&str> = subject_path.split('/').collect();
    if components.first() == Some(&"src") && components.len() > 1 {
        let mut mapped: Vec<&str> = vec!["tests"];
        mapped.extend(&components[1..components.len() - 1]);
        format!("{}/{}", mapped.join("/"), test_file)
    } else {
        format!("tests/{}", test_file)
    }
}

/// Run the test-synthesis stage.
pub async fn synthesize_test(
    model: &dyn CompletionModel,
    subject_source: &str,
    existing_tests: Option<&str>,
    analysis: &AnalysisArtifact,
) -> PipelineResult<GeneratedTest> {
    let prompt = testgen_prompt(subject_source, existing_tests, analysis);
    let response = model.complete(Some(TESTGEN_SYSTEM_PROMPT), &prompt).await?;

    let code = strip_code_fences(&response).to_string();
    let name = extract_test_name(&code, &analysis.file_path);
    let imports_needed = required_symbols(subject_source, &code);
    let target_file = derive_test_path(&analysis.file_path);

    Ok(GeneratedTest {
        name,
        code,
        target_file,
        imports_needed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ErrorKind;
    use nightwatch_llm::MockModel;

    fn sample_analysis() -> AnalysisArtifact {
        AnalysisArtifact {
            error_kind: ErrorKind::TypeError,
            file_path: "src/payment/processor.py".to_string(),
            line_number: Some(42),
            function_name: Some("process_payment".to_string()),
            error_message: "'NoneType' object has no attribute 'amount'".to_string(),
            stack_trace: Vec::new(),
            failing_test: None,
            confidence: 0.92,
            raw_excerpt: String::new(),
        }
    }

    const SUBJECT: &str = "def load_order(order_id):\n    ...\n\ndef process_payment(order):\n    return order.amount\n";

    #[tokio::test]
    async fn test_synthesize_extracts_name_and_symbols() {
        let model = MockModel::new();
        model.push_response(
            "```python\nfrom src.payment.processor import process_payment\n\n\
             def test_process_payment_none_order():\n    \
             \"\"\"process_payment must reject a missing order.\"\"\"\n    \
             import pytest\n    with pytest.raises(ValueError):\n        process_payment(None)\n```",
        );

        let test = synthesize_test(&model, SUBJECT, None, &sample_analysis())
            .await
            .unwrap();

        assert_eq!(test.name, "test_process_payment_none_order");
        assert_eq!(test.target_file, "tests/payment/test_processor.py");
        assert_eq!(test.imports_needed, vec!["process_payment".to_string()]);
        assert!(!test.code.contains("```"));
    }

    #[tokio::test]
    async fn test_synthesize_derives_default_name() {
        let model = MockModel::new();
        model.push_response("assert 1 == 1");

        let test = synthesize_test(&model, SUBJECT, None, &sample_analysis())
            .await
            .unwrap();
        assert_eq!(test.name, "test_processor_regression");
    }

    #[tokio::test]
    async fn test_prompt_includes_existing_tests_excerpt() {
        let model = MockModel::new();
        model.push_response("def test_x():\n    pass");

        let existing = "def test_old():\n    assert True\n";
        synthesize_test(&model, SUBJECT, Some(existing), &sample_analysis())
            .await
            .unwrap();

        let prompts = model.prompts();
        assert!(prompts[0].prompt.contains("test_old"));
    }

    #[test]
    fn test_derive_test_path_variants() {
        assert_eq!(
            derive_test_path("src/payment/processor.py"),
            "tests/payment/test_processor.py"
        );
        assert_eq!(derive_test_path("src/app.py"), "tests/test_app.py");
        assert_eq!(derive_test_path("lib/util.py"), "tests/test_util.py");
        assert_eq!(derive_test_path("app.py"), "tests/test_app.py");
    }
}
