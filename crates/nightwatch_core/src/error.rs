//! Error types for the healing pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors from applying or reverting a patch.
///
/// These are semantic failures: the fix loop records them as a failed
/// attempt and keeps iterating instead of aborting the pipeline.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Target file not found: {0}")]
    FileMissing(PathBuf),

    #[error("Failed to apply fix - original code not found")]
    SpanNotFound,

    #[error("Patch is a no-op: replacement leaves file unchanged")]
    NoOp,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while driving a failure through the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No logs available for run")]
    NoLogs,

    #[error("Unparseable LLM response: {0}")]
    InvalidLlmResponse(String),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("Sandbox error: {0}")]
    Runner(#[from] nightwatch_runner::RunnerError),

    #[error("LLM error: {0}")]
    Llm(#[from] nightwatch_llm::LlmError),

    #[error("Code-host error: {0}")]
    Host(#[from] nightwatch_github::HostError),

    #[error("Store error: {0}")]
    Store(#[from] nightwatch_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
