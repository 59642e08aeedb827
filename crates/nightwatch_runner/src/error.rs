//! Error types for the sandbox layer.

use thiserror::Error;

/// Result type alias for sandbox operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while driving the container runtime.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Docker not available: {0}")]
    DockerNotAvailable(String),

    #[error("Sandbox exec failed: {0}")]
    ExecFailed(String),

    #[error("Image pull failed: {0}")]
    ImagePullFailed(String),

    #[error("Sandbox session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid mount configuration: {0}")]
    InvalidMount(String),

    #[error("Docker API error: {0}")]
    DockerApi(#[from] bollard::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
