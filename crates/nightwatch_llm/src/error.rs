//! Error types for the LLM client.

use thiserror::Error;

/// Result type alias for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur while talking to a completion provider.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NotConfigured,

    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Empty response from provider")]
    EmptyResponse,

    #[error("Max retries exceeded: {0}")]
    MaxRetries(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
