//! Error types for the code-host client.

use thiserror::Error;

/// Result type alias for code-host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors that can occur while talking to the code host.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Code-host API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Log archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
