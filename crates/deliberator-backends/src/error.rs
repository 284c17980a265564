//! Errors surfaced by backend adapters.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("missing required API key for backend '{backend_id}'")]
    MissingApiKey { backend_id: String },

    #[error("missing required configuration: {message}")]
    MissingConfig { message: String },

    #[error("prompt exceeds maximum length of {max} characters")]
    PromptTooLong { max: usize },

    #[error("backend timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("failed to parse backend response: {0}")]
    Parse(String),

    #[error("backend '{backend_id}' failed: {message}")]
    Runtime { backend_id: String, message: String },

    #[error("no fallback adapter available for backend '{backend_id}'")]
    NoFallback { backend_id: String },
}

pub type BackendResult<T> = Result<T, BackendError>;
