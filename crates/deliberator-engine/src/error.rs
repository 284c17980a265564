//! Top-level error enum the outer surface sees. Variants map 1:1 onto the
//! kinds in §7, each carrying enough structured context (participant id,
//! round number, backend id) to build the synthetic `[ERROR: kind: msg]`
//! text without re-parsing a string.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("backend '{backend_id}' failed for {participant} in round {round}: {message}")]
    BackendInvocation {
        backend_id: String,
        participant: String,
        round: u32,
        message: String,
    },

    #[error("backend '{backend_id}' timed out for {participant} in round {round}")]
    Timeout {
        backend_id: String,
        participant: String,
        round: u32,
    },

    #[error("transient error from backend '{backend_id}', retries exhausted: {message}")]
    Transient { backend_id: String, message: String },

    #[error("tool '{tool_name}' failed: {message}")]
    Tool { tool_name: String, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] deliberator_graph::GraphError),

    #[error("retrieval error (degraded to empty context): {0}")]
    Retrieval(String),

    #[error("summarizer error (degraded to placeholder summary): {0}")]
    Summarizer(String),

    #[error(transparent)]
    Config(#[from] deliberator_config::ConfigError),
}

impl EngineError {
    /// Render as the synthetic `[ERROR: kind: msg]` text a participant's
    /// response slot takes when its backend call fails (§4.8 step 3).
    pub fn as_response_text(&self) -> String {
        let kind = match self {
            Self::Validation { .. } => "Validation",
            Self::BackendInvocation { .. } => "BackendInvocation",
            Self::Timeout { .. } => "Timeout",
            Self::Transient { .. } => "Transient",
            Self::Tool { .. } => "Tool",
            Self::Storage(_) => "Storage",
            Self::Retrieval(_) => "Retrieval",
            Self::Summarizer(_) => "Summarizer",
            Self::Config(_) => "Config",
        };
        format!("[ERROR: {kind}: {self}]")
    }

    pub fn from_backend_error(
        err: deliberator_backends::BackendError,
        backend_id: &str,
        participant: &str,
        round: u32,
    ) -> Self {
        use deliberator_backends::BackendError;
        match err {
            BackendError::Timeout { .. } => Self::Timeout {
                backend_id: backend_id.to_string(),
                participant: participant.to_string(),
                round,
            },
            other => Self::BackendInvocation {
                backend_id: backend_id.to_string(),
                participant: participant.to_string(),
                round,
                message: other.to_string(),
            },
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_embeds_kind_and_message() {
        let err = EngineError::BackendInvocation {
            backend_id: "claude".into(),
            participant: "opus@claude".into(),
            round: 2,
            message: "exit code 1".into(),
        };
        let text = err.as_response_text();
        assert!(text.starts_with("[ERROR: BackendInvocation:"));
        assert!(text.contains("exit code 1"));
    }
}
