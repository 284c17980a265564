//! The uniform adapter contract every backend, subprocess or HTTP, implements.

use crate::error::BackendResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// One call into a model backend.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub prompt: String,
    pub model: String,
    pub context: Option<String>,
    pub is_deliberation: bool,
    pub working_directory: Option<PathBuf>,
    pub reasoning_effort: Option<String>,
}

impl InvokeRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            context: None,
            is_deliberation: true,
            working_directory: None,
            reasoning_effort: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_working_directory(mut self, dir: PathBuf) -> Self {
        self.working_directory = Some(dir);
        self
    }

    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    /// `context`, if present, prepended to `prompt` separated by a blank line.
    pub fn full_prompt(&self) -> String {
        match &self.context {
            Some(context) if !context.is_empty() => format!("{context}\n\n{}", self.prompt),
            _ => self.prompt.clone(),
        }
    }
}

/// A backend capable of turning a prompt into response text.
#[async_trait]
pub trait Invoke: Send + Sync {
    async fn invoke(&self, request: &InvokeRequest) -> BackendResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_prompt_joins_context_with_a_blank_line() {
        let req = InvokeRequest::new("Should we adopt X?", "claude-3").with_context("Prior decision: Y was rejected.");
        assert_eq!(req.full_prompt(), "Prior decision: Y was rejected.\n\nShould we adopt X?");
    }

    #[test]
    fn full_prompt_is_bare_prompt_without_context() {
        let req = InvokeRequest::new("Should we adopt X?", "claude-3");
        assert_eq!(req.full_prompt(), "Should we adopt X?");
    }
}
