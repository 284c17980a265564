//! HTTP backend adapter: standard chat-completions shape by default, with a
//! model-name-prefix predicate selecting a reasoning-style input/output
//! endpoint for models that expose one.

use crate::error::{BackendError, BackendResult};
use crate::invoke::{Invoke, InvokeRequest};
use crate::retry::{backoff_delay, is_transient_status};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_MAX_PROMPT_CHARS: usize = 100_000;
const REASONING_MODEL_PREFIXES: &[&str] = &["o1", "o3", "o4"];

fn is_reasoning_model(model: &str) -> bool {
    REASONING_MODEL_PREFIXES.iter().any(|prefix| model.starts_with(prefix))
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct ReasoningRequest {
    model: String,
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReasoningResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<ReasoningOutputItem>,
}

#[derive(Debug, Deserialize)]
struct ReasoningOutputItem {
    #[serde(default)]
    content: Vec<ReasoningContent>,
}

#[derive(Debug, Deserialize)]
struct ReasoningContent {
    #[serde(default)]
    text: Option<String>,
}

impl ReasoningResponse {
    fn into_text(self) -> Option<String> {
        if let Some(text) = self.output_text {
            return Some(text);
        }
        let joined: String = self
            .output
            .into_iter()
            .flat_map(|item| item.content.into_iter())
            .filter_map(|c| c.text)
            .collect();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

pub struct HttpAdapter {
    backend_id: String,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    max_prompt_chars: usize,
    model_override: Option<String>,
}

impl HttpAdapter {
    pub fn new(backend_id: String, base_url: String, api_key: Option<String>, timeout: Duration, max_retries: u32) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|_| Client::new());
        Self {
            backend_id,
            client,
            base_url,
            api_key,
            max_retries,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            model_override: None,
        }
    }

    /// Used when this adapter stands in as a CLI-unavailable fallback: the
    /// gateway's fallback model id replaces whatever the participant requested.
    pub fn with_model_override(mut self, model: String) -> Self {
        self.model_override = Some(model);
        self
    }

    fn model_for(&self, request: &InvokeRequest) -> String {
        self.model_override.clone().unwrap_or_else(|| request.model.clone())
    }

    async fn invoke_chat(&self, model: &str, prompt: &str) -> BackendResult<String> {
        let body = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage { role: "user".to_string(), content: prompt.to_string() }],
            stream: false,
        };
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut req = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let first_line = text.lines().next().unwrap_or("").to_string();
            return Err(BackendError::Runtime {
                backend_id: self.backend_id.clone(),
                message: format!("{} {} ({})", status.as_u16(), status.canonical_reason().unwrap_or(""), first_line),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| BackendError::Parse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| BackendError::Parse("chat completion response had no choices".to_string()))
    }

    async fn invoke_reasoning(&self, model: &str, prompt: &str, reasoning_effort: Option<String>) -> BackendResult<String> {
        let body = ReasoningRequest { model: model.to_string(), input: prompt.to_string(), reasoning_effort };
        let url = format!("{}/responses", self.base_url.trim_end_matches('/'));
        let mut req = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let first_line = text.lines().next().unwrap_or("").to_string();
            return Err(BackendError::Runtime {
                backend_id: self.backend_id.clone(),
                message: format!("{} {} ({})", status.as_u16(), status.canonical_reason().unwrap_or(""), first_line),
            });
        }

        let parsed: ReasoningResponse = response.json().await.map_err(|e| BackendError::Parse(e.to_string()))?;
        parsed.into_text().ok_or_else(|| BackendError::Parse("reasoning response had no output text".to_string()))
    }
}

#[async_trait]
impl Invoke for HttpAdapter {
    async fn invoke(&self, request: &InvokeRequest) -> BackendResult<String> {
        let prompt = request.full_prompt();
        if prompt.len() > self.max_prompt_chars {
            return Err(BackendError::PromptTooLong { max: self.max_prompt_chars });
        }
        let model = self.model_for(request);

        let mut attempt = 0;
        loop {
            debug!(backend = %self.backend_id, model = %model, "http backend invocation started");
            let result = if is_reasoning_model(&model) {
                self.invoke_reasoning(&model, &prompt, request.reasoning_effort.clone()).await
            } else {
                self.invoke_chat(&model, &prompt).await
            };

            match result {
                Ok(text) => {
                    debug!(backend = %self.backend_id, "http backend invocation done");
                    return Ok(text);
                }
                Err(BackendError::Http(e)) if attempt < self.max_retries && e.status().map(is_transient_status).unwrap_or(false) => {
                    attempt += 1;
                    warn!(backend = %self.backend_id, attempt, "transient http error, retrying");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
