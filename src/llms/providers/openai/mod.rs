//! OpenAI Chat Completions provider.
//!
//! Sends single-turn chat requests over `reqwest` and extracts the first
//! choice's `content` or `refusal`. JSON mode maps to
//! `response_format: {"type": "json_object"}`. No retries are attempted.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llms::base_llm::{BaseLLM, ChatCompletion, ChatRequest, LLMError};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 120.0;

/// Maximum number of body bytes echoed back in error messages.
const ERROR_BODY_LIMIT: usize = 500;

/// OpenAI Chat Completions client.
///
/// # Example
///
/// ```ignore
/// let llm = OpenAICompletion::new("gpt-4o", None, None);
/// let reply = llm.complete(&ChatRequest::json(system, user, 0.3)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAICompletion {
    /// Model name (e.g. "gpt-4o").
    pub model: String,
    /// API key; falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Custom base URL.
    pub base_url: Option<String>,
    /// Organization header, from `OPENAI_ORGANIZATION` when set.
    pub organization: Option<String>,
    /// Request timeout in seconds.
    pub timeout: Option<f64>,
    client: reqwest::Client,
}

impl OpenAICompletion {
    /// Create a new provider.
    ///
    /// * `model` - OpenAI model name.
    /// * `api_key` - Optional API key (defaults to the OPENAI_API_KEY env var).
    /// * `base_url` - Optional custom base URL.
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.or_else(|| std::env::var("OPENAI_API_KEY").ok()),
            base_url,
            organization: std::env::var("OPENAI_ORGANIZATION").ok(),
            timeout: None,
            client: reqwest::Client::new(),
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    /// Get the API base URL.
    pub fn api_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Build the request body for the Chat Completions API.
    pub fn build_request_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "temperature": request.temperature,
        });
        if request.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    /// Extract the first choice's message from a Chat Completions response.
    pub fn parse_completions_response(&self, response: &Value) -> Result<ChatCompletion, LLMError> {
        let message = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| LLMError::Decode("No message in OpenAI response choices".to_string()))?;

        if let Some(usage) = response.get("usage") {
            log::debug!(
                "OpenAI token usage: prompt={}, completion={}, total={}",
                usage.get("prompt_tokens").and_then(Value::as_i64).unwrap_or(0),
                usage.get("completion_tokens").and_then(Value::as_i64).unwrap_or(0),
                usage.get("total_tokens").and_then(Value::as_i64).unwrap_or(0),
            );
        }

        let text_field = |key: &str| {
            message
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Ok(ChatCompletion {
            content: text_field("content"),
            refusal: text_field("refusal").filter(|r| !r.is_empty()),
        })
    }
}

#[async_trait]
impl BaseLLM for OpenAICompletion {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LLMError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| LLMError::MissingApiKey {
            provider: "OpenAI".to_string(),
        })?;

        let endpoint = format!("{}/chat/completions", self.api_base_url());
        let body = self.build_request_body(request);
        log::debug!(
            "OpenAICompletion.complete: model={}, temperature={}, json_mode={}",
            self.model,
            request.temperature,
            request.json_mode,
        );

        let mut builder = self
            .client
            .post(&endpoint)
            .timeout(Duration::from_secs_f64(
                self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .bearer_auth(api_key)
            .json(&body);
        if let Some(ref org) = self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(LLMError::Status {
                status: status.as_u16(),
                body: truncate_bytes(&text, ERROR_BODY_LIMIT).to_string(),
            });
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| {
            LLMError::Decode(format!(
                "{} - Body: {}",
                e,
                truncate_bytes(&text, ERROR_BODY_LIMIT)
            ))
        })?;

        self.parse_completions_response(&json)
    }
}

/// Cut `text` to at most `limit` bytes without splitting a character.
fn truncate_bytes(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
