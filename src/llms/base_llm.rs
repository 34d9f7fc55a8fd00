//! Base trait for the generative service boundary.
//!
//! Both pipeline stages talk to the model through [`BaseLLM`]: a single-turn
//! chat call with a system instruction, a user instruction, a temperature and
//! an optional "force JSON object" response mode. The call yields either
//! textual content or a refusal signal.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// A single-turn chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// System instruction.
    pub system: String,
    /// User instruction.
    pub user: String,
    /// Decoding temperature.
    pub temperature: f64,
    /// Ask the service to return a JSON object.
    pub json_mode: bool,
}

impl ChatRequest {
    /// Create a request in JSON-object response mode.
    pub fn json(system: impl Into<String>, user: impl Into<String>, temperature: f64) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
            json_mode: true,
        }
    }
}

/// The assistant message returned by a chat call.
///
/// Exactly one of `content` / `refusal` is normally set; both may be absent
/// when the service misbehaves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub refusal: Option<String>,
}

impl ChatCompletion {
    /// A completion carrying textual content.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            refusal: None,
        }
    }

    /// A completion carrying a refusal and no content.
    pub fn refused(refusal: impl Into<String>) -> Self {
        Self {
            content: None,
            refusal: Some(refusal.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Transport-level failures talking to the generative service.
#[derive(Debug, Error)]
pub enum LLMError {
    /// No API key configured for the provider.
    #[error("{provider} API key not set. Set OPENAI_API_KEY or pass an api_key to the constructor.")]
    MissingApiKey { provider: String },

    /// The HTTP request itself failed.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The response envelope could not be decoded.
    #[error("Undecodable provider response: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// BaseLLM trait
// ---------------------------------------------------------------------------

/// Interface every generative backend implements.
///
/// Implementations must not retry on their own: the pipeline has no retry
/// policy and a failed call aborts the in-flight batch.
#[async_trait]
pub trait BaseLLM: Send + Sync + fmt::Debug {
    /// Model identifier.
    fn model(&self) -> &str;

    /// Issue one chat call.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LLMError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_request_sets_mode() {
        let req = ChatRequest::json("sys", "user", 0.3);
        assert!(req.json_mode);
        assert_eq!(req.temperature, 0.3);
    }

    #[test]
    fn test_completion_constructors() {
        let c = ChatCompletion::text("{}");
        assert_eq!(c.content.as_deref(), Some("{}"));
        assert!(c.refusal.is_none());

        let r = ChatCompletion::refused("I can't help with that.");
        assert!(r.content.is_none());
        assert_eq!(r.refusal.as_deref(), Some("I can't help with that."));
    }

    #[test]
    fn test_missing_key_message_names_provider() {
        let err = LLMError::MissingApiKey {
            provider: "OpenAI".to_string(),
        };
        assert!(err.to_string().starts_with("OpenAI API key not set"));
    }
}
