//! Shared test fixtures: a scripted generative backend and sample data.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llms::base_llm::{BaseLLM, ChatCompletion, ChatRequest, LLMError};
use crate::metrics::MetricCatalog;

/// The bundled definitions resource.
pub const SAMPLE_CATALOG_JSON: &str = include_str!("../data/extra.json");

/// The bundled sample profile file.
pub const SAMPLE_PROFILES_JSON: &str = include_str!("../data/profiles/status_report_pressure.json");

pub fn sample_catalog() -> Arc<MetricCatalog> {
    Arc::new(MetricCatalog::from_json_str(SAMPLE_CATALOG_JSON, "sample").unwrap())
}

/// Replays queued completions in order and records every request.
#[derive(Debug, Default)]
pub struct ScriptedLLM {
    replies: Mutex<VecDeque<Result<ChatCompletion, LLMError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLLM {
    pub fn new(replies: Vec<ChatCompletion>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Same text reply `times` times.
    pub fn repeating(content: &str, times: usize) -> Arc<Self> {
        Self::new(vec![ChatCompletion::text(content); times])
    }

    pub fn push_error(&self, error: LLMError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseLLM for ScriptedLLM {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LLMError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::Decode("scripted replies exhausted".to_string())))
    }
}

/// A score reply for all four metrics.
pub fn scores_reply(coercion: u8, deviation: u8, invalidation: u8, bias: u8) -> String {
    json!({
        "coercion": {"score": coercion, "reason": "pressure on the reporter"},
        "deviation": {"score": deviation, "reason": "on topic"},
        "invalidation": {"score": invalidation, "reason": "acknowledges others"},
        "bias": {"score": bias, "reason": "balanced"}
    })
    .to_string()
}

/// `n` well-formed utterance objects alternating between three speakers.
pub fn utterance_list(n: usize) -> Vec<Value> {
    let speakers = ["前田課長", "田中", "鈴木"];
    (0..n)
        .map(|i| json!({"speaker": speakers[i % speakers.len()], "text": format!("発言{}", i + 1)}))
        .collect()
}
