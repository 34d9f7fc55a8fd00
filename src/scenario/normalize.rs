//! Response normalization shared by both pipeline stages.
//!
//! The model names its fields unpredictably. Every lookup goes through
//! [`resolve`] with one of the fixed alias lists below, so the synthesizer
//! and the annotator agree on what counts as a speaker or a text.

use serde_json::Value;

use super::Utterance;
use crate::llms::base_llm::ChatCompletion;
use crate::utilities::errors::PipelineError;

/// Keys that may hold the utterance list, in priority order.
pub const SCENARIO_LIST_KEYS: &[&str] = &[
    "scenario",
    "utterances",
    "dialogue",
    "conversation",
    "messages",
    "発言",
    "シナリオ",
];

/// Keys that may hold the speaker, in priority order.
pub const SPEAKER_KEYS: &[&str] = &["speaker", "name", "発言者", "話者", "参加者", "名前"];

/// Keys that may hold the utterance text, in priority order.
pub const TEXT_KEYS: &[&str] = &["text", "content", "message", "発言", "発言内容", "内容", "セリフ"];

/// Resolve a field by the first alias present in `record`.
///
/// Only the first present key is considered. Its value counts when it is a
/// non-empty string or a non-zero number; anything else resolves to `None`.
pub fn resolve(record: &Value, aliases: &[&str]) -> Option<String> {
    let map = record.as_object()?;
    let value = aliases.iter().find_map(|key| map.get(*key))?;
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalize one raw record. Non-mappings and records lacking either field
/// yield `None`.
pub fn normalize_utterance(record: &Value) -> Option<Utterance> {
    let speaker = resolve(record, SPEAKER_KEYS)?;
    let text = resolve(record, TEXT_KEYS)?;
    Some(Utterance { speaker, text })
}

/// Find the utterance list in a parsed response.
///
/// A list is used as-is. In a mapping, the first [`SCENARIO_LIST_KEYS`] entry
/// holding a non-empty list wins, then the first non-empty list in document
/// order. A mapping with no non-empty list is malformed.
pub fn resolve_scenario_list(value: Value, content: &str) -> Result<Vec<Value>, PipelineError> {
    let mut map = match value {
        Value::Array(items) => return Ok(items),
        Value::Object(map) => map,
        other => {
            return Err(PipelineError::malformed(
                format!("expected a JSON list or object, got {}", type_name(&other)),
                content,
            ))
        }
    };

    let alias_key = SCENARIO_LIST_KEYS
        .iter()
        .find(|key| map.get(**key).map_or(false, is_non_empty_list))
        .map(|key| key.to_string());
    let key = alias_key.or_else(|| {
        map.iter()
            .find(|(_, v)| is_non_empty_list(v))
            .map(|(k, _)| k.clone())
    });

    match key.and_then(|k| map.remove(&k)) {
        Some(Value::Array(items)) => Ok(items),
        _ => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            Err(PipelineError::malformed(
                format!("no scenario list found in response; keys: [{}]", keys.join(", ")),
                content,
            ))
        }
    }
}

/// Extract the text of a completion, mapping absence to the right error.
pub fn completion_text(completion: ChatCompletion) -> Result<String, PipelineError> {
    match completion.content {
        Some(content) => Ok(content),
        None => match completion.refusal {
            Some(refusal) if !refusal.is_empty() => Err(PipelineError::GenerationRefused { refusal }),
            _ => Err(PipelineError::EmptyResponse),
        },
    }
}

/// Parse completion content as JSON.
pub fn parse_json(content: &str) -> Result<Value, PipelineError> {
    serde_json::from_str(content).map_err(|e| PipelineError::malformed(e.to_string(), content))
}

fn is_non_empty_list(value: &Value) -> bool {
    value.as_array().map_or(false, |items| !items.is_empty())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
