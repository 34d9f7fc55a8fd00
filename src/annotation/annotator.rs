//! Metric Annotator: one scoring call per utterance.
//!
//! Utterances are scored strictly in order. Each call sees the trailing
//! [`RollingContext`] window, so the loop is a fold over
//! `(context, utterance) -> (context', annotated)` and cannot be parallelized.
//!
//! The first failing call aborts the batch; annotations already computed are
//! discarded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::context::{RollingContext, CONTEXT_WINDOW};
use crate::llms::base_llm::{BaseLLM, ChatRequest};
use crate::metrics::{Annotation, MetricCatalog, MetricKind, MetricScores, SCORE_MAX};
use crate::scenario::normalize::{completion_text, normalize_utterance, parse_json};
use crate::scenario::{Scenario, Utterance};
use crate::utilities::errors::{CatalogLoadError, PipelineError};

/// Decoding temperature for scoring.
pub const ANNOTATION_TEMPERATURE: f64 = 0.3;

const SYSTEM_PROMPT: &str = "You are an expert in evaluating meeting quality. Score utterances \
objectively against the given metric definitions. Always answer with JSON.";

/// An utterance with its four metric annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedUtterance {
    pub speaker: String,
    pub text: String,
    pub metrics: MetricScores,
}

/// Scores utterances against the metric catalog.
#[derive(Debug, Clone)]
pub struct MetricAnnotator {
    llm: Arc<dyn BaseLLM>,
    catalog: Arc<MetricCatalog>,
}

impl MetricAnnotator {
    /// Fails with [`CatalogLoadError::Empty`] when the catalog has no
    /// definitions; annotation cannot run without them.
    pub fn new(llm: Arc<dyn BaseLLM>, catalog: Arc<MetricCatalog>) -> Result<Self, CatalogLoadError> {
        if catalog.is_empty() {
            return Err(CatalogLoadError::Empty);
        }
        Ok(Self { llm, catalog })
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Annotate a normalized scenario.
    pub async fn annotate_scenario(
        &self,
        scenario: &Scenario,
        purpose: &str,
        format: &str,
    ) -> Result<Vec<AnnotatedUtterance>, PipelineError> {
        self.annotate(&scenario.to_records(), purpose, format).await
    }

    /// Annotate raw utterance records in order.
    ///
    /// Records whose speaker or text cannot be resolved are skipped with a
    /// warning. Any failed call aborts the whole run.
    pub async fn annotate(
        &self,
        records: &[Value],
        purpose: &str,
        format: &str,
    ) -> Result<Vec<AnnotatedUtterance>, PipelineError> {
        let mut context = RollingContext::new();
        let mut annotated = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let utterance = match normalize_utterance(record) {
                Some(u) => u,
                None => {
                    log::warn!("Skipping utterance {} with no resolvable speaker/text: {}", index, record);
                    continue;
                }
            };

            let metrics = self
                .annotate_utterance(&utterance, &context, purpose, format)
                .await
                .map_err(|e| {
                    log::error!(
                        "Annotation aborted at utterance {} after {} succeeded: {}",
                        index,
                        annotated.len(),
                        e
                    );
                    e
                })?;

            context = context.push(&utterance);
            annotated.push(AnnotatedUtterance {
                speaker: utterance.speaker,
                text: utterance.text,
                metrics,
            });
        }

        log::info!("Annotated {} utterances", annotated.len());
        Ok(annotated)
    }

    async fn annotate_utterance(
        &self,
        utterance: &Utterance,
        context: &RollingContext,
        purpose: &str,
        format: &str,
    ) -> Result<MetricScores, PipelineError> {
        let prompt = self.build_prompt(utterance, context, purpose, format);
        let request = ChatRequest::json(SYSTEM_PROMPT, prompt, ANNOTATION_TEMPERATURE);
        let completion = self.llm.complete(&request).await?;
        let content = completion_text(completion)?;
        let parsed = parse_json(&content)?;
        parse_scores(parsed, &content)
    }

    /// The user instruction for scoring one utterance.
    pub fn build_prompt(
        &self,
        utterance: &Utterance,
        context: &RollingContext,
        purpose: &str,
        format: &str,
    ) -> String {
        let output_shape = MetricKind::ALL
            .iter()
            .map(|kind| format!("  \"{}\": {{\"score\": <0-9>, \"reason\": \"...\"}}", kind))
            .collect::<Vec<_>>()
            .join(",\n");

        format!(
            "Score the following meeting utterance on four metrics.\n\n\
             [Meeting purpose]\n{purpose}\n\n\
             [Meeting format]\n{format}\n\n\
             [Previous utterances (last {CONTEXT_WINDOW})]\n{context}\n\n\
             [Utterance to evaluate]\n{utterance}\n\n\
             [Metric definitions]\n{metrics}\n\n\
             [Scoring]\n\
             Give each metric a score from 0 to 9:\n\
             - 0-3: low (healthy)\n\
             - 4-6: medium (ordinary)\n\
             - 7-9: high (problematic)\n\
             Briefly explain each score.\n\n\
             [Output format]\n{{\n{output_shape}\n}}\n\n\
             Output JSON only, without commentary.",
            context = context.render(),
            utterance = utterance.render(),
            metrics = self.catalog.format_all(),
        )
    }
}

/// Validate a scoring response.
///
/// Every metric must be present, keyed by its English name or localized
/// label. Scores must be integers (or integer strings) in `0..=9`; a missing
/// reason becomes the empty string.
pub fn parse_scores(value: Value, content: &str) -> Result<MetricScores, PipelineError> {
    let map = match value {
        Value::Object(map) => map,
        _ => return Err(PipelineError::malformed("expected a JSON object of metric scores", content)),
    };

    let mut scores = MetricScores::new();
    for kind in MetricKind::ALL {
        let entry = find_metric(&map, kind)
            .ok_or_else(|| PipelineError::malformed(format!("missing score for '{}'", kind), content))?;
        let score = entry
            .get("score")
            .and_then(score_value)
            .filter(|s| *s <= u64::from(SCORE_MAX))
            .ok_or_else(|| {
                PipelineError::malformed(format!("'{}' needs an integer score between 0 and 9", kind), content)
            })?;
        let reason = entry
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        // Bounded by SCORE_MAX above.
        scores.insert(kind, Annotation::new(score as u8, reason));
    }
    Ok(scores)
}

fn find_metric(map: &Map<String, Value>, kind: MetricKind) -> Option<&Value> {
    map.iter()
        .find(|(key, _)| MetricKind::from_label(key) == Some(kind))
        .map(|(_, v)| v)
}

fn score_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(SCORE_MAX))
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
