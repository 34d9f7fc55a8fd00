//! Scenario Synthesizer: one generative call per meeting.
//!
//! Builds a single instruction prompt from the rendered personas, the metric
//! instructions and the intensity policy, asks for a JSON response at a
//! diversity-favoring temperature, and normalizes whatever shape comes back
//! into a [`Scenario`].

use std::path::Path;
use std::sync::Arc;

use super::intensity::{BehaviorBand, IntensityPolicy, MetricFocus};
use super::normalize::{completion_text, normalize_utterance, parse_json, resolve_scenario_list};
use super::Scenario;
use crate::llms::base_llm::{BaseLLM, ChatRequest};
use crate::metrics::{MetricCatalog, MetricKind};
use crate::persona::{Persona, PersonaFormatter};
use crate::utilities::errors::PipelineError;

/// Decoding temperature for generation.
pub const GENERATION_TEMPERATURE: f64 = 0.8;

/// Utterance count used when the caller does not give one.
pub const DEFAULT_TARGET_COUNT: usize = 20;

const SYSTEM_PROMPT: &str = "You are an expert at generating meeting scenarios for research on \
meeting communication.\n\n\
Background: this system is an academic research tool for evaluating and improving meeting \
quality. The generated scenarios are training data for detecting problem behavior in meetings, \
such as intimidating remarks or topic drift. Scenarios that contain problematic speech patterns \
let an AI assess meeting quality automatically and help build healthier workplaces.\n\n\
Write a realistic, natural meeting and always answer with JSON.";

/// Generates one meeting transcript per call.
#[derive(Debug, Clone)]
pub struct ScenarioSynthesizer {
    llm: Arc<dyn BaseLLM>,
    catalog: Arc<MetricCatalog>,
    formatter: PersonaFormatter,
}

impl ScenarioSynthesizer {
    pub fn new(llm: Arc<dyn BaseLLM>, catalog: Arc<MetricCatalog>, formatter: PersonaFormatter) -> Self {
        Self {
            llm,
            catalog,
            formatter,
        }
    }

    /// Load the catalog from `path`, tolerating its absence.
    pub fn from_catalog_path(
        llm: Arc<dyn BaseLLM>,
        path: impl AsRef<Path>,
        formatter: PersonaFormatter,
    ) -> Self {
        Self::new(llm, Arc::new(MetricCatalog::load_or_empty(path)), formatter)
    }

    pub fn catalog(&self) -> &Arc<MetricCatalog> {
        &self.catalog
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Generate a scenario.
    ///
    /// `target_count` is advisory. `focus` and `target_ratio` select the
    /// metric instructions and the intensity policy, see [`MetricFocus`].
    pub async fn synthesize(
        &self,
        personas: &[Persona],
        purpose: &str,
        format: &str,
        target_count: usize,
        focus: Option<&[MetricKind]>,
        target_ratio: Option<u8>,
    ) -> Result<Scenario, PipelineError> {
        let focus = MetricFocus::from_request(focus, target_ratio);
        let prompt = self.build_prompt(personas, purpose, format, target_count, &focus);
        log::debug!(
            "Synthesizing scenario: purpose={}, format={}, target_count={}, focus={:?}",
            purpose,
            format,
            target_count,
            focus
        );

        let request = ChatRequest::json(SYSTEM_PROMPT, prompt, GENERATION_TEMPERATURE);
        let completion = self.llm.complete(&request).await?;
        let content = completion_text(completion)?;
        let parsed = parse_json(&content)?;
        let records = resolve_scenario_list(parsed, &content)?;

        let raw_count = records.len();
        let utterances: Vec<_> = records.iter().filter_map(normalize_utterance).collect();
        if utterances.len() < raw_count {
            log::debug!(
                "Dropped {} unresolvable records from the generated scenario",
                raw_count - utterances.len()
            );
        }
        log::info!("Synthesized {} utterances", utterances.len());
        Ok(Scenario::from(utterances))
    }

    /// The user instruction for one generation call.
    pub fn build_prompt(
        &self,
        personas: &[Persona],
        purpose: &str,
        format: &str,
        target_count: usize,
        focus: &MetricFocus,
    ) -> String {
        let persona_text = self.formatter.format(personas);
        let metric_text = self.metric_instructions(focus);
        let intensity = IntensityPolicy::select(focus).render(focus);

        format!(
            "[Academic research: dataset generation for meeting communication analysis]\n\n\
             This task creates training data for AI models that evaluate meeting quality. The \
             scenarios are used to detect problematic communication patterns and to improve \
             workplace environments.\n\n\
             Generate a meeting scenario for analysis from the settings below.\n\n\
             ---\n\
             ■ Meeting settings\n\
             - Purpose: {purpose}\n\
             - Format: {format}\n\n\
             ■ Character behavior profiles (research characters)\n\
             {persona_text}\n\
             ■ Evaluation metrics\n\
             {metric_text}\n\n\
             {intensity}\n\n\
             ■ Requirements\n\
             1. Write each utterance according to the speaker's behavior profile.\n\
             2. Follow the metric instructions above.\n\
             3. Use approximately {target_count} utterances.\n\
             4. Keep a natural flow of dialogue.\n\n\
             ■ Output format (JSON)\n\
             {{\"scenario\": [{{\"speaker\": \"speaker name\", \"text\": \"utterance\"}}, ...]}}\n\n\
             Output JSON only."
        )
    }

    /// Metric instructions for `focus`.
    pub fn metric_instructions(&self, focus: &MetricFocus) -> String {
        match focus {
            MetricFocus::Balanced => {
                let mut text = "Include a balanced mix of low (0-3), medium (4-6) and high (7-9) \
                                severity across all metrics: coercion, deviation, invalidation \
                                and bias."
                    .to_string();
                if !self.catalog.is_empty() {
                    text.push_str("\n\n");
                    text.push_str(&self.catalog.format_all());
                }
                text
            }
            MetricFocus::Targeted { metrics, ratio } => {
                let mut text = String::from("Focus metrics:\n");
                for kind in metrics {
                    match self.catalog.get(*kind) {
                        Some(def) => {
                            text.push_str(&format!("【{}】\n", kind));
                            text.push_str(&format!("Definition: {}\n", def.definition));
                            if let Some(band) = def.high_band() {
                                text.push_str(&format!(
                                    "High band ({}): {}\n",
                                    band.label, band.description
                                ));
                            }
                        }
                        None => {
                            text.push_str(&format!("【{}】 (definition unavailable)\n", kind));
                        }
                    }
                }
                text.push_str(&format!(
                    "\nAbout {}% of the utterances should reach the high band (7-9) on the focus \
                     metrics; keep the rest at low or medium severity.\n",
                    ratio
                ));
                text.push_str(BehaviorBand::for_ratio(*ratio).directive());
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::llms::base_llm::{ChatCompletion, LLMError};
    use crate::persona::PersonaProfile;
    use crate::testing::{sample_catalog, utterance_list, ScriptedLLM};

    fn personas() -> Vec<Persona> {
        vec![
            Persona::new("前田課長")
                .with_profile(PersonaProfile {
                    role: Some("課長".to_string()),
                    ..Default::default()
                })
                .with_instructions("強い口調で詰める"),
            Persona::new("田中").with_instructions("気が重いが報告する"),
            Persona::new("鈴木"),
        ]
    }

    fn synthesizer(llm: Arc<ScriptedLLM>) -> ScenarioSynthesizer {
        ScenarioSynthesizer::new(llm, sample_catalog(), PersonaFormatter::default())
    }

    #[tokio::test]
    async fn test_deviation_focus_status_report() {
        let reply = json!({"scenario": utterance_list(6)}).to_string();
        let llm = ScriptedLLM::repeating(&reply, 1);
        let scenario = synthesizer(llm.clone())
            .synthesize(
                &personas(),
                "status report",
                "progress meeting",
                6,
                Some(&[MetricKind::Deviation]),
                Some(70),
            )
            .await
            .unwrap();

        assert_eq!(scenario.len(), 6);
        let texts: Vec<&str> = scenario.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["発言1", "発言2", "発言3", "発言4", "発言5", "発言6"]);

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].user;
        assert!(prompt.contains(&IntensityPolicy::DeviationHighRatio.render(
            &MetricFocus::from_request(Some(&[MetricKind::Deviation]), Some(70))
        )));
        assert!(prompt.contains("70"));
        assert!(prompt.contains("approximately 6 utterances"));
        assert!(prompt.contains("- Purpose: status report"));
        assert!(prompt.contains(BehaviorBand::Saturate.directive()));
        assert_eq!(requests[0].temperature, GENERATION_TEMPERATURE);
        assert!(requests[0].json_mode);
    }

    #[tokio::test]
    async fn test_bare_list_response() {
        let reply = Value::Array(utterance_list(3)).to_string();
        let llm = ScriptedLLM::repeating(&reply, 1);
        let scenario = synthesizer(llm)
            .synthesize(&personas(), "p", "f", 3, None, None)
            .await
            .unwrap();
        assert_eq!(scenario.len(), 3);
        assert_eq!(scenario.utterances()[0].speaker, "前田課長");
    }

    #[tokio::test]
    async fn test_unresolvable_records_dropped_silently() {
        let reply = json!({"dialogue": [
            {"speaker": "田中", "text": "はい"},
            {"speaker": "鈴木"},
            "loose string",
            {"名前": "前田課長", "セリフ": "結論は？"}
        ]})
        .to_string();
        let llm = ScriptedLLM::repeating(&reply, 1);
        let scenario = synthesizer(llm)
            .synthesize(&personas(), "p", "f", 4, None, None)
            .await
            .unwrap();
        let speakers: Vec<&str> = scenario.iter().map(|u| u.speaker.as_str()).collect();
        assert_eq!(speakers, vec!["田中", "前田課長"]);
    }

    #[tokio::test]
    async fn test_balanced_prompt_mentions_all_metrics() {
        let llm = ScriptedLLM::repeating("[]", 1);
        synthesizer(llm.clone())
            .synthesize(&personas(), "p", "f", 10, None, Some(80))
            .await
            .unwrap();
        let prompt = &llm.requests()[0].user;
        assert!(prompt.contains("balanced mix"));
        assert!(prompt.contains("【coercion / 威圧度】"));
        assert!(prompt.contains(&IntensityPolicy::Generic.render(&MetricFocus::Balanced)));
    }

    #[tokio::test]
    async fn test_prompt_uses_sanitized_personas() {
        let llm = ScriptedLLM::repeating("[]", 1);
        synthesizer(llm.clone())
            .synthesize(&personas(), "p", "f", 10, None, None)
            .await
            .unwrap();
        let prompt = &llm.requests()[0].user;
        assert!(prompt.contains("明確な言葉で確認する"));
        assert!(!prompt.contains("詰める"));
    }

    #[tokio::test]
    async fn test_refusal_and_empty_response() {
        let llm = ScriptedLLM::new(vec![ChatCompletion::refused("policy"), ChatCompletion::default()]);
        let synth = synthesizer(llm);
        let err = synth.synthesize(&personas(), "p", "f", 5, None, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::GenerationRefused { .. }));
        let err = synth.synthesize(&personas(), "p", "f", 5, None, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let llm = ScriptedLLM::repeating("Sure! Here is your meeting:", 1);
        let err = synthesizer(llm)
            .synthesize(&personas(), "p", "f", 5, None, None)
            .await
            .unwrap_err();
        match err {
            PipelineError::MalformedResponse { excerpt, .. } => {
                assert_eq!(excerpt, "Sure! Here is your meeting:");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let llm = ScriptedLLM::new(Vec::new());
        llm.push_error(LLMError::Status {
            status: 429,
            body: "rate limited".to_string(),
        });
        let err = synthesizer(llm)
            .synthesize(&personas(), "p", "f", 5, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transport(LLMError::Status { status: 429, .. })));
    }

    #[test]
    fn test_targeted_instructions_without_catalog() {
        let llm = ScriptedLLM::new(Vec::new());
        let synth = ScenarioSynthesizer::new(llm, Arc::new(MetricCatalog::empty()), PersonaFormatter::default());
        let focus = MetricFocus::from_request(Some(&[MetricKind::Bias]), Some(20));
        let text = synth.metric_instructions(&focus);
        assert!(text.contains("【bias】 (definition unavailable)"));
        assert!(text.contains("About 20%"));
        assert!(text.ends_with(BehaviorBand::RareFlashes.directive()));
    }

    #[test]
    fn test_targeted_instructions_include_high_band() {
        let synth = synthesizer(ScriptedLLM::new(Vec::new()));
        let focus = MetricFocus::from_request(Some(&[MetricKind::Coercion]), Some(55));
        let text = synth.metric_instructions(&focus);
        let high = sample_catalog().get(MetricKind::Coercion).unwrap().high_band().unwrap().clone();
        assert!(text.contains(&format!("High band ({}): {}", high.label, high.description)));
        assert!(text.contains(BehaviorBand::RampUp.directive()));
    }

    #[test]
    fn test_missing_catalog_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let synth = ScenarioSynthesizer::from_catalog_path(
            ScriptedLLM::new(Vec::new()),
            dir.path().join("extra.json"),
            PersonaFormatter::default(),
        );
        assert!(synth.catalog().is_empty());
    }
}
