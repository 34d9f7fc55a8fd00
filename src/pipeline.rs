//! Two-stage pipeline: synthesize a scenario, then annotate it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotatedUtterance, MetricAnnotator};
use crate::llms::OpenAICompletion;
use crate::metrics::{high_band_share, MetricCatalog, MetricKind};
use crate::persona::{Persona, PersonaFormatter};
use crate::scenario::synthesizer::DEFAULT_TARGET_COUNT;
use crate::scenario::{Scenario, ScenarioSynthesizer};
use crate::utilities::config::Settings;
use crate::utilities::errors::PipelineError;

fn default_target_count() -> usize {
    DEFAULT_TARGET_COUNT
}

/// Inputs for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub personas: Vec<Persona>,
    pub purpose: String,
    pub format: String,
    #[serde(default = "default_target_count")]
    pub target_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_metrics: Option<Vec<MetricKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ratio: Option<u8>,
}

impl GenerationRequest {
    pub fn new(personas: Vec<Persona>, purpose: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            personas,
            purpose: purpose.into(),
            format: format.into(),
            target_count: DEFAULT_TARGET_COUNT,
            focus_metrics: None,
            target_ratio: None,
        }
    }

    pub fn with_target_count(mut self, target_count: usize) -> Self {
        self.target_count = target_count;
        self
    }

    pub fn with_focus(mut self, metrics: Vec<MetricKind>, target_ratio: Option<u8>) -> Self {
        self.focus_metrics = Some(metrics);
        self.target_ratio = target_ratio;
        self
    }
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub scenario: Scenario,
    pub annotated: Vec<AnnotatedUtterance>,
}

/// Synthesizer and annotator sharing one metric catalog.
#[derive(Debug, Clone)]
pub struct Pipeline {
    synthesizer: ScenarioSynthesizer,
    annotator: MetricAnnotator,
}

impl Pipeline {
    pub fn new(synthesizer: ScenarioSynthesizer, annotator: MetricAnnotator) -> Self {
        Self {
            synthesizer,
            annotator,
        }
    }

    /// Wire both stages to OpenAI from settings.
    ///
    /// The catalog is loaded once here; a missing or malformed catalog is an
    /// error because annotation cannot run without it.
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        let catalog = Arc::new(MetricCatalog::load(&settings.extra_json_path)?);
        let scenario_llm = provider_for(settings, &settings.scenario_model);
        let annotation_llm = provider_for(settings, &settings.annotation_model);
        let synthesizer = ScenarioSynthesizer::new(
            Arc::new(scenario_llm),
            catalog.clone(),
            PersonaFormatter::new(settings.sanitize_mode),
        );
        let annotator = MetricAnnotator::new(Arc::new(annotation_llm), catalog)?;
        Ok(Self::new(synthesizer, annotator))
    }

    pub fn catalog(&self) -> &Arc<MetricCatalog> {
        self.synthesizer.catalog()
    }

    pub fn scenario_model(&self) -> &str {
        self.synthesizer.model()
    }

    pub fn annotation_model(&self) -> &str {
        self.annotator.model()
    }

    /// Run both stages sequentially.
    ///
    /// An empty scenario is reported as a malformed response.
    pub async fn run(&self, request: &GenerationRequest) -> Result<PipelineOutput, PipelineError> {
        log::info!(
            "Generating scenario: purpose={}, format={}",
            request.purpose,
            request.format
        );
        let scenario = self
            .synthesizer
            .synthesize(
                &request.personas,
                &request.purpose,
                &request.format,
                request.target_count,
                request.focus_metrics.as_deref(),
                request.target_ratio,
            )
            .await?;
        if scenario.is_empty() {
            return Err(PipelineError::malformed("the generated scenario contains no utterances", ""));
        }

        log::info!("Annotating {} utterances", scenario.len());
        let annotated = self
            .annotator
            .annotate_scenario(&scenario, &request.purpose, &request.format)
            .await?;

        for kind in request.focus_metrics.iter().flatten() {
            if let Some(share) = high_band_share(annotated.iter().map(|a| &a.metrics), *kind) {
                log::info!("High-band share for {}: {:.0}%", kind, share * 100.0);
            }
        }

        Ok(PipelineOutput { scenario, annotated })
    }
}

/// OpenAI provider for one stage's model, with the shared connection settings.
fn provider_for(settings: &Settings, model: &str) -> OpenAICompletion {
    let provider = OpenAICompletion::new(
        model,
        settings.openai_api_key.clone(),
        settings.openai_base_url.clone(),
    );
    match settings.request_timeout_secs {
        Some(secs) => provider.with_timeout(secs),
        None => provider,
    }
}
