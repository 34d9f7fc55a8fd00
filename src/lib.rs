//! # well-scenario
//!
//! Synthetic meeting transcripts with per-utterance communication-risk
//! annotations.
//!
//! A two-stage pipeline drives an external language model: the
//! [`ScenarioSynthesizer`] writes a persona-conditioned meeting with a
//! controllable density of problem behavior, and the [`MetricAnnotator`]
//! scores every utterance on four metrics (coercion, deviation, invalidation,
//! bias) using a rolling window of prior utterances as context.

pub mod annotation;
pub mod llms;
pub mod metrics;
pub mod persona;
pub mod pipeline;
pub mod scenario;
pub mod server;
pub mod storage;
pub mod utilities;

#[cfg(test)]
pub(crate) mod testing;

pub use annotation::{AnnotatedUtterance, MetricAnnotator};
pub use llms::base_llm::BaseLLM;
pub use metrics::{Annotation, MetricCatalog, MetricKind};
pub use persona::{Persona, PersonaFormatter};
pub use pipeline::{GenerationRequest, Pipeline, PipelineOutput};
pub use scenario::{Scenario, ScenarioSynthesizer, Utterance};
pub use utilities::config::Settings;
pub use utilities::errors::{CatalogLoadError, PipelineError, StorageError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
