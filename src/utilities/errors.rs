//! Error types for the scenario pipeline.
//!
//! The four pipeline failure kinds (refusal, empty response, malformed
//! response, catalog load) propagate uncaught through the synthesizer and the
//! annotator; callers decide how to surface them.

use thiserror::Error;

use crate::llms::base_llm::LLMError;

/// Maximum number of characters of raw model output carried in an error.
pub const EXCERPT_LIMIT: usize = 200;

/// Errors raised while loading the metric definitions resource.
#[derive(Debug, Error)]
pub enum CatalogLoadError {
    /// The definitions file does not exist.
    #[error("Metric definitions not found: {path}")]
    Missing { path: String },

    /// The definitions file exists but could not be read.
    #[error("Metric definitions could not be read from {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The definitions resource is not a mapping of the four known metrics.
    #[error("Metric definitions in {path} are malformed: {message}")]
    Malformed { path: String, message: String },

    /// A catalog without definitions was handed to a component that needs them.
    #[error("Metric catalog is empty; annotation requires metric definitions")]
    Empty,
}

/// Errors raised by the two pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The model declined the request. Carries the refusal text verbatim.
    #[error("The model refused the request: {refusal}")]
    GenerationRefused { refusal: String },

    /// No content and no refusal came back.
    #[error("The model returned an empty response. Check the API key and model name.")]
    EmptyResponse,

    /// Content was returned but is not the expected JSON shape.
    #[error("Could not parse the model response: {message}\nResponse content: {excerpt}")]
    MalformedResponse { message: String, excerpt: String },

    /// The metric catalog could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogLoadError),

    /// The call to the generative service itself failed.
    #[error("Generative service call failed: {0}")]
    Transport(#[from] LLMError),
}

impl PipelineError {
    /// Build a `MalformedResponse` from a message and the raw content.
    pub fn malformed(message: impl Into<String>, content: &str) -> Self {
        Self::MalformedResponse {
            message: message.into(),
            excerpt: excerpt(content),
        }
    }
}

/// Errors from the on-disk profile and output stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested file does not exist.
    #[error("File not found: {name}")]
    NotFound { name: String },

    /// The filename would escape the store directory.
    #[error("Invalid filename: {name}")]
    InvalidName { name: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Truncate raw content to at most [`EXCERPT_LIMIT`] characters.
pub fn excerpt(content: &str) -> String {
    content.chars().take(EXCERPT_LIMIT).collect()
}
