//! Generative service boundary.
//!
//! - [`base_llm`] - The trait both pipeline stages call through
//! - [`providers`] - Concrete providers (OpenAI Chat Completions)

pub mod base_llm;
pub mod providers;

pub use base_llm::{BaseLLM, ChatCompletion, ChatRequest, LLMError};
pub use providers::OpenAICompletion;
