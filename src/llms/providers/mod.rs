//! Generative service providers.
//!
//! Each provider implements the [`BaseLLM`](crate::llms::base_llm::BaseLLM)
//! trait and handles authentication and request formatting for its API.
//!
//! | Provider | Module |
//! |----------|--------|
//! | OpenAI Chat Completions | [`openai`] |

pub mod openai;

pub use openai::OpenAICompletion;
