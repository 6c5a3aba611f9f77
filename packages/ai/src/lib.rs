#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! LLM-backed collaborators for locality analysis.
//!
//! [`intent`] turns a free-text profile into a user intent and a metric
//! selection, [`summary`] writes the narrative for a finished analysis.
//! Both run on top of the [`providers::LlmProvider`] abstraction, which
//! supports Anthropic Claude, `OpenAI`, Groq, and any `OpenAI`-compatible
//! local/self-hosted server (Ollama, vLLM, llama.cpp, LM Studio) via the
//! `AI_BASE_URL` environment variable.

pub mod intent;
pub mod providers;
pub mod summary;

use thiserror::Error;

pub use intent::{IntentExtractor, LlmIntentExtractor, parse_intent_response};
pub use summary::{LlmSummarizer, Summarizer};

/// Errors that can occur during AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request to LLM provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// The model answered, but not in the expected shape.
    #[error("Unusable model response: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}
