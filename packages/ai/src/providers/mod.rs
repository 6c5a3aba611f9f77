//! LLM provider abstraction and implementations.
//!
//! Supports Anthropic Claude and any `OpenAI`-compatible chat completions
//! endpoint (`OpenAI`, Groq, Ollama, vLLM) via a common trait.

pub mod anthropic;
pub mod openai;

use serde::{Deserialize, Serialize};

use crate::AiError;

/// Groq's `OpenAI`-compatible endpoint.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller.
    User,
    /// The model.
    Assistant,
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling parameters shared by every request a provider sends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.6,
            max_tokens: 1024,
        }
    }
}

/// Response from the LLM provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    /// Concatenated text of the response.
    pub text: String,
    /// Why the model stopped generating.
    pub stop_reason: StopReason,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Model finished its response naturally.
    EndTurn,
    /// Maximum tokens reached.
    MaxTokens,
}

/// Trait for LLM providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends a text completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails or the provider rejects it.
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<LlmResponse, AiError>;
}

/// Provider selection, normally read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Explicit provider name (`AI_PROVIDER`).
    pub provider: Option<String>,
    /// `ANTHROPIC_API_KEY`.
    pub anthropic_api_key: Option<String>,
    /// `OPENAI_API_KEY`.
    pub openai_api_key: Option<String>,
    /// `GROQ_API_KEY`.
    pub groq_api_key: Option<String>,
    /// Model override (`AI_MODEL`).
    pub model: Option<String>,
    /// Endpoint override for `OpenAI`-compatible servers (`AI_BASE_URL`).
    pub base_url: Option<String>,
}

impl ProviderSettings {
    /// Reads the `AI_*` and provider key variables. Empty values count as
    /// unset.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            provider: var("AI_PROVIDER"),
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            openai_api_key: var("OPENAI_API_KEY"),
            groq_api_key: var("GROQ_API_KEY"),
            model: var("AI_MODEL"),
            base_url: var("AI_BASE_URL"),
        }
    }

    /// Auto-detects which provider to use based on available credentials.
    ///
    /// Checks Anthropic, then `OpenAI`, then Groq. A bare `AI_BASE_URL`
    /// selects a keyless `OpenAI`-compatible server.
    fn detect_provider(&self) -> Option<&'static str> {
        if self.anthropic_api_key.is_some() {
            log::info!("Auto-detected AI provider: Anthropic (ANTHROPIC_API_KEY found)");
            return Some("anthropic");
        }

        if self.openai_api_key.is_some() {
            log::info!("Auto-detected AI provider: OpenAI (OPENAI_API_KEY found)");
            return Some("openai");
        }

        if self.groq_api_key.is_some() {
            log::info!("Auto-detected AI provider: Groq (GROQ_API_KEY found)");
            return Some("groq");
        }

        if self.base_url.is_some() {
            log::info!("Auto-detected AI provider: OpenAI-compatible server (AI_BASE_URL set)");
            return Some("openai");
        }

        None
    }
}

/// Creates an LLM provider based on environment variables.
///
/// See [`create_provider`] for the selection rules.
///
/// # Errors
///
/// Returns [`AiError::Config`] if no credentials are found or the
/// explicitly requested provider is not configured.
pub fn create_provider_from_env(
    client: reqwest::Client,
) -> Result<Box<dyn LlmProvider>, AiError> {
    create_provider(&ProviderSettings::from_env(), client)
}

/// Creates an LLM provider from explicit settings.
///
/// If `provider` is set, uses that provider. Otherwise auto-detects from
/// available credentials:
///
/// 1. `ANTHROPIC_API_KEY` set -> Anthropic Claude
/// 2. `OPENAI_API_KEY` set -> `OpenAI`
/// 3. `GROQ_API_KEY` set -> Groq
/// 4. `AI_BASE_URL` set -> keyless `OpenAI`-compatible server
///
/// # Errors
///
/// Returns [`AiError::Config`] if no credentials are found or the
/// requested provider is missing its key.
pub fn create_provider(
    settings: &ProviderSettings,
    client: reqwest::Client,
) -> Result<Box<dyn LlmProvider>, AiError> {
    let provider = match settings.provider.as_deref() {
        Some(explicit) => explicit.to_lowercase(),
        None => settings
            .detect_provider()
            .ok_or_else(|| AiError::Config {
                message: "No AI credentials detected. Set one of: ANTHROPIC_API_KEY, \
                          OPENAI_API_KEY, GROQ_API_KEY, or AI_BASE_URL. You can also set \
                          AI_PROVIDER explicitly."
                    .to_string(),
            })?
            .to_string(),
    };

    match provider.as_str() {
        "anthropic" | "claude" => {
            let api_key = settings
                .anthropic_api_key
                .clone()
                .ok_or_else(|| AiError::Config {
                    message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
                })?;
            let model = settings
                .model
                .clone()
                .unwrap_or_else(|| anthropic::DEFAULT_MODEL.to_string());
            Ok(Box::new(anthropic::AnthropicProvider::new(
                client, api_key, model,
            )))
        }
        "openai" | "gpt" => {
            if settings.openai_api_key.is_none() && settings.base_url.is_none() {
                return Err(AiError::Config {
                    message: "OPENAI_API_KEY environment variable not set".to_string(),
                });
            }
            let model = settings
                .model
                .clone()
                .unwrap_or_else(|| openai::DEFAULT_MODEL.to_string());
            let base_url = settings
                .base_url
                .clone()
                .unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string());
            Ok(Box::new(openai::OpenAiProvider::new(
                client,
                settings.openai_api_key.clone(),
                model,
                base_url,
            )))
        }
        "groq" => {
            let api_key = settings.groq_api_key.clone().ok_or_else(|| AiError::Config {
                message: "GROQ_API_KEY environment variable not set".to_string(),
            })?;
            let model = settings
                .model
                .clone()
                .unwrap_or_else(|| openai::GROQ_DEFAULT_MODEL.to_string());
            let base_url = settings
                .base_url
                .clone()
                .unwrap_or_else(|| GROQ_BASE_URL.to_string());
            Ok(Box::new(openai::OpenAiProvider::new(
                client,
                Some(api_key),
                model,
                base_url,
            )))
        }
        other => Err(AiError::Config {
            message: format!("Unknown AI provider: {other}. Use 'anthropic', 'openai', or 'groq'."),
        }),
    }
}
