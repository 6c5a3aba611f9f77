//! `OpenAI`-compatible chat completions provider.
//!
//! Also serves Groq and local servers (Ollama, vLLM, llama.cpp) through a
//! configurable base URL.

use serde::{Deserialize, Serialize};

use super::{GenerationSettings, LlmProvider, LlmResponse, Message, Role, StopReason};
use crate::AiError;

/// Base URL of the hosted `OpenAI` API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when `AI_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Model used for Groq when `AI_MODEL` is unset.
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// `OpenAI` API provider.
pub struct OpenAiProvider {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
    settings: GenerationSettings,
}

impl OpenAiProvider {
    /// Creates a new provider for the chat completions endpoint under
    /// `base_url`. Keyless servers take `None`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        model: String,
        base_url: String,
    ) -> Self {
        Self {
            api_key,
            model,
            base_url,
            client,
            settings: GenerationSettings::default(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

fn build_messages<'a>(system_prompt: &'a str, messages: &'a [Message]) -> Vec<OpenAiMessage<'a>> {
    let mut api_messages = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.is_empty() {
        api_messages.push(OpenAiMessage {
            role: "system",
            content: system_prompt,
        });
    }
    for msg in messages {
        api_messages.push(OpenAiMessage {
            role: match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &msg.content,
        });
    }
    api_messages
}

fn parse_response(body: &str) -> Result<LlmResponse, AiError> {
    let response: OpenAiResponse = serde_json::from_str(body)?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AiError::Provider {
            message: "No choices in OpenAI response".to_string(),
        })?;

    let stop_reason = match choice.finish_reason.as_deref() {
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    };

    Ok(LlmResponse {
        text: choice.message.content.unwrap_or_default(),
        stop_reason,
    })
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<LlmResponse, AiError> {
        let request = OpenAiRequest {
            model: &self.model,
            messages: build_messages(system_prompt, messages),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        log::debug!("Sending {} message(s) to {} at {}", messages.len(), self.model, self.base_url);

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }

        let resp = builder.json(&request).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err: OpenAiError = serde_json::from_str(&body).unwrap_or_else(|_| OpenAiError {
                error: OpenAiErrorDetail {
                    message: format!("HTTP {status}: {body}"),
                },
            });
            return Err(AiError::Provider {
                message: err.error.message,
            });
        }

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let provider = OpenAiProvider::new(
            reqwest::Client::new(),
            None,
            "llama3".to_string(),
            "http://localhost:11434/v1/".to_string(),
        );
        assert_eq!(provider.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn system_prompt_leads_the_messages() {
        let messages = [
            Message::user("q"),
            Message {
                role: Role::Assistant,
                content: "a".to_string(),
            },
        ];
        let built = build_messages("sys", &messages);
        let roles: Vec<_> = built.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["system", "user", "assistant"]);

        assert_eq!(build_messages("", &messages).len(), 2);
    }

    #[test]
    fn first_choice_text_is_returned() {
        let body = r#"{"choices": [
            {"message": {"content": "hi"}, "finish_reason": "stop"},
            {"message": {"content": "ignored"}, "finish_reason": "stop"}
        ]}"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.text, "hi");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn empty_choices_is_a_provider_error() {
        assert!(matches!(
            parse_response(r#"{"choices": []}"#),
            Err(AiError::Provider { .. })
        ));
    }

    #[test]
    fn length_finish_maps_to_max_tokens() {
        let body = r#"{"choices": [{"message": {"content": null}, "finish_reason": "length"}]}"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.text, "");
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
    }
}
