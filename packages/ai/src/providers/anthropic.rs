//! Anthropic Claude provider implementation.

use serde::{Deserialize, Serialize};

use super::{GenerationSettings, LlmProvider, LlmResponse, Message, StopReason};
use crate::AiError;

/// Model used when `AI_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic Claude API provider.
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
    settings: GenerationSettings,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider sending through `client`.
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client,
            settings: GenerationSettings::default(),
        }
    }
}

/// Anthropic API request body.
#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: &'a [Message],
}

/// Anthropic API response body.
#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Anthropic API error response.
#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

fn parse_response(body: &str) -> Result<LlmResponse, AiError> {
    let response: AnthropicResponse = serde_json::from_str(body)?;

    let text = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            AnthropicContentBlock::Text { text } => Some(text),
            AnthropicContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    let stop_reason = match response.stop_reason.as_deref() {
        Some("max_tokens") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    };

    Ok(LlmResponse { text, stop_reason })
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<LlmResponse, AiError> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system: system_prompt,
            messages,
        };

        log::debug!("Sending {} message(s) to Anthropic model {}", messages.len(), self.model);

        let resp = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err: AnthropicError =
                serde_json::from_str(&body).unwrap_or_else(|_| AnthropicError {
                    error: AnthropicErrorDetail {
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
    fn text_blocks_are_joined() {
        let body = r#"{
            "content": [
                {"type": "text", "text": "first"},
                {"type": "tool_use", "id": "t", "name": "n", "input": {}},
                {"type": "text", "text": "second"}
            ],
            "stop_reason": "end_turn"
        }"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.text, "first\nsecond");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn max_tokens_stop_is_reported() {
        let body = r#"{"content": [{"type": "text", "text": "cut"}], "stop_reason": "max_tokens"}"#;
        assert_eq!(
            parse_response(body).unwrap().stop_reason,
            StopReason::MaxTokens
        );
    }

    #[test]
    fn request_serializes_plain_messages() {
        let messages = [Message::user("hello")];
        let request = AnthropicRequest {
            model: DEFAULT_MODEL,
            max_tokens: 1024,
            temperature: 0.5,
            system: "be brief",
            messages: &messages,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["system"], "be brief");
    }
}
