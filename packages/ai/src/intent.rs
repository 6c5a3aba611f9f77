//! Intent extraction: profile text in, user intent and metric keys out.

use std::sync::{Arc, LazyLock};

use locality_lens_analysis_models::contracts::{IntentRequest, IntentResponse};
use regex::Regex;
use serde::Deserialize;

use crate::AiError;
use crate::providers::{LlmProvider, Message};

static FENCE_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^```(?:json)?\s*").unwrap_or_else(|e| panic!("Invalid fence regex: {e}"))
});

static FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)```\s*$").unwrap_or_else(|e| panic!("Invalid fence regex: {e}"))
});

const SYSTEM_PROMPT: &str = "You are a location analysis expert. You read a user profile, \
     infer what matters to them when choosing where to live, and pick the locality \
     metrics that best answer their needs. You always answer with a single JSON object.";

/// Extracts a user intent and metric selection from a profile.
#[async_trait::async_trait]
pub trait IntentExtractor: Send + Sync {
    /// Runs one extraction.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the backing service fails or its answer
    /// cannot be interpreted.
    async fn extract(&self, request: &IntentRequest) -> Result<IntentResponse, AiError>;
}

/// [`IntentExtractor`] backed by a chat model.
pub struct LlmIntentExtractor {
    provider: Arc<dyn LlmProvider>,
}

impl LlmIntentExtractor {
    /// Wraps a provider.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

fn build_prompt(request: &IntentRequest) -> String {
    let context = if request.context_text.trim().is_empty() {
        "None"
    } else {
        request.context_text.trim()
    };

    format!(
        r#"Analyze the user profile and:
1. Extract their intent: profile type, priorities, concerns, and lifestyle.
2. Select 5-8 most relevant metrics from the catalog below.

USER PROFILE: {profile}
ADDITIONAL CONTEXT: {context}

AVAILABLE METRICS:
{catalog}

Return ONLY valid JSON in this format:
{{
  "user_intent": {{
    "profile_type": "bachelor|family|student|senior_citizen|working_professional|general",
    "priorities": ["..."],
    "concerns": ["..."],
    "lifestyle": "..."
  }},
  "selected_metrics": ["metric_key", "..."],
  "reasoning": "why these metrics fit the profile"
}}"#,
        profile = request.profile_text.trim(),
        catalog = request.metric_catalog_summary,
    )
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    user_intent: ReplyIntent,
    #[serde(default)]
    selected_metrics: Vec<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Default, Deserialize)]
struct ReplyIntent {
    #[serde(default)]
    profile_type: Option<String>,
    #[serde(default)]
    priorities: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    lifestyle: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Interprets a model answer as an [`IntentResponse`].
///
/// Markdown code fences are stripped and the outermost `{...}` is parsed,
/// so prose around the object is tolerated. Missing intent fields fall
/// back to `general`. Metric keys are returned as given; validating them
/// against the catalog is the caller's job.
///
/// # Errors
///
/// Returns [`AiError::Parse`] if no JSON object is present, or
/// [`AiError::Json`] if the object does not have the expected shape.
pub fn parse_intent_response(text: &str) -> Result<IntentResponse, AiError> {
    let unfenced = FENCE_OPEN.replace_all(text, "");
    let unfenced = FENCE_CLOSE.replace_all(&unfenced, "");

    let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) else {
        return Err(AiError::Parse {
            message: "no JSON object in intent response".to_string(),
        });
    };
    if end < start {
        return Err(AiError::Parse {
            message: "no JSON object in intent response".to_string(),
        });
    }

    let reply: Reply = serde_json::from_str(&unfenced[start..=end])?;

    Ok(IntentResponse {
        profile_type: non_blank(reply.user_intent.profile_type)
            .unwrap_or_else(|| "general".to_string()),
        priorities: reply.user_intent.priorities,
        concerns: reply.user_intent.concerns,
        lifestyle: non_blank(reply.user_intent.lifestyle).unwrap_or_else(|| "general".to_string()),
        selected_metric_keys: reply
            .selected_metrics
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
        reasoning: non_blank(reply.reasoning),
    })
}

#[async_trait::async_trait]
impl IntentExtractor for LlmIntentExtractor {
    async fn extract(&self, request: &IntentRequest) -> Result<IntentResponse, AiError> {
        let messages = [Message::user(build_prompt(request))];
        let response = self.provider.complete(SYSTEM_PROMPT, &messages).await?;
        log::debug!("Intent response: {} chars", response.text.len());
        parse_intent_response(&response.text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::providers::{LlmResponse, StopReason};

    const REPLY: &str = r#"{
        "user_intent": {
            "profile_type": "family",
            "priorities": ["schools", "parks"],
            "concerns": ["traffic"],
            "lifestyle": "suburban"
        },
        "selected_metrics": ["school_count", "park_count", " hospital_count "],
        "reasoning": "Kids need schools."
    }"#;

    #[test]
    fn plain_json_is_parsed() {
        let response = parse_intent_response(REPLY).unwrap();
        assert_eq!(response.profile_type, "family");
        assert_eq!(response.priorities, ["schools", "parks"]);
        assert_eq!(response.lifestyle, "suburban");
        assert_eq!(
            response.selected_metric_keys,
            ["school_count", "park_count", "hospital_count"]
        );
        assert_eq!(response.reasoning.as_deref(), Some("Kids need schools."));
    }

    #[test]
    fn fences_and_prose_are_ignored() {
        let text = format!("Here is the analysis:\n```json\n{REPLY}\n```\nHope this helps!");
        let response = parse_intent_response(&text).unwrap();
        assert_eq!(response.profile_type, "family");
        assert_eq!(response.selected_metric_keys.len(), 3);
    }

    #[test]
    fn missing_fields_default_to_general() {
        let response = parse_intent_response(r#"{"selected_metrics": ["cafe_count"]}"#).unwrap();
        assert_eq!(response.profile_type, "general");
        assert_eq!(response.lifestyle, "general");
        assert!(response.priorities.is_empty());
        assert_eq!(response.reasoning, None);
    }

    #[test]
    fn text_without_object_is_a_parse_error() {
        assert!(matches!(
            parse_intent_response("I cannot help with that."),
            Err(AiError::Parse { .. })
        ));
        assert!(matches!(
            parse_intent_response("} backwards {"),
            Err(AiError::Parse { .. })
        ));
    }

    #[test]
    fn malformed_object_is_a_json_error() {
        assert!(matches!(
            parse_intent_response(r#"{"selected_metrics": "school_count"}"#),
            Err(AiError::Json(_))
        ));
    }

    struct ScriptedProvider {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            _system_prompt: &str,
            messages: &[Message],
        ) -> Result<LlmResponse, AiError> {
            self.prompts
                .lock()
                .unwrap()
                .extend(messages.iter().map(|m| m.content.clone()));
            Ok(LlmResponse {
                text: self.reply.clone(),
                stop_reason: StopReason::EndTurn,
            })
        }
    }

    #[tokio::test]
    async fn extractor_sends_profile_and_catalog() {
        let provider = Arc::new(ScriptedProvider {
            reply: format!("```\n{REPLY}\n```"),
            prompts: Mutex::new(Vec::new()),
        });
        let extractor = LlmIntentExtractor::new(provider.clone());

        let request = IntentRequest {
            profile_text: "Family with Kids".to_string(),
            context_text: "Bandra West, Mumbai".to_string(),
            metric_catalog_summary: "school_count: School Count - Number of schools".to_string(),
        };
        let response = extractor.extract(&request).await.unwrap();
        assert_eq!(response.profile_type, "family");

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("USER PROFILE: Family with Kids"));
        assert!(prompts[0].contains("ADDITIONAL CONTEXT: Bandra West, Mumbai"));
        assert!(prompts[0].contains("school_count: School Count"));
    }
}
