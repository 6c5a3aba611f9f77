//! Narrative summaries of a finished analysis.

use std::fmt::Write as _;
use std::sync::Arc;

use locality_lens_analysis_models::contracts::{SummaryRequest, SummaryResponse};

use crate::AiError;
use crate::providers::{LlmProvider, Message, StopReason};

const SYSTEM_PROMPT: &str =
    "You are an expert locality analyst. You write concise, data-driven summaries of places.";

/// Writes the narrative summary for an analysis.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarizes one analysis.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the backing service fails or returns no text.
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, AiError>;
}

/// [`Summarizer`] backed by a chat model.
pub struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
}

impl LlmSummarizer {
    /// Wraps a provider.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

fn build_prompt(request: &SummaryRequest) -> String {
    let mut prompt = String::from("Generate a concise, informative summary of this location.\n\n");

    let _ = writeln!(
        prompt,
        "Location: {}",
        request.address.as_deref().unwrap_or("Unknown")
    );
    if let Some(profile) = &request.profile_text {
        let _ = writeln!(prompt, "User profile: {profile}");
    }
    if let Some(intent) = &request.intent
        && !intent.priorities.is_empty()
    {
        let _ = writeln!(prompt, "Priorities: {}", intent.priorities.join(", "));
    }

    prompt.push_str("\nStatistics:\n");
    for key in &request.selected_metric_keys {
        match request.statistics.get(key) {
            Some(Some(value)) => {
                let _ = writeln!(prompt, "- {key}: {value}");
            }
            _ => {
                let _ = writeln!(prompt, "- {key}: not available");
            }
        }
    }

    prompt.push_str("\nPOI Data:\n");
    for (category, count) in &request.poi_category_counts {
        let _ = writeln!(prompt, "- {category}: {count}");
    }

    prompt.push_str(
        "\nGenerate a 2-3 paragraph summary highlighting:\n\
         1. Key amenities and facilities\n\
         2. Connectivity and transportation\n\
         3. Overall livability assessment\n\n\
         Be specific, data-driven, and helpful for someone considering this location.",
    );

    prompt
}

#[async_trait::async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, AiError> {
        let messages = [Message::user(build_prompt(request))];
        let response = self.provider.complete(SYSTEM_PROMPT, &messages).await?;

        if response.stop_reason == StopReason::MaxTokens {
            log::warn!("Summary hit the token limit and may be truncated");
        }

        let narrative_text = response.text.trim().to_string();
        if narrative_text.is_empty() {
            return Err(AiError::Parse {
                message: "empty summary".to_string(),
            });
        }

        Ok(SummaryResponse { narrative_text })
    }
}
