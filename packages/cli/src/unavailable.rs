//! Stand-in collaborators used when no LLM provider is configured.

use locality_lens_ai::{AiError, IntentExtractor, Summarizer};
use locality_lens_analysis_models::contracts::{
    IntentRequest, IntentResponse, SummaryRequest, SummaryResponse,
};

/// Fails every call with the configuration error, so the workflow takes
/// its deterministic fallbacks.
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    pub const fn new(reason: String) -> Self {
        Self { reason }
    }

    fn error(&self) -> AiError {
        AiError::Config {
            message: self.reason.clone(),
        }
    }
}

#[async_trait::async_trait]
impl IntentExtractor for Unavailable {
    async fn extract(&self, _request: &IntentRequest) -> Result<IntentResponse, AiError> {
        Err(self.error())
    }
}

#[async_trait::async_trait]
impl Summarizer for Unavailable {
    async fn summarize(&self, _request: &SummaryRequest) -> Result<SummaryResponse, AiError> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[tokio::test]
    async fn every_call_reports_the_reason() {
        let unavailable = Unavailable::new("No AI credentials detected".to_string());

        let intent = unavailable
            .extract(&IntentRequest {
                profile_text: "Student".to_string(),
                context_text: String::new(),
                metric_catalog_summary: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(
            intent.to_string(),
            "Configuration error: No AI credentials detected"
        );

        let summary = unavailable
            .summarize(&SummaryRequest {
                statistics: BTreeMap::new(),
                poi_category_counts: BTreeMap::new(),
                address: None,
                intent: None,
                selected_metric_keys: Vec::new(),
                profile_text: None,
            })
            .await;
        assert!(matches!(summary, Err(AiError::Config { .. })));
    }
}
