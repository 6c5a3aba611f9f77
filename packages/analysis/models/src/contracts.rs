//! Wire contracts of the external collaborators.
//!
//! The pipeline core only talks to geocoding, intent extraction and
//! summarization through these request/response shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Statistics, UserIntent};

/// Geocoding request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeocodeQuery {
    /// Free-text address.
    pub query: String,
}

/// The single best geocoding match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeMatch {
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lon: f64,
    /// Canonical display name of the match.
    pub display_name: Option<String>,
}

/// Intent extraction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRequest {
    /// Profile label or free text.
    pub profile_text: String,
    /// Additional context (the location text).
    pub context_text: String,
    /// One line per catalog metric: `key: name - description`.
    pub metric_catalog_summary: String,
}

/// Intent extraction response, before catalog validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    /// Profile archetype.
    #[serde(default = "default_profile_type")]
    pub profile_type: String,
    /// Priorities.
    #[serde(default)]
    pub priorities: Vec<String>,
    /// Concerns.
    #[serde(default)]
    pub concerns: Vec<String>,
    /// Lifestyle description.
    #[serde(default = "default_lifestyle")]
    pub lifestyle: String,
    /// Metric keys the service selected (expected 5-8).
    #[serde(default)]
    pub selected_metric_keys: Vec<String>,
    /// Why the metrics were chosen.
    #[serde(default)]
    pub reasoning: Option<String>,
}

fn default_profile_type() -> String {
    "general".to_string()
}

fn default_lifestyle() -> String {
    "general".to_string()
}

impl IntentResponse {
    /// The intent portion of the response.
    #[must_use]
    pub fn intent(&self) -> UserIntent {
        UserIntent {
            profile_type: self.profile_type.clone(),
            priorities: self.priorities.clone(),
            concerns: self.concerns.clone(),
            lifestyle: self.lifestyle.clone(),
            reasoning: self.reasoning.clone(),
        }
    }
}

/// Summarization request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    /// Computed statistics for the selected metrics.
    pub statistics: Statistics,
    /// Point-of-interest count per category.
    pub poi_category_counts: BTreeMap<String, usize>,
    /// Resolved address, if known.
    pub address: Option<String>,
    /// Extracted intent.
    pub intent: Option<UserIntent>,
    /// Metric keys in selection order.
    pub selected_metric_keys: Vec<String>,
    /// Raw profile text, if one was supplied.
    pub profile_text: Option<String>,
}

/// Summarization response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    /// The narrative text.
    pub narrative_text: String,
}
