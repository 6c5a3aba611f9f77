//! Per-stage result deltas.

use std::collections::BTreeMap;

use locality_lens_analysis_models::{AnalysisResult, Coordinates, Statistics, UserIntent};

/// What one stage contributes to the result. `None` fields leave the
/// draft untouched; warnings are appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageDelta {
    /// Resolved coordinates.
    pub coordinates: Option<Coordinates>,
    /// Geocoder address.
    pub resolved_address: Option<String>,
    /// Selected metric keys.
    pub selected_metric_keys: Option<Vec<String>>,
    /// Extracted or fallback intent.
    pub user_intent: Option<UserIntent>,
    /// Per-category counts after deduplication.
    pub poi_category_counts: Option<BTreeMap<String, usize>>,
    /// Computed statistics.
    pub computed_statistics: Option<Statistics>,
    /// Narrative summary.
    pub narrative_summary: Option<String>,
    /// Non-fatal warnings raised by the stage.
    pub warnings: Vec<String>,
}

impl StageDelta {
    /// Combines two deltas; `other` wins on conflicting fields.
    #[must_use]
    pub fn and(mut self, other: Self) -> Self {
        self.coordinates = other.coordinates.or(self.coordinates);
        self.resolved_address = other.resolved_address.or(self.resolved_address);
        self.selected_metric_keys = other.selected_metric_keys.or(self.selected_metric_keys);
        self.user_intent = other.user_intent.or(self.user_intent);
        self.poi_category_counts = other.poi_category_counts.or(self.poi_category_counts);
        self.computed_statistics = other.computed_statistics.or(self.computed_statistics);
        self.narrative_summary = other.narrative_summary.or(self.narrative_summary);
        self.warnings.extend(other.warnings);
        self
    }

    /// Merges the delta into a draft result, returning the new draft.
    #[must_use]
    pub fn apply(self, draft: AnalysisResult) -> AnalysisResult {
        let mut warnings = draft.warnings;
        warnings.extend(self.warnings);

        AnalysisResult {
            coordinates: self.coordinates.or(draft.coordinates),
            resolved_address: self.resolved_address.or(draft.resolved_address),
            poi_category_counts: self.poi_category_counts.unwrap_or(draft.poi_category_counts),
            computed_statistics: self.computed_statistics.unwrap_or(draft.computed_statistics),
            selected_metric_keys: self
                .selected_metric_keys
                .unwrap_or(draft.selected_metric_keys),
            user_intent: self.user_intent.or(draft.user_intent),
            narrative_summary: self.narrative_summary.or(draft.narrative_summary),
            errors: draft.errors,
            warnings,
            audit_trail: draft.audit_trail,
        }
    }
}
