//! Drives one analysis through the workflow state machine.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use locality_lens_ai::{IntentExtractor, Summarizer};
use locality_lens_analysis_models::contracts::{IntentRequest, IntentResponse, SummaryRequest};
use locality_lens_analysis_models::{
    AnalysisRequest, AnalysisResult, CategoryBuckets, Coordinates, UserIntent,
};
use locality_lens_geocoder::{
    Geocoder, LocationResolver, Resolution, ResolutionSource, ResolveError,
};
use locality_lens_metrics::{
    MAX_SELECTION, MIN_SELECTION, MetricContext, MetricsEngine, catalog, profiles,
    select_with_dependencies,
};
use locality_lens_poi::{GeodataProvider, PoiError, PointOfInterestFetcher, build_buckets};
use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::delta::StageDelta;
use crate::state::WorkflowState;
use crate::summary::fallback_summary;

/// Terminal failures. Any of these moves the run to
/// [`WorkflowState::Error`].
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The request is empty or unusable.
    #[error("{message}")]
    Input {
        /// What is wrong with the request.
        message: String,
    },

    /// The location could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    /// The geodata provider failed.
    #[error("Failed to fetch POI data: {0}")]
    DataSource(#[from] PoiError),

    /// A stage tried a move the transition table does not allow.
    #[error("Invalid workflow transition {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: WorkflowState,
        /// Requested state.
        to: WorkflowState,
    },
}

/// Runs `future` under `budget`, mapping expiry through `on_timeout`.
async fn with_budget<T, E, F>(
    budget: Duration,
    future: F,
    on_timeout: impl FnOnce(u64) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    tokio::time::timeout(budget, future)
        .await
        .unwrap_or_else(|_| Err(on_timeout(budget.as_secs())))
}

/// State and draft result of a single run.
struct Run {
    id: String,
    state: WorkflowState,
    draft: AnalysisResult,
}

impl Run {
    fn new(request: &AnalysisRequest) -> Self {
        Self {
            id: request.id().to_string(),
            state: WorkflowState::Init,
            draft: AnalysisResult::default(),
        }
    }

    fn advance(&mut self, to: WorkflowState, note: &str) -> Result<(), AnalysisError> {
        if !self.state.can_transition(to) {
            return Err(AnalysisError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        let entry = if note.is_empty() {
            format!("{} -> {to}", self.state)
        } else {
            format!("{} -> {to}: {note}", self.state)
        };
        log::info!("[{}] {entry}", self.id);
        self.draft.audit_trail.push(entry);
        self.state = to;
        Ok(())
    }

    fn merge(&mut self, delta: StageDelta) {
        self.draft = delta.apply(std::mem::take(&mut self.draft));
    }

    /// Collapses the run into an error-only result.
    fn fail(mut self, error: &AnalysisError) -> AnalysisResult {
        log::error!("[{}] Analysis failed: {error}", self.id);

        // Init and the terminal states have no table edge to Error, but the
        // trail still records where the run stopped.
        if let Err(e) = self.advance(WorkflowState::Error, &error.to_string()) {
            log::debug!("[{}] {e}", self.id);
            self.draft
                .audit_trail
                .push(format!("{} -> {}: {error}", self.state, WorkflowState::Error));
        }

        AnalysisResult {
            errors: vec![error.to_string()],
            warnings: self.draft.warnings,
            audit_trail: self.draft.audit_trail,
            ..AnalysisResult::default()
        }
    }
}

/// The location branch's output.
struct Located {
    coordinates: Coordinates,
    delta: StageDelta,
}

/// Runs analyses against a fixed set of collaborators.
///
/// Each [`Analyzer::analyze`] call owns its own state; one analyzer can
/// serve concurrent requests.
pub struct Analyzer {
    geocoder: Arc<dyn Geocoder>,
    geodata: Arc<dyn GeodataProvider>,
    intent: Arc<dyn IntentExtractor>,
    summarizer: Arc<dyn Summarizer>,
    config: AnalysisConfig,
}

impl Analyzer {
    /// Creates an analyzer.
    #[must_use]
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        geodata: Arc<dyn GeodataProvider>,
        intent: Arc<dyn IntentExtractor>,
        summarizer: Arc<dyn Summarizer>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            geocoder,
            geodata,
            intent,
            summarizer,
            config,
        }
    }

    /// Runs one analysis to completion.
    ///
    /// Never fails: terminal errors are reported in
    /// [`AnalysisResult::errors`] with no statistics.
    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let mut run = Run::new(request);
        match self.drive(request, &mut run).await {
            Ok(()) => run.draft,
            Err(e) => run.fail(&e),
        }
    }

    async fn drive(&self, request: &AnalysisRequest, run: &mut Run) -> Result<(), AnalysisError> {
        run.advance(WorkflowState::ValidatingInput, "")?;
        let location = request.location().trim();
        if location.is_empty() {
            return Err(AnalysisError::Input {
                message: "User input is required".to_string(),
            });
        }
        let profile = request.profile();

        run.advance(WorkflowState::ParallelDispatch, "selecting metrics and resolving location")?;
        let (selection, located) = tokio::try_join!(
            async { Ok::<_, AnalysisError>(self.select_metrics(location, profile).await) },
            self.locate(location),
        )?;
        run.merge(selection.and(located.delta));

        run.advance(
            WorkflowState::FetchingPois,
            &format!("{} metrics selected", run.draft.selected_metric_keys.len()),
        )?;
        let buckets = self.fetch_pois(located.coordinates, &run.draft.selected_metric_keys).await?;
        run.merge(StageDelta {
            poi_category_counts: Some(buckets.counts()),
            ..StageDelta::default()
        });

        run.advance(
            WorkflowState::ComputingStatistics,
            &format!("{} features in {} categories", buckets.total(), buckets.len()),
        )?;
        let ctx = MetricContext {
            center: located.coordinates,
            search_radius_m: self.config.search_radius_m,
        };
        let outcome =
            MetricsEngine::new(catalog()).compute_all(&run.draft.selected_metric_keys, &buckets, &ctx);
        run.merge(StageDelta {
            computed_statistics: Some(outcome.statistics),
            warnings: outcome.warnings,
            ..StageDelta::default()
        });

        run.advance(WorkflowState::GeneratingSummary, "")?;
        let summary = self.summarize(&run.draft, profile).await;
        run.merge(summary);

        run.advance(WorkflowState::Done, "")?;
        Ok(())
    }

    /// Intent branch: picks the metric selection. Degrades to profile
    /// defaults instead of failing.
    async fn select_metrics(&self, location: &str, profile: Option<&str>) -> StageDelta {
        let Some(profile) = profile else {
            let general = profiles().general();
            log::debug!("No profile given, using {} defaults", general.label);
            return StageDelta {
                selected_metric_keys: Some(general.defaults.clone()),
                user_intent: Some(UserIntent::general(general.id.clone(), None)),
                ..StageDelta::default()
            };
        };

        let request = IntentRequest {
            profile_text: profile.to_string(),
            context_text: location.to_string(),
            metric_catalog_summary: catalog().summary(),
        };

        let extracted = tokio::time::timeout(
            self.config.timeouts.intent(),
            self.intent.extract(&request),
        )
        .await;

        let failure = match extracted {
            Ok(Ok(response)) => match validated_selection(&response) {
                Ok(keys) => {
                    log::info!("Intent extraction selected {} metrics", keys.len());
                    return StageDelta {
                        selected_metric_keys: Some(keys),
                        user_intent: Some(response.intent()),
                        ..StageDelta::default()
                    };
                }
                Err(reason) => reason,
            },
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "timed out after {}s",
                self.config.timeouts.intent().as_secs()
            ),
        };

        let archetype = profiles().archetype_for(profile);
        let warning = format!("Intent/metric selection failed: {failure}, used defaults");
        log::warn!("{warning}");

        StageDelta {
            selected_metric_keys: Some(profiles().bound_selection(archetype.defaults.clone())),
            user_intent: Some(UserIntent::general(
                archetype.id.clone(),
                Some(format!("Default metrics for {}", archetype.label)),
            )),
            warnings: vec![warning],
            ..StageDelta::default()
        }
    }

    /// Location branch: literal coordinates short-circuit the geocoder.
    async fn locate(&self, location: &str) -> Result<Located, AnalysisError> {
        let resolver = LocationResolver::new(self.geocoder.as_ref());
        let Resolution {
            coordinates,
            address,
            source,
        } = with_budget(
            self.config.timeouts.geocode(),
            resolver.resolve(location),
            |timeout_secs| ResolveError::TimedOut { timeout_secs },
        )
        .await?;

        if source == ResolutionSource::Literal {
            log::debug!("Location is a coordinate literal, geocoding skipped");
        }

        Ok(Located {
            coordinates,
            delta: StageDelta {
                coordinates: Some(coordinates),
                resolved_address: address,
                ..StageDelta::default()
            },
        })
    }

    async fn fetch_pois(
        &self,
        center: Coordinates,
        selected: &[String],
    ) -> Result<CategoryBuckets, AnalysisError> {
        let catalog = catalog();
        let filters = catalog.tag_filters(&select_with_dependencies(catalog, selected));

        let fetcher = PointOfInterestFetcher::new(self.geodata.as_ref());
        let features = with_budget(
            self.config.timeouts.poi_fetch(),
            fetcher.fetch(center, self.config.search_radius_m, &filters),
            |timeout_secs| PoiError::TimedOut { timeout_secs },
        )
        .await?;

        Ok(build_buckets(features, self.config.dedupe_distance_m))
    }

    /// Narrative summary, falling back to the template on any failure.
    async fn summarize(&self, draft: &AnalysisResult, profile: Option<&str>) -> StageDelta {
        let request = SummaryRequest {
            statistics: draft.computed_statistics.clone(),
            poi_category_counts: draft.poi_category_counts.clone(),
            address: draft.resolved_address.clone(),
            intent: draft.user_intent.clone(),
            selected_metric_keys: draft.selected_metric_keys.clone(),
            profile_text: profile.map(ToString::to_string),
        };

        let summarized = tokio::time::timeout(
            self.config.timeouts.summary(),
            self.summarizer.summarize(&request),
        )
        .await;

        let failure = match summarized {
            Ok(Ok(response)) => {
                return StageDelta {
                    narrative_summary: Some(response.narrative_text),
                    ..StageDelta::default()
                };
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "timed out after {}s",
                self.config.timeouts.summary().as_secs()
            ),
        };

        let warning = format!("Could not generate summary: {failure}");
        log::warn!("{warning}");

        StageDelta {
            narrative_summary: Some(fallback_summary(
                &request.statistics,
                &request.selected_metric_keys,
                &request.poi_category_counts,
                request.intent.as_ref(),
            )),
            warnings: vec![warning],
            ..StageDelta::default()
        }
    }
}

/// Keeps catalog keys only, deduplicated and capped, and insists on at
/// least [`MIN_SELECTION`] of them.
fn validated_selection(response: &IntentResponse) -> Result<Vec<String>, String> {
    let catalog = catalog();
    let mut seen = BTreeSet::new();
    let keys: Vec<String> = response
        .selected_metric_keys
        .iter()
        .filter(|key| catalog.contains(key))
        .filter(|key| seen.insert(key.as_str()))
        .take(MAX_SELECTION)
        .cloned()
        .collect();

    log::debug!(
        "Kept {} of {} metric keys from intent response",
        keys.len(),
        response.selected_metric_keys.len()
    );

    if keys.len() < MIN_SELECTION {
        return Err(format!(
            "only {} valid metric keys returned, need at least {MIN_SELECTION}",
            keys.len()
        ));
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use locality_lens_ai::AiError;
    use locality_lens_analysis_models::contracts::{GeocodeMatch, GeocodeQuery, SummaryResponse};
    use locality_lens_analysis_models::{RawFeature, TagFilterSet};
    use locality_lens_geocoder::GeocodeError;

    use super::*;

    struct FakeGeocoder {
        answer: Option<GeocodeMatch>,
        calls: AtomicUsize,
    }

    impl FakeGeocoder {
        fn answering(answer: Option<GeocodeMatch>) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(
            &self,
            _query: &GeocodeQuery,
        ) -> Result<Option<GeocodeMatch>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    struct FakeGeodata {
        features: Vec<RawFeature>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeGeodata {
        fn returning(features: Vec<RawFeature>) -> Self {
            Self {
                features,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl GeodataProvider for FakeGeodata {
        async fn fetch(
            &self,
            _center: Coordinates,
            _radius_m: f64,
            _filters: &TagFilterSet,
        ) -> Result<Vec<RawFeature>, PoiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PoiError::Status { status: 504 });
            }
            Ok(self.features.clone())
        }
    }

    enum IntentBehavior {
        Answer(IntentResponse),
        Fail,
        Hang,
    }

    struct FakeIntent {
        behavior: IntentBehavior,
        calls: AtomicUsize,
    }

    impl FakeIntent {
        fn new(behavior: IntentBehavior) -> Self {
            Self {
                behavior,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl IntentExtractor for FakeIntent {
        async fn extract(&self, _request: &IntentRequest) -> Result<IntentResponse, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                IntentBehavior::Answer(response) => Ok(response.clone()),
                IntentBehavior::Fail => Err(AiError::Provider {
                    message: "service unavailable".to_string(),
                }),
                IntentBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("the intent budget expires first")
                }
            }
        }
    }

    struct FakeSummarizer {
        fail: bool,
        requests: Mutex<Vec<SummaryRequest>>,
    }

    impl FakeSummarizer {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Summarizer for FakeSummarizer {
        async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, AiError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(AiError::Parse {
                    message: "empty summary".to_string(),
                });
            }
            Ok(SummaryResponse {
                narrative_text: "A well connected neighbourhood.".to_string(),
            })
        }
    }

    struct Fixture {
        geocoder: Arc<FakeGeocoder>,
        geodata: Arc<FakeGeodata>,
        intent: Arc<FakeIntent>,
        summarizer: Arc<FakeSummarizer>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                geocoder: Arc::new(FakeGeocoder::answering(Some(GeocodeMatch {
                    lat: 19.0596,
                    lon: 72.8295,
                    display_name: Some("Bandra West, Mumbai, India".to_string()),
                }))),
                geodata: Arc::new(FakeGeodata::returning(Vec::new())),
                intent: Arc::new(FakeIntent::new(IntentBehavior::Fail)),
                summarizer: Arc::new(FakeSummarizer::new(false)),
            }
        }

        fn analyzer(&self) -> Analyzer {
            Analyzer::new(
                self.geocoder.clone(),
                self.geodata.clone(),
                self.intent.clone(),
                self.summarizer.clone(),
                AnalysisConfig::default(),
            )
        }
    }

    fn feature(id: &str, tags: &[(&str, &str)], lat: f64, lon: f64) -> RawFeature {
        RawFeature {
            id: id.to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            geometry: Some(geo::Geometry::Point(geo::Point::new(lon, lat))),
        }
    }

    fn general_defaults() -> Vec<String> {
        profiles().general().defaults.clone()
    }

    #[tokio::test]
    async fn scenario_a_literal_coordinates_without_profile() {
        let fixture = Fixture::new();
        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("12.9784,77.6408", None))
            .await;

        assert_eq!(result.errors, Vec::<String>::new());
        let coordinates = result.coordinates.unwrap();
        assert!((coordinates.latitude() - 12.9784).abs() < 1e-9);
        assert!((coordinates.longitude() - 77.6408).abs() < 1e-9);
        assert_eq!(result.resolved_address, None);
        assert_eq!(fixture.geocoder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.intent.calls.load(Ordering::SeqCst), 0);

        assert_eq!(result.selected_metric_keys.len(), 7);
        assert_eq!(result.selected_metric_keys, general_defaults());
        assert_eq!(result.user_intent.unwrap().profile_type, "general");
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(
            result.narrative_summary.as_deref(),
            Some("A well connected neighbourhood.")
        );
    }

    #[tokio::test]
    async fn scenario_b_empty_input_stops_immediately() {
        let fixture = Fixture::new();
        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("   ", Some("Student".to_string())))
            .await;

        assert_eq!(result.errors, ["User input is required"]);
        assert!(result.computed_statistics.is_empty());
        assert!(result.selected_metric_keys.is_empty());
        assert!(result.narrative_summary.is_none());
        assert_eq!(fixture.intent.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.geocoder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.geodata.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            result.audit_trail,
            [
                "Init -> ValidatingInput",
                "ValidatingInput -> Error: User input is required",
            ]
        );
    }

    #[tokio::test]
    async fn scenario_c_no_features_gives_zero_counts() {
        let fixture = Fixture::new();
        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("Bandra West, Mumbai", None))
            .await;

        assert!(result.is_success(), "{:?}", result.errors);
        assert_eq!(
            result.resolved_address.as_deref(),
            Some("Bandra West, Mumbai, India")
        );
        assert_eq!(fixture.geocoder.calls.load(Ordering::SeqCst), 1);
        assert!(result.poi_category_counts.is_empty());

        let stats = &result.computed_statistics;
        assert_eq!(stats.len(), 7);
        for key in ["school_count", "hospital_count", "metro_station_count", "bus_stop_count"] {
            assert_eq!(stats[key], Some(0.0), "{key}");
        }
        assert_eq!(stats["poi_density"], Some(0.0));
    }

    #[tokio::test]
    async fn scenario_d_intent_failure_uses_keyword_fallback() {
        let fixture = Fixture::new();
        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new(
                "12.9784,77.6408",
                Some("Retired senior who loves gardening".to_string()),
            ))
            .await;

        assert!(result.is_success(), "{:?}", result.errors);
        assert_eq!(fixture.intent.calls.load(Ordering::SeqCst), 1);

        let senior = profiles().get("senior_citizen").unwrap();
        assert_eq!(result.user_intent.unwrap().profile_type, "senior_citizen");
        assert_eq!(result.selected_metric_keys, senior.defaults);

        let fallback_warnings: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| w.starts_with("Intent/metric selection failed"))
            .collect();
        assert_eq!(fallback_warnings.len(), 1);
        assert!(fallback_warnings[0].contains("service unavailable"));
        assert_eq!(result.audit_trail.last().unwrap(), "GeneratingSummary -> Done");
    }

    #[tokio::test]
    async fn intent_failure_resolves_fixed_labels_first() {
        let fixture = Fixture::new();
        for (label, id) in [
            ("Bachelor/Young Professional", "bachelor"),
            ("working_professional", "working_professional"),
            ("Custom", "general"),
        ] {
            let result = fixture
                .analyzer()
                .analyze(&AnalysisRequest::new("12.9784,77.6408", Some(label.to_string())))
                .await;

            assert!(result.is_success(), "{:?}", result.errors);
            assert_eq!(result.user_intent.unwrap().profile_type, id, "{label}");
            assert_eq!(
                result.selected_metric_keys,
                profiles().bound_selection(profiles().get(id).unwrap().defaults.clone()),
                "{label}"
            );
        }
    }

    #[tokio::test]
    async fn valid_intent_selection_is_used_and_truncated() {
        let mut fixture = Fixture::new();
        let keys: Vec<String> = catalog()
            .iter()
            .filter(|m| !m.is_composite())
            .map(|m| m.key.clone())
            .take(10)
            .collect();
        let mut selected = vec!["not_a_metric".to_string()];
        selected.extend(keys.iter().cloned());
        fixture.intent = Arc::new(FakeIntent::new(IntentBehavior::Answer(IntentResponse {
            profile_type: "student".to_string(),
            priorities: vec!["libraries".to_string()],
            concerns: Vec::new(),
            lifestyle: "urban".to_string(),
            selected_metric_keys: selected,
            reasoning: Some("Study spots".to_string()),
        })));

        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("12.9784,77.6408", Some("student".to_string())))
            .await;

        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(result.selected_metric_keys, keys[..MAX_SELECTION]);
        assert_eq!(result.computed_statistics.len(), MAX_SELECTION);
        let intent = result.user_intent.unwrap();
        assert_eq!(intent.profile_type, "student");
        assert_eq!(intent.reasoning.as_deref(), Some("Study spots"));
    }

    #[tokio::test]
    async fn too_few_valid_keys_counts_as_failure() {
        let mut fixture = Fixture::new();
        fixture.intent = Arc::new(FakeIntent::new(IntentBehavior::Answer(IntentResponse {
            profile_type: "family".to_string(),
            priorities: Vec::new(),
            concerns: Vec::new(),
            lifestyle: "general".to_string(),
            selected_metric_keys: vec!["school_count".to_string(), "made_up".to_string()],
            reasoning: None,
        })));

        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("12.9784,77.6408", Some("Family with Kids".to_string())))
            .await;

        assert_eq!(result.user_intent.unwrap().profile_type, "family");
        assert_eq!(
            result.selected_metric_keys,
            profiles().get("family").unwrap().defaults
        );
        assert!(result.warnings.iter().any(|w| w.contains("only 1 valid metric keys")));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_intent_service_times_out_into_fallback() {
        let mut fixture = Fixture::new();
        fixture.intent = Arc::new(FakeIntent::new(IntentBehavior::Hang));

        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("12.9784,77.6408", Some("Student".to_string())))
            .await;

        assert!(result.is_success());
        assert_eq!(
            result.selected_metric_keys,
            profiles().get("student").unwrap().defaults
        );
        assert!(result.warnings.iter().any(|w| w.contains("timed out after 30s")));
    }

    #[tokio::test]
    async fn geocoding_miss_is_terminal() {
        let mut fixture = Fixture::new();
        fixture.geocoder = Arc::new(FakeGeocoder::answering(None));

        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("Atlantis", None))
            .await;

        assert_eq!(result.errors, ["Could not geocode location: Atlantis"]);
        assert!(result.selected_metric_keys.is_empty());
        assert!(result.computed_statistics.is_empty());
        assert_eq!(fixture.geodata.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            result.audit_trail.last().unwrap(),
            "ParallelDispatch -> Error: Could not geocode location: Atlantis"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn first_error_wins_over_a_slower_branch() {
        let mut fixture = Fixture::new();
        fixture.geocoder = Arc::new(FakeGeocoder::answering(None));
        fixture.intent = Arc::new(FakeIntent::new(IntentBehavior::Hang));

        let started = tokio::time::Instant::now();
        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("Atlantis", Some("Student".to_string())))
            .await;

        assert_eq!(result.errors, ["Could not geocode location: Atlantis"]);
        assert!(started.elapsed() < AnalysisConfig::default().timeouts.intent());
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn geodata_failure_is_terminal() {
        let mut fixture = Fixture::new();
        fixture.geodata = Arc::new(FakeGeodata {
            features: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        });

        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("12.9784,77.6408", None))
            .await;

        assert_eq!(
            result.errors,
            ["Failed to fetch POI data: Geodata provider returned status 504"]
        );
        assert!(result.computed_statistics.is_empty());
        assert!(result.narrative_summary.is_none());
        assert!(fixture.summarizer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_failure_falls_back_to_template() {
        let mut fixture = Fixture::new();
        fixture.summarizer = Arc::new(FakeSummarizer::new(true));
        fixture.geodata = Arc::new(FakeGeodata::returning(vec![
            feature("node/1", &[("amenity", "school"), ("name", "St Xavier")], 12.978, 77.640),
            feature("node/2", &[("amenity", "school"), ("name", "st xavier")], 12.9781, 77.6401),
            feature("node/3", &[("amenity", "hospital")], 12.979, 77.641),
        ]));

        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("12.9784,77.6408", None))
            .await;

        assert!(result.is_success());
        assert_eq!(result.poi_category_counts["school"], 1);
        assert_eq!(result.computed_statistics["school_count"], Some(1.0));
        assert_eq!(result.computed_statistics["hospital_count"], Some(1.0));

        let summary = result.narrative_summary.unwrap();
        assert!(summary.starts_with("Locality Analysis Summary"));
        assert!(summary.contains("- School: 1"));
        assert_eq!(
            result.warnings,
            ["Could not generate summary: Unusable model response: empty summary"]
        );
    }

    #[tokio::test]
    async fn summary_request_carries_the_draft() {
        let fixture = Fixture::new();
        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("Bandra West", Some("Bachelor".to_string())))
            .await;

        let requests = fixture.summarizer.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.address, result.resolved_address);
        assert_eq!(request.selected_metric_keys, result.selected_metric_keys);
        assert_eq!(request.statistics, result.computed_statistics);
        assert_eq!(request.profile_text.as_deref(), Some("Bachelor"));
    }

    #[tokio::test]
    async fn every_transition_is_audited_in_order() {
        let fixture = Fixture::new();
        let result = fixture
            .analyzer()
            .analyze(&AnalysisRequest::new("12.9784,77.6408", None))
            .await;

        let states: Vec<&str> = result
            .audit_trail
            .iter()
            .map(|entry| entry.split(':').next().unwrap())
            .collect();
        assert_eq!(
            states,
            [
                "Init -> ValidatingInput",
                "ValidatingInput -> ParallelDispatch",
                "ParallelDispatch -> FetchingPois",
                "FetchingPois -> ComputingStatistics",
                "ComputingStatistics -> GeneratingSummary",
                "GeneratingSummary -> Done",
            ]
        );
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut run = Run::new(&AnalysisRequest::new("x", None));
        let err = run.advance(WorkflowState::Done, "").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidTransition { .. }));
        assert!(run.draft.audit_trail.is_empty());
    }

    #[test]
    fn fail_records_the_stop_with_or_without_a_table_edge() {
        let error = AnalysisError::Input {
            message: "User input is required".to_string(),
        };

        let mut run = Run::new(&AnalysisRequest::new("x", None));
        run.advance(WorkflowState::ValidatingInput, "").unwrap();
        let result = run.fail(&error);
        assert_eq!(
            result.audit_trail.last().unwrap(),
            "ValidatingInput -> Error: User input is required"
        );
        assert_eq!(result.errors, ["User input is required"]);

        let result = Run::new(&AnalysisRequest::new("x", None)).fail(&error);
        assert_eq!(result.audit_trail, ["Init -> Error: User input is required"]);
    }
}
