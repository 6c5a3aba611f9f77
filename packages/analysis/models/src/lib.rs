#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data model for the locality analysis pipeline.
//!
//! Defines the request/result types that flow through the workflow, the
//! geographic feature model (raw features, classified points of interest,
//! category buckets), the tag selectors that connect the metric catalog to
//! the geodata query, and the wire contracts of the external collaborators.

pub mod contracts;
pub mod geometry;
pub mod tags;

use std::collections::BTreeMap;

use geo::{Centroid, Geometry, Point};
use serde::Serialize;

pub use tags::{TagFamily, TagFilterSet, TagQualifier, TagSelector, TagValues};

/// A validated WGS84 coordinate pair.
///
/// Only constructible through [`Coordinates::new`], which enforces
/// `latitude ∈ [-90, 90]` and `longitude ∈ [-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    /// Creates a coordinate pair, rejecting out-of-range or non-finite values.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinatesError`] if either component is outside its
    /// valid range (NaN never is).
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinatesError> {
        if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(InvalidCoordinatesError {
                latitude,
                longitude,
            })
        }
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Returns the pair as a `geo` point (x = longitude, y = latitude).
    #[must_use]
    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Error returned when a latitude/longitude pair is out of range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCoordinatesError {
    /// The rejected latitude.
    pub latitude: f64,
    /// The rejected longitude.
    pub longitude: f64,
}

impl std::fmt::Display for InvalidCoordinatesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid coordinates ({}, {}): expected lat in [-90, 90] and lon in [-180, 180]",
            self.latitude, self.longitude
        )
    }
}

impl std::error::Error for InvalidCoordinatesError {}

/// One analysis request. Immutable once created.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    id: uuid::Uuid,
    location: String,
    profile: Option<String>,
}

impl AnalysisRequest {
    /// Creates a request. A blank profile is treated as no profile.
    #[must_use]
    pub fn new(location: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            location: location.into(),
            profile: profile
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        }
    }

    /// Unique id used to correlate log lines for this request.
    #[must_use]
    pub const fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// The raw location text (address or `lat,lon` literal).
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The profile label or free text, if one was supplied.
    #[must_use]
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }
}

/// A raw geographic feature as returned by the geodata provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// Provider identity, e.g. `node/123` or `way/456`.
    pub id: String,
    /// Raw OSM tags.
    pub tags: BTreeMap<String, String>,
    /// Geometry, when the provider returned one.
    pub geometry: Option<Geometry<f64>>,
}

impl RawFeature {
    /// Returns a tag value if present and non-empty.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// The category assigned to a feature by classification.
///
/// Displays as the bare tag value (e.g. `restaurant`), the way categories
/// are reported to users.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoiCategory {
    /// The tag family that matched first.
    pub family: TagFamily,
    /// The tag value of that family.
    pub value: String,
}

impl std::fmt::Display for PoiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// A classified point of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct PointOfInterest {
    /// Provider identity.
    pub id: String,
    /// The single category this feature belongs to.
    pub category: PoiCategory,
    /// Display name, if the feature has a non-empty `name` tag.
    pub name: Option<String>,
    /// Feature geometry.
    pub geometry: Option<Geometry<f64>>,
    /// Raw tag set.
    pub tags: BTreeMap<String, String>,
}

impl PointOfInterest {
    /// Builds a point of interest from a raw feature and its category.
    #[must_use]
    pub fn from_raw(feature: RawFeature, category: PoiCategory) -> Self {
        let name = feature.tag("name").map(str::to_string);
        Self {
            id: feature.id,
            category,
            name,
            geometry: feature.geometry,
            tags: feature.tags,
        }
    }

    /// Centroid of the geometry, if it has one.
    #[must_use]
    pub fn centroid(&self) -> Option<Point<f64>> {
        self.geometry.as_ref().and_then(Centroid::centroid)
    }
}

/// All classified points of interest sharing one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryBucket {
    /// The bucket's category.
    pub category: PoiCategory,
    /// Members in insertion order.
    pub pois: Vec<PointOfInterest>,
    /// Sum of measured polygon areas of members, in km².
    pub measured_area_km2: f64,
    /// Number of members whose geometry carries no area (points, lines).
    pub unmeasured_count: usize,
    /// Total length of line geometry in the category, in km.
    ///
    /// Measured before deduplication when built from raw features, since
    /// consecutive ways of one road share a name and sit close together.
    pub line_length_km: f64,
}

impl CategoryBucket {
    /// Creates a bucket and derives its area figures from member geometry.
    #[must_use]
    pub fn new(category: PoiCategory, pois: Vec<PointOfInterest>) -> Self {
        let mut measured_area_km2 = 0.0;
        let mut unmeasured_count = 0;

        for poi in &pois {
            match poi.geometry.as_ref().and_then(geometry::polygon_area_km2) {
                Some(area) => measured_area_km2 += area,
                None => unmeasured_count += 1,
            }
        }
        let line_length_km = total_line_length_km(&pois);

        Self {
            category,
            pois,
            measured_area_km2,
            unmeasured_count,
            line_length_km,
        }
    }

    /// Replaces the line length with one measured over a wider member set.
    #[must_use]
    pub const fn with_line_length_km(mut self, line_length_km: f64) -> Self {
        self.line_length_km = line_length_km;
        self
    }

    /// Number of members.
    #[must_use]
    pub fn count(&self) -> usize {
        self.pois.len()
    }
}

/// Summed line length of `pois`, in km.
fn total_line_length_km(pois: &[PointOfInterest]) -> f64 {
    pois.iter()
        .filter_map(|poi| poi.geometry.as_ref())
        .map(geometry::linear_length_km)
        .sum()
}

/// Category buckets for one request, keyed by category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryBuckets {
    buckets: BTreeMap<PoiCategory, CategoryBucket>,
}

impl CategoryBuckets {
    /// Creates an empty bucket set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
        }
    }

    /// Inserts (or replaces) a bucket.
    pub fn insert(&mut self, bucket: CategoryBucket) {
        self.buckets.insert(bucket.category.clone(), bucket);
    }

    /// Looks up a bucket by category.
    #[must_use]
    pub fn get(&self, category: &PoiCategory) -> Option<&CategoryBucket> {
        self.buckets.get(category)
    }

    /// Iterates buckets in category order.
    pub fn iter(&self) -> impl Iterator<Item = &CategoryBucket> {
        self.buckets.values()
    }

    /// Number of buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether there are no buckets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of classified points of interest across all buckets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.buckets.values().map(CategoryBucket::count).sum()
    }

    /// Buckets whose category a selector could match.
    pub fn candidates<'a>(
        &'a self,
        selector: &'a TagSelector,
    ) -> impl Iterator<Item = &'a CategoryBucket> + 'a {
        self.buckets
            .values()
            .filter(move |b| selector.matches_category(&b.category))
    }

    /// Points of interest matching a selector, qualifier included.
    pub fn matching<'a>(
        &'a self,
        selector: &'a TagSelector,
    ) -> impl Iterator<Item = &'a PointOfInterest> + 'a {
        self.candidates(selector)
            .flat_map(|b| b.pois.iter())
            .filter(move |poi| selector.matches(poi))
    }

    /// Member count per displayed category.
    ///
    /// A value is shown bare unless several families use it, in which case
    /// each is shown as `{family}_{value}` (`highway_residential`).
    #[must_use]
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut families: BTreeMap<&str, usize> = BTreeMap::new();
        for category in self.buckets.keys() {
            *families.entry(category.value.as_str()).or_insert(0) += 1;
        }

        self.buckets
            .values()
            .map(|bucket| {
                let category = &bucket.category;
                let label = if families.get(category.value.as_str()).copied().unwrap_or(0) > 1 {
                    format!("{}_{}", category.family, category.value)
                } else {
                    category.value.clone()
                };
                (label, bucket.count())
            })
            .collect()
    }
}

/// Extracted user intent, as reported by intent extraction or its fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIntent {
    /// Profile archetype, e.g. `bachelor` or `family`.
    pub profile_type: String,
    /// What the user cares about most.
    pub priorities: Vec<String>,
    /// What the user is worried about.
    pub concerns: Vec<String>,
    /// Free-text lifestyle description.
    pub lifestyle: String,
    /// Why the selected metrics were chosen.
    pub reasoning: Option<String>,
}

impl UserIntent {
    /// A generic intent with no priorities.
    #[must_use]
    pub fn general(profile_type: impl Into<String>, reasoning: Option<String>) -> Self {
        Self {
            profile_type: profile_type.into(),
            priorities: Vec::new(),
            concerns: Vec::new(),
            lifestyle: "general".to_string(),
            reasoning,
        }
    }
}

/// Computed statistics: metric key to value, `None` when not computable.
pub type Statistics = BTreeMap<String, Option<f64>>;

/// The final output of one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Analysed coordinates.
    pub coordinates: Option<Coordinates>,
    /// Address returned by the geocoder, if geocoding ran.
    pub resolved_address: Option<String>,
    /// Point-of-interest count per category.
    pub poi_category_counts: BTreeMap<String, usize>,
    /// Computed statistics for the selected metrics.
    pub computed_statistics: Statistics,
    /// Metric keys selected for this request.
    pub selected_metric_keys: Vec<String>,
    /// Extracted user intent.
    pub user_intent: Option<UserIntent>,
    /// Narrative summary.
    pub narrative_summary: Option<String>,
    /// Terminal errors. Non-empty means no statistics.
    pub errors: Vec<String>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
    /// One human-readable entry per workflow transition.
    pub audit_trail: Vec<String>,
}

impl AnalysisResult {
    /// Whether the analysis completed without terminal errors.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
