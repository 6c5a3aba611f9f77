use std::collections::BTreeMap;

use locality_lens_analysis_models::geometry::{is_valid_geometry, linear_length_km};
use locality_lens_analysis_models::{
    CategoryBucket, CategoryBuckets, PoiCategory, PointOfInterest, RawFeature,
};

use crate::{classify, dedupe};

/// Classifies raw features, groups them by category and deduplicates each
/// bucket. Unclassified features are discarded.
///
/// Line length is measured over every valid member before deduplication,
/// so a road split into several same-named ways keeps its full length.
#[must_use]
pub fn build_buckets(features: Vec<RawFeature>, dedupe_distance_m: f64) -> CategoryBuckets {
    let total = features.len();
    let mut grouped: BTreeMap<PoiCategory, Vec<PointOfInterest>> = BTreeMap::new();

    for feature in features {
        if let Some(category) = classify(&feature) {
            grouped
                .entry(category.clone())
                .or_default()
                .push(PointOfInterest::from_raw(feature, category));
        }
    }

    let mut buckets = CategoryBuckets::new();
    for (category, pois) in grouped {
        let line_length_km: f64 = pois
            .iter()
            .filter_map(|poi| poi.geometry.as_ref())
            .filter(|geometry| is_valid_geometry(geometry))
            .map(linear_length_km)
            .sum();
        let pois = dedupe(pois, dedupe_distance_m);
        if !pois.is_empty() {
            buckets.insert(CategoryBucket::new(category, pois).with_line_length_km(line_length_km));
        }
    }

    log::info!(
        "Built {} category buckets with {} points of interest from {total} features",
        buckets.len(),
        buckets.total()
    );

    buckets
}
