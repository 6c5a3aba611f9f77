//! Near-duplicate removal within a category bucket.
//!
//! OSM often maps one place twice (a node and a building way, or two
//! nodes from different imports). Members sharing a normalized name and
//! category whose centroids lie within a distance threshold are collapsed
//! to the first one seen.

use std::collections::BTreeMap;

use geo::Coord;
use locality_lens_analysis_models::geometry::{LocalFrame, is_valid_geometry};
use locality_lens_analysis_models::{PoiCategory, PointOfInterest};
use rstar::RTree;
use rstar::primitives::GeomWithData;

/// Lowercases, trims, and collapses internal whitespace.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Removes near-duplicate members.
///
/// Members without valid geometry are dropped first. Unnamed members pass
/// through untouched. Within each `(normalized name, category)` group,
/// every pair closer than `distance_threshold_m` loses its later member.
/// Output keeps input order.
#[must_use]
pub fn dedupe(pois: Vec<PointOfInterest>, distance_threshold_m: f64) -> Vec<PointOfInterest> {
    let before = pois.len();
    let pois: Vec<PointOfInterest> = pois
        .into_iter()
        .filter(|poi| poi.geometry.as_ref().is_some_and(is_valid_geometry))
        .collect();
    let invalid = before - pois.len();

    let mut groups: BTreeMap<(String, &PoiCategory), Vec<usize>> = BTreeMap::new();
    for (index, poi) in pois.iter().enumerate() {
        if let Some(name) = poi.name.as_deref() {
            let key = normalize_name(name);
            if !key.is_empty() {
                groups.entry((key, &poi.category)).or_default().push(index);
            }
        }
    }

    let mut keep = vec![true; pois.len()];
    for members in groups.values().filter(|m| m.len() > 1) {
        for dropped in duplicates_in_group(&pois, members, distance_threshold_m) {
            keep[dropped] = false;
        }
    }

    let duplicates = keep.iter().filter(|k| !**k).count();
    if invalid > 0 || duplicates > 0 {
        log::debug!(
            "Dedupe dropped {invalid} invalid and {duplicates} duplicate features of {before}"
        );
    }

    pois.into_iter()
        .zip(keep)
        .filter_map(|(poi, keep)| keep.then_some(poi))
        .collect()
}

/// Returns the input indices to drop from one name group.
fn duplicates_in_group(
    pois: &[PointOfInterest],
    members: &[usize],
    distance_threshold_m: f64,
) -> Vec<usize> {
    let centroids: Vec<(usize, Coord<f64>)> = members
        .iter()
        .filter_map(|&index| pois[index].centroid().map(|c| (index, c.0)))
        .collect();

    let coords: Vec<Coord<f64>> = centroids.iter().map(|(_, c)| *c).collect();
    let Some(frame) = LocalFrame::at_mean_latitude(&coords) else {
        return Vec::new();
    };

    let points: Vec<GeomWithData<[f64; 2], usize>> = centroids
        .iter()
        .map(|&(index, c)| GeomWithData::new(frame.project(c), index))
        .collect();
    let tree = RTree::bulk_load(points.clone());

    let max_squared = distance_threshold_m * distance_threshold_m;
    let mut dropped = Vec::new();
    for point in &points {
        for neighbor in tree.locate_within_distance(*point.geom(), max_squared) {
            if neighbor.data > point.data {
                dropped.push(neighbor.data);
            }
        }
    }

    dropped.sort_unstable();
    dropped.dedup();
    dropped
}
