//! Statistics computation over deduplicated category buckets.

use std::f64::consts::PI;

use locality_lens_analysis_models::geometry::{haversine_km, linear_length_km, polygon_area_km2};
use locality_lens_analysis_models::{
    CategoryBucket, CategoryBuckets, Coordinates, PointOfInterest, Statistics, TagSelector,
};

use crate::{
    ComputationWarning, MetricCatalog, MetricDefinition, MetricKind, compute_order,
    select_with_dependencies,
};

/// Per-request inputs that are not bucket data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricContext {
    /// The analysed location.
    pub center: Coordinates,
    /// Radius of the geodata query, in meters.
    pub search_radius_m: f64,
}

impl MetricContext {
    /// Search area `π·r²` in km².
    #[must_use]
    pub fn search_area_km2(&self) -> f64 {
        let r_km = self.search_radius_m / 1000.0;
        PI * r_km * r_km
    }

    fn per_search_area(&self, value: f64) -> f64 {
        let area = self.search_area_km2();
        if area > 0.0 { value / area } else { 0.0 }
    }
}

/// Result of computing a selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsOutcome {
    /// Exactly the selected keys; `None` where computation failed.
    pub statistics: Statistics,
    /// One message per metric that could not be computed.
    pub warnings: Vec<String>,
}

/// Computes catalog metrics.
pub struct MetricsEngine<'a> {
    catalog: &'a MetricCatalog,
}

impl<'a> MetricsEngine<'a> {
    /// Creates an engine over `catalog`.
    #[must_use]
    pub const fn new(catalog: &'a MetricCatalog) -> Self {
        Self { catalog }
    }

    /// Computes every selected metric and its dependencies, then projects
    /// the result onto the selection.
    ///
    /// Failures never abort the pass: a failed metric is `None` with a
    /// warning and every other metric is still computed.
    #[must_use]
    pub fn compute_all(
        &self,
        selected: &[String],
        buckets: &CategoryBuckets,
        ctx: &MetricContext,
    ) -> MetricsOutcome {
        let expanded = select_with_dependencies(self.catalog, selected);
        let order = compute_order(self.catalog, &expanded);

        let mut computed = Statistics::new();
        let mut warnings = Vec::new();

        for key in order {
            match self.compute(&key, buckets, ctx, &computed) {
                Ok(value) => {
                    log::debug!("Computed {key} = {value}");
                    computed.insert(key, Some(value));
                }
                Err(warning) => {
                    log::warn!("{warning}");
                    warnings.push(warning.to_string());
                    computed.insert(key, None);
                }
            }
        }

        let statistics = selected
            .iter()
            .map(|key| (key.clone(), computed.get(key).copied().flatten()))
            .collect();

        MetricsOutcome {
            statistics,
            warnings,
        }
    }

    /// Computes one metric.
    ///
    /// Composite metrics read their dependencies from `computed`, which
    /// must already hold them.
    ///
    /// # Errors
    ///
    /// Returns [`ComputationWarning`] for unknown keys, missing or null
    /// dependencies, and distance metrics with nothing to measure.
    pub fn compute(
        &self,
        key: &str,
        buckets: &CategoryBuckets,
        ctx: &MetricContext,
        computed: &Statistics,
    ) -> Result<f64, ComputationWarning> {
        let metric = self
            .catalog
            .get(key)
            .ok_or_else(|| ComputationWarning::UnknownMetric {
                key: key.to_string(),
            })?;

        let value = match &metric.kind {
            MetricKind::Count { selectors } => to_f64(count_matching(buckets, selectors)),
            MetricKind::Area {
                selectors,
                estimated_km2_per_feature,
            } => matched_area_km2(buckets, selectors, *estimated_km2_per_feature),
            MetricKind::CountDensity { selectors } => {
                ctx.per_search_area(to_f64(count_matching(buckets, selectors)))
            }
            MetricKind::NearestDistance { selectors } => {
                nearest_km(buckets, selectors, ctx.center).ok_or_else(|| {
                    ComputationWarning::NoMatches {
                        key: key.to_string(),
                    }
                })?
            }
            MetricKind::LineDensity { selectors } => {
                ctx.per_search_area(matched_length_km(buckets, selectors))
            }
            MetricKind::SumDensity => {
                let mut sum = 0.0;
                for dependency in &metric.dependencies {
                    sum += dependency_value(metric, dependency, computed)?;
                }
                ctx.per_search_area(sum)
            }
            MetricKind::SearchAreaRatio => {
                let mut value = 0.0;
                for dependency in &metric.dependencies {
                    value = dependency_value(metric, dependency, computed)?;
                }
                ctx.per_search_area(value)
            }
            MetricKind::WeightedScore { weights, cap } => {
                let mut score = 0.0;
                for dependency in &metric.dependencies {
                    let value = dependency_value(metric, dependency, computed)?;
                    score += weights.get(dependency).copied().unwrap_or(0.0) * value;
                }
                score.min(*cap)
            }
            MetricKind::Diversity => {
                let mut counts = Vec::with_capacity(metric.dependencies.len());
                for dependency in &metric.dependencies {
                    counts.push(dependency_value(metric, dependency, computed)?);
                }
                shannon_evenness(&counts) * 100.0
            }
        };

        // An empty float sum is -0.0, which would serialize with its sign.
        let value = value + 0.0;
        Ok(metric.precision.map_or(value, |p| round_to(value, p)))
    }
}

fn dependency_value(
    metric: &MetricDefinition,
    dependency: &str,
    computed: &Statistics,
) -> Result<f64, ComputationWarning> {
    computed
        .get(dependency)
        .copied()
        .flatten()
        .ok_or_else(|| ComputationWarning::MissingDependency {
            key: metric.key.clone(),
            dependency: dependency.to_string(),
        })
}

#[allow(clippy::cast_precision_loss)]
const fn to_f64(count: usize) -> f64 {
    count as f64
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn unqualified(selectors: &[TagSelector]) -> bool {
    selectors.iter().all(|s| s.qualifier.is_none())
}

fn matching<'a>(
    buckets: &'a CategoryBuckets,
    selectors: &'a [TagSelector],
) -> impl Iterator<Item = &'a PointOfInterest> + 'a {
    buckets
        .iter()
        .flat_map(|bucket| bucket.pois.iter())
        .filter(move |poi| selectors.iter().any(|s| s.matches(poi)))
}

/// Without qualifiers a selector matches whole buckets, so their counts
/// are read directly.
fn count_matching(buckets: &CategoryBuckets, selectors: &[TagSelector]) -> usize {
    if unqualified(selectors) {
        buckets
            .iter()
            .filter(|b| selectors.iter().any(|s| s.matches_category(&b.category)))
            .map(CategoryBucket::count)
            .sum()
    } else {
        matching(buckets, selectors).count()
    }
}

fn matched_area_km2(buckets: &CategoryBuckets, selectors: &[TagSelector], estimate: f64) -> f64 {
    if unqualified(selectors) {
        buckets
            .iter()
            .filter(|b| selectors.iter().any(|s| s.matches_category(&b.category)))
            .map(|b| to_f64(b.unmeasured_count).mul_add(estimate, b.measured_area_km2))
            .sum()
    } else {
        matching(buckets, selectors)
            .map(|poi| {
                poi.geometry
                    .as_ref()
                    .and_then(polygon_area_km2)
                    .unwrap_or(estimate)
            })
            .sum()
    }
}

/// Bucket line lengths are measured before deduplication; qualified
/// selectors fall back to the surviving members.
fn matched_length_km(buckets: &CategoryBuckets, selectors: &[TagSelector]) -> f64 {
    if unqualified(selectors) {
        buckets
            .iter()
            .filter(|b| selectors.iter().any(|s| s.matches_category(&b.category)))
            .map(|b| b.line_length_km)
            .sum()
    } else {
        matching(buckets, selectors)
            .filter_map(|poi| poi.geometry.as_ref())
            .map(linear_length_km)
            .sum()
    }
}

fn nearest_km(
    buckets: &CategoryBuckets,
    selectors: &[TagSelector],
    center: Coordinates,
) -> Option<f64> {
    let origin = center.to_point().0;
    matching(buckets, selectors)
        .filter_map(PointOfInterest::centroid)
        .map(|c| haversine_km(origin, c.0))
        .min_by(f64::total_cmp)
}

/// Shannon entropy of `counts` normalized by `ln(k)`, in `[0, 1]`.
///
/// Fewer than two non-zero counts have no diversity.
fn shannon_evenness(counts: &[f64]) -> f64 {
    let counts: Vec<f64> = counts.iter().copied().filter(|c| *c > 0.0).collect();
    if counts.len() < 2 {
        return 0.0;
    }

    let total: f64 = counts.iter().sum();
    let entropy: f64 = counts
        .iter()
        .map(|c| {
            let p = c / total;
            -p * p.ln()
        })
        .sum();

    entropy / to_f64(counts.len()).ln()
}
