//! The static metric catalog, embedded at compile time.
//!
//! Metrics are declared in `catalog/metrics.toml`. The catalog is parsed
//! and validated once per process on first access through [`catalog`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use locality_lens_analysis_models::{TagFilterSet, TagSelector};
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::CatalogError;

const METRICS_TOML: &str = include_str!("../catalog/metrics.toml");

static CATALOG: LazyLock<MetricCatalog> = LazyLock::new(|| {
    MetricCatalog::from_toml(METRICS_TOML)
        .unwrap_or_else(|e| panic!("Failed to load metrics.toml: {e}"))
});

/// Returns the process-wide metric catalog.
///
/// # Panics
///
/// Panics on first access if the embedded catalog is malformed (a
/// compile-time guarantee since the file is embedded).
#[must_use]
pub fn catalog() -> &'static MetricCatalog {
    &CATALOG
}

/// Relative computation cost of a metric.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CostClass {
    /// Read straight off bucket counts.
    Low,
    /// Needs a pass over member geometry.
    Medium,
    /// Composite or geometry-heavy.
    High,
}

/// How a metric's value is derived.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricKind {
    /// Number of matching members.
    Count {
        /// Members matching any selector are counted.
        selectors: Vec<TagSelector>,
    },
    /// Measured polygon area, plus an estimate for members without one.
    Area {
        /// Members matching any selector contribute.
        selectors: Vec<TagSelector>,
        /// Area credited to each member lacking polygon geometry.
        estimated_km2_per_feature: f64,
    },
    /// Matching members per km² of search area.
    CountDensity {
        /// Members matching any selector are counted.
        selectors: Vec<TagSelector>,
    },
    /// Great-circle km from the analysed point to the nearest match.
    NearestDistance {
        /// Candidate members.
        selectors: Vec<TagSelector>,
    },
    /// Line length (km) per km² of search area.
    LineDensity {
        /// Members whose line geometry is measured.
        selectors: Vec<TagSelector>,
    },
    /// Sum of dependency values per km² of search area.
    SumDensity,
    /// The single dependency value divided by the search area.
    SearchAreaRatio,
    /// `min(cap, Σ weight · dependency)`.
    WeightedScore {
        /// Weight per dependency key.
        weights: BTreeMap<String, f64>,
        /// Upper bound of the score.
        cap: f64,
    },
    /// Shannon evenness of the dependency counts, scaled to 0-100.
    Diversity,
}

impl MetricKind {
    /// Tag selectors this kind reads from the buckets.
    #[must_use]
    pub fn selectors(&self) -> &[TagSelector] {
        match self {
            Self::Count { selectors }
            | Self::Area { selectors, .. }
            | Self::CountDensity { selectors }
            | Self::NearestDistance { selectors }
            | Self::LineDensity { selectors } => selectors,
            Self::SumDensity
            | Self::SearchAreaRatio
            | Self::WeightedScore { .. }
            | Self::Diversity => &[],
        }
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricDefinition {
    /// Unique metric key, e.g. `school_count`.
    pub key: String,
    /// Display name.
    pub name: String,
    /// One-sentence description shown to intent extraction.
    pub description: String,
    /// Grouping, e.g. `education`.
    pub category: String,
    /// Computation cost class.
    pub cost: CostClass,
    /// Unit of the value.
    pub unit: String,
    /// Decimal places the value is rounded to, if any.
    #[serde(default)]
    pub precision: Option<i32>,
    /// Keywords for matching free-text priorities.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Profile archetypes this metric is typically relevant for.
    #[serde(default)]
    pub relevance_for: Vec<String>,
    /// Metrics that must be computed first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Computation kind.
    pub kind: MetricKind,
}

impl MetricDefinition {
    /// Whether this metric derives from other metrics.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        !self.dependencies.is_empty()
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    metric: Vec<MetricDefinition>,
}

/// The validated, ordered set of metric definitions.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    metrics: Vec<MetricDefinition>,
    index: BTreeMap<String, usize>,
}

impl MetricCatalog {
    /// Parses and validates a catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the TOML is malformed, a key repeats, a
    /// dependency is unknown, dependencies form a cycle, or a kind's
    /// parameters disagree with its declared dependencies.
    pub fn from_toml(toml_str: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(toml_str)?;
        Self::from_definitions(file.metric)
    }

    /// Validates an already-parsed list of definitions.
    ///
    /// # Errors
    ///
    /// See [`MetricCatalog::from_toml`].
    pub fn from_definitions(metrics: Vec<MetricDefinition>) -> Result<Self, CatalogError> {
        let mut index = BTreeMap::new();
        for (position, metric) in metrics.iter().enumerate() {
            if index.insert(metric.key.clone(), position).is_some() {
                return Err(CatalogError::DuplicateKey {
                    key: metric.key.clone(),
                });
            }
        }

        let catalog = Self { metrics, index };
        for metric in &catalog.metrics {
            catalog.validate_metric(metric)?;
        }
        catalog.check_acyclic()?;

        log::debug!("Loaded metric catalog with {} metrics", catalog.len());
        Ok(catalog)
    }

    fn validate_metric(&self, metric: &MetricDefinition) -> Result<(), CatalogError> {
        for dependency in &metric.dependencies {
            if !self.contains(dependency) {
                return Err(CatalogError::UnknownDependency {
                    key: metric.key.clone(),
                    dependency: dependency.clone(),
                });
            }
        }

        let invalid = |message: &str| CatalogError::InvalidKind {
            key: metric.key.clone(),
            message: message.to_string(),
        };

        match &metric.kind {
            MetricKind::Count { selectors }
            | MetricKind::Area { selectors, .. }
            | MetricKind::CountDensity { selectors }
            | MetricKind::NearestDistance { selectors }
            | MetricKind::LineDensity { selectors } => {
                if selectors.is_empty() {
                    return Err(invalid("at least one selector is required"));
                }
            }
            MetricKind::SumDensity => {
                if metric.dependencies.is_empty() {
                    return Err(invalid("sum_density needs dependencies"));
                }
            }
            MetricKind::SearchAreaRatio => {
                if metric.dependencies.len() != 1 {
                    return Err(invalid("search_area_ratio needs exactly one dependency"));
                }
            }
            MetricKind::WeightedScore { weights, .. } => {
                if let Some(stray) = weights.keys().find(|k| !metric.dependencies.contains(k)) {
                    return Err(invalid(&format!(
                        "weight for '{stray}' is not a declared dependency"
                    )));
                }
            }
            MetricKind::Diversity => {
                if metric.dependencies.len() < 2 {
                    return Err(invalid("diversity needs at least two dependencies"));
                }
            }
        }

        Ok(())
    }

    /// Depth-first search for a back edge in the dependency graph.
    fn check_acyclic(&self) -> Result<(), CatalogError> {
        fn visit<'a>(
            catalog: &'a MetricCatalog,
            key: &'a str,
            in_progress: &mut BTreeSet<&'a str>,
            done: &mut BTreeSet<&'a str>,
        ) -> Result<(), CatalogError> {
            if done.contains(key) {
                return Ok(());
            }
            if !in_progress.insert(key) {
                return Err(CatalogError::DependencyCycle {
                    key: key.to_string(),
                });
            }
            if let Some(metric) = catalog.get(key) {
                for dependency in &metric.dependencies {
                    visit(catalog, dependency, in_progress, done)?;
                }
            }
            in_progress.remove(key);
            done.insert(key);
            Ok(())
        }

        let mut in_progress = BTreeSet::new();
        let mut done = BTreeSet::new();
        for metric in &self.metrics {
            visit(self, &metric.key, &mut in_progress, &mut done)?;
        }
        Ok(())
    }

    /// Looks up a metric by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetricDefinition> {
        self.index.get(key).map(|&i| &self.metrics[i])
    }

    /// Whether `key` names a catalog metric.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Iterates metrics in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics.iter()
    }

    /// Number of metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Declared dependencies of a metric; empty for unknown keys.
    #[must_use]
    pub fn dependencies_of(&self, key: &str) -> &[String] {
        self.get(key).map_or(&[], |m| m.dependencies.as_slice())
    }

    /// One `key: name - description` line per metric, in declaration order.
    #[must_use]
    pub fn summary(&self) -> String {
        self.metrics
            .iter()
            .map(|m| format!("{}: {} - {}", m.key, m.name, m.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Union of the tag selectors read by `keys`, merged per family.
    ///
    /// Unknown keys contribute nothing.
    #[must_use]
    pub fn tag_filters<'a, I>(&self, keys: I) -> TagFilterSet
    where
        I: IntoIterator<Item = &'a String>,
    {
        keys.into_iter()
            .filter_map(|key| self.get(key))
            .flat_map(|metric| metric.kind.selectors())
            .collect()
    }
}
