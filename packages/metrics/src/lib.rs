#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Locality metrics.
//!
//! A static catalog ([`catalog::catalog`]) declares every metric, its tag
//! selectors and its dependencies. [`dependencies`] expands a selection to
//! everything it needs, [`engine::MetricsEngine`] computes values in
//! dependency order, and [`profiles`] supplies archetype default selections.

pub mod catalog;
pub mod dependencies;
pub mod engine;
pub mod profiles;

use thiserror::Error;

pub use catalog::{MetricCatalog, MetricDefinition, MetricKind, catalog};
pub use dependencies::{compute_order, select_with_dependencies};
pub use engine::{MetricContext, MetricsEngine, MetricsOutcome};
pub use profiles::{MAX_SELECTION, MIN_SELECTION, ProfileArchetype, ProfileTable, profiles};

/// Errors loading a metric catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// TOML parsing failed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Two metrics share a key.
    #[error("Duplicate metric key '{key}'")]
    DuplicateKey {
        /// The repeated key.
        key: String,
    },

    /// A dependency names no catalog metric.
    #[error("Metric '{key}' depends on unknown metric '{dependency}'")]
    UnknownDependency {
        /// The dependent metric.
        key: String,
        /// The unknown dependency.
        dependency: String,
    },

    /// Dependencies loop back on themselves.
    #[error("Dependency cycle through metric '{key}'")]
    DependencyCycle {
        /// A metric on the cycle.
        key: String,
    },

    /// A kind's parameters do not fit the metric declaration.
    #[error("Metric '{key}' is misconfigured: {message}")]
    InvalidKind {
        /// The metric.
        key: String,
        /// What is wrong.
        message: String,
    },

    /// The profile archetype table is inconsistent.
    #[error("Invalid profile table: {message}")]
    InvalidProfiles {
        /// What is wrong.
        message: String,
    },
}

/// A metric that could not be computed. Non-fatal: the value is reported as
/// null and computation of other metrics continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputationWarning {
    /// The key is not in the catalog.
    #[error("Unknown metric '{key}' could not be computed")]
    UnknownMetric {
        /// The requested key.
        key: String,
    },

    /// A dependency was missing or null.
    #[error("Metric '{key}' could not be computed: dependency '{dependency}' is unavailable")]
    MissingDependency {
        /// The composite metric.
        key: String,
        /// The missing dependency.
        dependency: String,
    },

    /// No matching feature exists to measure against.
    #[error("Metric '{key}' could not be computed: no matching features found")]
    NoMatches {
        /// The metric.
        key: String,
    },
}
