#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Points of interest around a location.
//!
//! Raw features come from a [`fetcher::GeodataProvider`] in one batched
//! query, are classified into a single category each, grouped into
//! category buckets, and deduplicated per bucket.

pub mod buckets;
pub mod classifier;
pub mod dedupe;
pub mod fetcher;
pub mod overpass;

use thiserror::Error;

pub use buckets::build_buckets;
pub use classifier::classify;
pub use dedupe::dedupe;
pub use fetcher::{GeodataProvider, PointOfInterestFetcher};

/// Errors from geodata providers.
#[derive(Debug, Error)]
pub enum PoiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered with a non-success status.
    #[error("Geodata provider returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The provider reported a failure inside a successful response.
    #[error("Geodata provider error: {message}")]
    Provider {
        /// Provider-reported message.
        message: String,
    },

    /// The provider did not answer within the time budget.
    #[error("Geodata provider timed out after {timeout_secs}s")]
    TimedOut {
        /// The budget that ran out.
        timeout_secs: u64,
    },
}
