#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Location resolution for locality analysis.
//!
//! Turns the raw location text of a request into validated coordinates:
//!
//! 1. **Coordinate literals** (`"12.9784, 77.6408"`) are parsed directly and
//!    never reach the network.
//! 2. **Everything else** is sent to a [`Geocoder`] collaborator. The
//!    bundled implementation is [`nominatim::NominatimGeocoder`].
//!
//! No retry happens at this layer; a failed lookup surfaces once.

pub mod nominatim;
pub mod resolver;

use locality_lens_analysis_models::contracts::{GeocodeMatch, GeocodeQuery};
use thiserror::Error;

pub use resolver::{LocationResolver, Resolution, ResolutionSource, ResolveError};

/// Errors from geocoding collaborators.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Geocoding API returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,
}

/// A geocoding collaborator: free-text query in, single best match out.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// Looks up the best match for a query.
    ///
    /// Returns `Ok(None)` when the service has no match.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on transport failures or malformed responses.
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Option<GeocodeMatch>, GeocodeError>;
}
