//! Batched point-of-interest retrieval.

use locality_lens_analysis_models::{Coordinates, RawFeature, TagFilterSet};

use crate::PoiError;

/// A geodata collaborator answering one radius query for a set of tag
/// families.
#[async_trait::async_trait]
pub trait GeodataProvider: Send + Sync {
    /// Returns every feature within `radius_m` of `center` that carries any
    /// of the requested tags.
    ///
    /// # Errors
    ///
    /// Returns [`PoiError`] on transport or provider failure.
    async fn fetch(
        &self,
        center: Coordinates,
        radius_m: f64,
        filters: &TagFilterSet,
    ) -> Result<Vec<RawFeature>, PoiError>;
}

/// Issues exactly one provider query per analysis.
pub struct PointOfInterestFetcher<'a> {
    provider: &'a dyn GeodataProvider,
}

impl<'a> PointOfInterestFetcher<'a> {
    /// Creates a fetcher backed by `provider`.
    #[must_use]
    pub fn new(provider: &'a dyn GeodataProvider) -> Self {
        Self { provider }
    }

    /// Fetches raw features for the given filters.
    ///
    /// An empty filter set returns no features without calling the
    /// provider.
    ///
    /// # Errors
    ///
    /// Returns [`PoiError`] if the provider call fails. Partial results are
    /// never returned.
    pub async fn fetch(
        &self,
        center: Coordinates,
        radius_m: f64,
        filters: &TagFilterSet,
    ) -> Result<Vec<RawFeature>, PoiError> {
        if filters.is_empty() {
            log::debug!("No tag families requested, skipping geodata query");
            return Ok(Vec::new());
        }

        log::info!(
            "Fetching features for {} tag families within {radius_m} m of {center}",
            filters.len()
        );
        let features = self.provider.fetch(center, radius_m, filters).await?;
        log::info!("Geodata provider returned {} features", features.len());

        Ok(features)
    }
}
