//! Raw location text to validated coordinates.

use locality_lens_analysis_models::Coordinates;
use locality_lens_analysis_models::contracts::GeocodeQuery;
use thiserror::Error;

use crate::{GeocodeError, Geocoder};

/// How a location was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Parsed from a `lat,lon` literal.
    Literal,
    /// Looked up through the geocoder.
    Geocoded,
}

/// A resolved location.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Validated coordinates.
    pub coordinates: Coordinates,
    /// Address reported by the geocoder; `None` for literals.
    pub address: Option<String>,
    /// Where the coordinates came from.
    pub source: ResolutionSource,
}

/// Terminal resolution failures.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The geocoder found nothing.
    #[error("Could not geocode location: {query}")]
    NoMatch {
        /// The query that had no match.
        query: String,
    },

    /// The geocoder answered with unusable data.
    #[error("Geocoding returned malformed data: {message}")]
    Malformed {
        /// What was wrong.
        message: String,
    },

    /// The geocoder could not be reached.
    #[error("Geocoding failed: {0}")]
    Transport(GeocodeError),

    /// The geocoder did not answer within the time budget.
    #[error("Geocoding timed out after {timeout_secs}s")]
    TimedOut {
        /// The budget that ran out.
        timeout_secs: u64,
    },
}

impl From<GeocodeError> for ResolveError {
    fn from(e: GeocodeError) -> Self {
        match e {
            GeocodeError::Parse { message } => Self::Malformed { message },
            other => Self::Transport(other),
        }
    }
}

/// Parses `"lat,lon"` text into coordinates.
///
/// The text must split on commas into exactly two tokens, each a finite
/// float within range. Anything else yields `None` so that the caller can
/// fall through to geocoding.
#[must_use]
pub fn parse_as_coordinates(text: &str) -> Option<Coordinates> {
    let mut parts = text.split(',');
    let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };

    let lat = lat.trim().parse::<f64>().ok()?;
    let lon = lon.trim().parse::<f64>().ok()?;

    Coordinates::new(lat, lon).ok()
}

/// Resolves location text, delegating to a [`Geocoder`] only when the text
/// is not a coordinate literal.
pub struct LocationResolver<'a> {
    geocoder: &'a dyn Geocoder,
}

impl<'a> LocationResolver<'a> {
    /// Creates a resolver backed by `geocoder`.
    #[must_use]
    pub fn new(geocoder: &'a dyn Geocoder) -> Self {
        Self { geocoder }
    }

    /// Resolves `text` to coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the geocoder has no match, returns
    /// malformed or out-of-range data, or cannot be reached.
    pub async fn resolve(&self, text: &str) -> Result<Resolution, ResolveError> {
        if let Some(coordinates) = parse_as_coordinates(text) {
            return Ok(Resolution {
                coordinates,
                address: None,
                source: ResolutionSource::Literal,
            });
        }

        let query = GeocodeQuery {
            query: text.trim().to_string(),
        };

        let Some(found) = self.geocoder.geocode(&query).await? else {
            return Err(ResolveError::NoMatch { query: query.query });
        };

        let coordinates =
            Coordinates::new(found.lat, found.lon).map_err(|e| ResolveError::Malformed {
                message: e.to_string(),
            })?;

        log::info!("Geocoded '{}' to {coordinates}", query.query);

        Ok(Resolution {
            coordinates,
            address: Some(found.display_name.unwrap_or(query.query)),
            source: ResolutionSource::Geocoded,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use locality_lens_analysis_models::contracts::GeocodeMatch;

    use super::*;

    struct FakeGeocoder {
        response: Mutex<Option<Result<Option<GeocodeMatch>, GeocodeError>>>,
        calls: AtomicUsize,
    }

    impl FakeGeocoder {
        fn returning(response: Result<Option<GeocodeMatch>, GeocodeError>) -> Self {
            Self {
                response: Mutex::new(Some(response)),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(
            &self,
            _query: &GeocodeQuery,
        ) -> Result<Option<GeocodeMatch>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.lock().unwrap().take().unwrap_or(Ok(None))
        }
    }

    fn indiranagar() -> GeocodeMatch {
        GeocodeMatch {
            lat: 12.9784,
            lon: 77.6408,
            display_name: Some("Indiranagar, Bengaluru".to_string()),
        }
    }

    #[test]
    fn parses_literals() {
        let c = parse_as_coordinates("12.9784,77.6408").unwrap();
        assert!((c.latitude() - 12.9784).abs() < f64::EPSILON);
        assert!((c.longitude() - 77.6408).abs() < f64::EPSILON);

        let c = parse_as_coordinates(" -33.86 , 151.21 ").unwrap();
        assert!((c.latitude() + 33.86).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_non_literals() {
        for text in [
            "Indiranagar, Bangalore",
            "12.9,77.6,1",
            "12.9",
            "91,0",
            "0,181",
            "nan,0",
            "inf,0",
            ",",
            "",
        ] {
            assert!(parse_as_coordinates(text).is_none(), "parsed {text:?}");
        }
    }

    #[tokio::test]
    async fn literal_skips_geocoder() {
        let geocoder = FakeGeocoder::returning(Ok(Some(indiranagar())));
        let resolver = LocationResolver::new(&geocoder);

        let resolution = resolver.resolve("12.9784,77.6408").await.unwrap();

        assert_eq!(resolution.source, ResolutionSource::Literal);
        assert!(resolution.address.is_none());
        assert_eq!(geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn out_of_range_literal_falls_through_to_geocoder() {
        let geocoder = FakeGeocoder::returning(Ok(Some(indiranagar())));
        let resolver = LocationResolver::new(&geocoder);

        let resolution = resolver.resolve("120.5, 77.6").await.unwrap();

        assert_eq!(resolution.source, ResolutionSource::Geocoded);
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn address_uses_display_name() {
        let geocoder = FakeGeocoder::returning(Ok(Some(indiranagar())));
        let resolver = LocationResolver::new(&geocoder);

        let resolution = resolver.resolve("Indiranagar, Bangalore").await.unwrap();

        assert_eq!(
            resolution.address.as_deref(),
            Some("Indiranagar, Bengaluru")
        );
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn no_match_is_terminal() {
        let geocoder = FakeGeocoder::returning(Ok(None));
        let resolver = LocationResolver::new(&geocoder);

        let err = resolver.resolve("Atlantis").await.unwrap_err();

        assert_eq!(err.to_string(), "Could not geocode location: Atlantis");
    }

    #[tokio::test]
    async fn malformed_match_is_terminal() {
        let geocoder = FakeGeocoder::returning(Ok(Some(GeocodeMatch {
            lat: 200.0,
            lon: 0.0,
            display_name: None,
        })));
        let resolver = LocationResolver::new(&geocoder);

        let err = resolver.resolve("Nowhere").await.unwrap_err();
        assert!(matches!(err, ResolveError::Malformed { .. }));

        let geocoder = FakeGeocoder::returning(Err(GeocodeError::Parse {
            message: "not an array".to_string(),
        }));
        let resolver = LocationResolver::new(&geocoder);
        let err = resolver.resolve("Nowhere").await.unwrap_err();
        assert!(matches!(err, ResolveError::Malformed { .. }));
    }

    #[tokio::test]
    async fn transport_error_is_terminal() {
        let geocoder = FakeGeocoder::returning(Err(GeocodeError::Status { status: 503 }));
        let resolver = LocationResolver::new(&geocoder);

        let err = resolver.resolve("Indiranagar").await.unwrap_err();
        assert!(matches!(err, ResolveError::Transport(_)));
        assert_eq!(
            err.to_string(),
            "Geocoding failed: Geocoding API returned status 503"
        );
    }
}
