//! Nominatim / OpenStreetMap geocoder client.
//!
//! The public instance allows **1 request per second**. Each analysis
//! issues at most one lookup, so no client-side rate limiting is done.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use locality_lens_analysis_models::contracts::{GeocodeMatch, GeocodeQuery};

use crate::{GeocodeError, Geocoder};

/// Default public search endpoint.
pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Geocodes free-form queries against a Nominatim search endpoint.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    /// Creates a geocoder using an injected HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Option<GeocodeMatch>, GeocodeError> {
        log::debug!("Nominatim lookup for '{}'", query.query);

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query.query.as_str()),
                ("format", "jsonv2"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(&body)
    }
}

/// Parses a Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodeMatch>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let lat = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let lon = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    let display_name = first["display_name"].as_str().map(String::from);

    Ok(Some(GeocodeMatch {
        lat,
        lon,
        display_name,
    }))
}
