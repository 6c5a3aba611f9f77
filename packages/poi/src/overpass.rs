//! Overpass API geodata provider.
//!
//! All requested tag families are folded into a single Overpass QL union
//! so that one analysis issues exactly one request.
//!
//! See <https://wiki.openstreetmap.org/wiki/Overpass_API/Overpass_QL>

use std::collections::BTreeMap;
use std::fmt::Write as _;

use geo::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use locality_lens_analysis_models::{Coordinates, RawFeature, TagFilterSet, TagValues};

use crate::PoiError;
use crate::fetcher::GeodataProvider;

/// Default public interpreter endpoint.
pub const DEFAULT_BASE_URL: &str = "https://overpass-api.de/api/interpreter";

/// Server-side timeout requested in the query header, in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 25;

/// Fetches raw features from an Overpass interpreter.
pub struct OverpassProvider {
    client: reqwest::Client,
    base_url: String,
    query_timeout_secs: u64,
}

impl OverpassProvider {
    /// Creates a provider using an injected HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }

    /// Overrides the `[timeout:N]` header of generated queries.
    #[must_use]
    pub const fn with_query_timeout(mut self, secs: u64) -> Self {
        self.query_timeout_secs = secs;
        self
    }
}

#[async_trait::async_trait]
impl GeodataProvider for OverpassProvider {
    async fn fetch(
        &self,
        center: Coordinates,
        radius_m: f64,
        filters: &TagFilterSet,
    ) -> Result<Vec<RawFeature>, PoiError> {
        let query = build_query(center, radius_m, filters, self.query_timeout_secs);
        log::debug!("Overpass query: {query}");

        let resp = self
            .client
            .post(&self.base_url)
            .form(&[("data", query.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PoiError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        let json: serde_json::Value = serde_json::from_str(&body)?;
        parse_response(&json)
    }
}

/// Builds one Overpass QL union query for every requested family.
#[must_use]
pub fn build_query(
    center: Coordinates,
    radius_m: f64,
    filters: &TagFilterSet,
    timeout_secs: u64,
) -> String {
    let around = format!(
        "(around:{radius_m},{},{})",
        center.latitude(),
        center.longitude()
    );

    let mut query = format!("[out:json][timeout:{timeout_secs}];\n(\n");
    for (family, values) in filters.iter() {
        let key = family.key();
        match values {
            TagValues::Any => {
                let _ = writeln!(query, "  nwr[\"{key}\"]{around};");
            }
            TagValues::OneOf(values) => {
                let alternatives = values
                    .iter()
                    .map(|v| escape(v))
                    .collect::<Vec<_>>()
                    .join("|");
                let _ = writeln!(query, "  nwr[\"{key}\"~\"^({alternatives})$\"]{around};");
            }
        }
    }
    query.push_str(");\nout geom;");
    query
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Parses an Overpass JSON response into raw features.
///
/// # Errors
///
/// Returns [`PoiError::Provider`] if the response reports a runtime error
/// or carries no `elements` array.
pub fn parse_response(json: &serde_json::Value) -> Result<Vec<RawFeature>, PoiError> {
    if let Some(remark) = json["remark"].as_str()
        && remark.contains("error")
    {
        return Err(PoiError::Provider {
            message: remark.to_string(),
        });
    }

    let elements = json["elements"]
        .as_array()
        .ok_or_else(|| PoiError::Provider {
            message: "No elements array in Overpass response".to_string(),
        })?;

    Ok(elements.iter().filter_map(parse_element).collect())
}

fn parse_element(element: &serde_json::Value) -> Option<RawFeature> {
    let kind = element["type"].as_str()?;
    let id = element["id"].as_u64()?;

    let tags: BTreeMap<String, String> = element["tags"]
        .as_object()
        .map(|tags| {
            tags.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let geometry = match kind {
        "node" => node_geometry(element),
        "way" => way_geometry(&element["geometry"]),
        "relation" => relation_geometry(element),
        _ => return None,
    };

    Some(RawFeature {
        id: format!("{kind}/{id}"),
        tags,
        geometry,
    })
}

fn node_geometry(element: &serde_json::Value) -> Option<Geometry<f64>> {
    let lat = element["lat"].as_f64()?;
    let lon = element["lon"].as_f64()?;
    Some(Geometry::Point(Point::new(lon, lat)))
}

fn coords(points: &serde_json::Value) -> Option<Vec<Coord<f64>>> {
    points
        .as_array()?
        .iter()
        .map(|p| {
            Some(Coord {
                x: p["lon"].as_f64()?,
                y: p["lat"].as_f64()?,
            })
        })
        .collect()
}

fn is_closed(coords: &[Coord<f64>]) -> bool {
    coords.len() >= 4 && coords.first() == coords.last()
}

fn way_geometry(points: &serde_json::Value) -> Option<Geometry<f64>> {
    let coords = coords(points)?;
    if is_closed(&coords) {
        Some(Geometry::Polygon(Polygon::new(LineString::new(coords), vec![])))
    } else {
        Some(Geometry::LineString(LineString::new(coords)))
    }
}

/// Closed outer members become a multipolygon; open rings are ignored.
fn relation_geometry(element: &serde_json::Value) -> Option<Geometry<f64>> {
    let polygons: Vec<Polygon<f64>> = element["members"]
        .as_array()?
        .iter()
        .filter(|m| m["type"].as_str() == Some("way") && m["role"].as_str() == Some("outer"))
        .filter_map(|m| coords(&m["geometry"]))
        .filter(|c| is_closed(c))
        .map(|c| Polygon::new(LineString::new(c), vec![]))
        .collect();

    if polygons.is_empty() {
        None
    } else {
        Some(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
    }
}
