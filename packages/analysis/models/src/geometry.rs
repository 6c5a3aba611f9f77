//! Approximate metric math over WGS84 geometries.
//!
//! Everything here works on small areas (a few kilometres), where scaling
//! longitude by `cos(latitude)` gives a locally accurate metric frame.

use geo::{
    Area, Centroid, Coord, CoordsIter, Distance, Geometry, Haversine, Length, LineString, MapCoords,
    Point,
};

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// A local equirectangular projection centered on a reference latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    lon_scale: f64,
    lat_scale: f64,
}

impl LocalFrame {
    /// Builds a frame whose longitude scale is corrected for `latitude`.
    #[must_use]
    pub fn at_latitude(latitude: f64) -> Self {
        Self {
            lon_scale: METERS_PER_DEGREE * latitude.to_radians().cos(),
            lat_scale: METERS_PER_DEGREE,
        }
    }

    /// Builds a frame at the mean latitude of `coords`.
    ///
    /// Returns `None` for an empty input.
    #[must_use]
    pub fn at_mean_latitude(coords: &[Coord<f64>]) -> Option<Self> {
        if coords.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = coords.iter().map(|c| c.y).sum::<f64>() / coords.len() as f64;
        Some(Self::at_latitude(mean))
    }

    /// Projects a lon/lat coordinate into meters.
    #[must_use]
    pub fn project(&self, coord: Coord<f64>) -> [f64; 2] {
        [coord.x * self.lon_scale, coord.y * self.lat_scale]
    }
}

/// Great-circle distance in kilometres between two lon/lat coordinates.
#[must_use]
pub fn haversine_km(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Haversine.distance(Point(a), Point(b)) / 1000.0
}

/// Length of a line string in kilometres, summed segment by segment.
#[must_use]
pub fn line_length_km(line: &LineString<f64>) -> f64 {
    Haversine.length(line) / 1000.0
}

/// Total line length of a geometry in kilometres (0 for non-linear types).
#[must_use]
pub fn linear_length_km(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::LineString(line) => line_length_km(line),
        Geometry::MultiLineString(lines) => Haversine.length(lines) / 1000.0,
        _ => 0.0,
    }
}

/// Area of a polygonal geometry in km², or `None` for non-polygonal types.
///
/// The polygon is projected into a [`LocalFrame`] at its centroid latitude
/// before the planar area is taken.
#[must_use]
pub fn polygon_area_km2(geometry: &Geometry<f64>) -> Option<f64> {
    if !matches!(geometry, Geometry::Polygon(_) | Geometry::MultiPolygon(_)) {
        return None;
    }
    let centroid = geometry.centroid()?;
    let frame = LocalFrame::at_latitude(centroid.y());
    let projected = geometry.map_coords(|c| {
        let [x, y] = frame.project(c);
        Coord { x, y }
    });
    Some(projected.unsigned_area() / 1_000_000.0)
}

/// Whether a geometry is usable for spatial work.
///
/// Rejects empty geometries, non-finite or out-of-range coordinates, line
/// strings with fewer than two points and rings with fewer than four.
#[must_use]
pub fn is_valid_geometry(geometry: &Geometry<f64>) -> bool {
    if geometry.coords_count() == 0 {
        return false;
    }
    let in_range = geometry.coords_iter().all(|c| {
        c.x.is_finite()
            && c.y.is_finite()
            && (-180.0..=180.0).contains(&c.x)
            && (-90.0..=90.0).contains(&c.y)
    });
    if !in_range {
        return false;
    }
    match geometry {
        Geometry::LineString(line) => line.0.len() >= 2,
        Geometry::MultiLineString(lines) => lines.0.iter().all(|l| l.0.len() >= 2),
        Geometry::Polygon(polygon) => polygon.exterior().0.len() >= 4,
        Geometry::MultiPolygon(polygons) => polygons.0.iter().all(|p| p.exterior().0.len() >= 4),
        _ => true,
    }
}
