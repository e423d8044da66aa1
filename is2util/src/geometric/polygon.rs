use anyhow::{Context, Result};
use geo::algorithm::orient::{Direction, Orient};
use geo::{Geometry, Polygon};
use geos::Geom;
use log::debug;

use crate::error::Is2Error;

/// Knobs for [`simplify_for_url`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplifyOptions {
    /// Formatted polygon string must be strictly shorter than this
    pub limit: usize,
    /// Tolerance of the first simplification
    pub tolerance: f64,
    /// Tolerance growth per failed attempt
    pub factor: f64,
    pub max_attempts: usize,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        SimplifyOptions {
            limit: 1000,
            tolerance: 0.05,
            factor: 1.5,
            max_attempts: 1000,
        }
    }
}

impl SimplifyOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Serialize a polygon for the `polygon` / `boundingshape` order parameters
///
/// The polygon is oriented counter-clockwise first, then its exterior ring is
/// written as `lon1,lat1,lon2,lat2,...` with five decimals per coordinate.
pub fn format_polygon(polygon: &Polygon<f64>) -> Result<String> {
    if polygon.exterior().0.is_empty() {
        return Err(Is2Error::NoExteriorRing.into());
    }

    let oriented = polygon.orient(Direction::Default);
    let formatted = oriented
        .exterior()
        .coords()
        .flat_map(|c| [c.x, c.y])
        .map(|v| format!("{:.5}", v))
        .collect::<Vec<_>>()
        .join(",");

    Ok(formatted)
}

/// Iteratively simplify `polygon` until its formatted string fits `options.limit`
///
/// Each failed attempt multiplies the tolerance by `options.factor` and simplifies
/// the original polygon again, preserving topology. The input is returned as-is
/// when it already fits.
pub fn simplify_for_url(polygon: &Polygon<f64>, options: &SimplifyOptions) -> Result<Polygon<f64>> {
    let mut tolerance = options.tolerance;
    let mut simplified = polygon.clone();

    for attempt in 0..options.max_attempts {
        let len = format_polygon(&simplified)?.len();
        if len < options.limit {
            return Ok(simplified);
        }
        tolerance *= options.factor;
        debug!(
            "Polygon string has {} characters (limit {}), attempt {} with tolerance {}",
            len, options.limit, attempt, tolerance
        );
        simplified = topology_preserving_simplify(polygon, tolerance)?;
    }

    Err(Is2Error::SimplificationBudgetExceeded {
        limit: options.limit,
        attempts: options.max_attempts,
    }
    .into())
}

/// Topology-preserving Douglas-Peucker simplification through GEOS
fn topology_preserving_simplify(polygon: &Polygon<f64>, tolerance: f64) -> Result<Polygon<f64>> {
    let geometry = Geometry::Polygon(polygon.clone());
    let geos_geom =
        geos::Geometry::try_from(&geometry).context("Failed to convert polygon to GEOS")?;

    let simplified = geos_geom
        .topology_preserve_simplify(tolerance)
        .context("GEOS topology preserving simplification failed")?;

    let geo_geom: Geometry<f64> = simplified
        .try_into()
        .context("Failed to convert GEOS geometry to geo")?;

    polygon_from_geometry(geo_geom)
}

/// Extract the polygon of a geometry, failing for any other geometry type
pub fn polygon_from_geometry(geometry: Geometry<f64>) -> Result<Polygon<f64>> {
    let kind = match geometry {
        Geometry::Polygon(polygon) => return Ok(polygon),
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    };
    Err(Is2Error::NotAPolygon(kind).into())
}
