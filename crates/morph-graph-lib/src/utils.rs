//! Utility functions for coordinate conversions and boundary geometry

use geo::{Centroid, Coord, Geometry, Line, LineString};

/// Web Mercator bounds in meters (EPSG:3857)
pub const EARTH_MERCATOR_MAX: f64 = 20037508.34;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Precomputed constant: EARTH_MERCATOR_MAX / 180.0
const LON_TO_X_FACTOR: f64 = EARTH_MERCATOR_MAX / 180.0;

/// Precomputed constant: EARTH_MERCATOR_MAX / PI
const Y_FACTOR: f64 = EARTH_MERCATOR_MAX / std::f64::consts::PI;

/// Precomputed constant: 180.0 / EARTH_MERCATOR_MAX
const X_TO_LON_FACTOR: f64 = 180.0 / EARTH_MERCATOR_MAX;

/// Precomputed constant: PI / EARTH_MERCATOR_MAX
const Y_TO_LAT_FACTOR: f64 = std::f64::consts::PI / EARTH_MERCATOR_MAX;

/// Convert a WGS84 coordinate (x = lon, y = lat) to Web Mercator meters
///
/// Latitudes are clamped to the valid Web Mercator range.
#[inline(always)]
pub fn wgs84_to_mercator(c: Coord<f64>) -> Coord<f64> {
    let lat = c.y.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let lat_rad = lat.to_radians();
    Coord {
        x: c.x * LON_TO_X_FACTOR,
        y: (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() * Y_FACTOR,
    }
}

/// Convert a Web Mercator coordinate in meters to WGS84 (x = lon, y = lat)
#[inline(always)]
pub fn mercator_to_wgs84(c: Coord<f64>) -> Coord<f64> {
    Coord {
        x: c.x * X_TO_LON_FACTOR,
        y: (std::f64::consts::PI / 2.0 - 2.0 * ((-c.y * Y_TO_LAT_FACTOR).exp()).atan())
            .to_degrees(),
    }
}

/// All linestrings of a linear geometry (empty for other geometry kinds)
pub fn line_strings(geometry: &Geometry<f64>) -> Vec<LineString<f64>> {
    match geometry {
        Geometry::Line(l) => vec![LineString::from(vec![l.start, l.end])],
        Geometry::LineString(ls) => vec![ls.clone()],
        Geometry::MultiLineString(mls) => mls.0.clone(),
        Geometry::GeometryCollection(gc) => gc.iter().flat_map(line_strings).collect(),
        _ => Vec::new(),
    }
}

/// All straight pieces of the boundary of a geometry
///
/// For polygons these are the exterior and interior rings, for lines the line pieces.
pub fn boundary_lines(geometry: &Geometry<f64>) -> Vec<Line<f64>> {
    match geometry {
        Geometry::Polygon(p) => std::iter::once(p.exterior())
            .chain(p.interiors())
            .flat_map(|ring| ring.lines())
            .collect(),
        Geometry::MultiPolygon(mp) => mp
            .iter()
            .flat_map(|p| boundary_lines(&Geometry::Polygon(p.clone())))
            .collect(),
        Geometry::Rect(r) => boundary_lines(&Geometry::Polygon(r.to_polygon())),
        Geometry::Triangle(t) => boundary_lines(&Geometry::Polygon(t.to_polygon())),
        other => line_strings(other).iter().flat_map(|ls| ls.lines()).collect(),
    }
}

/// Deflection angle in degrees when travelling `a -> b -> c`
///
/// 0 means straight ahead, 180 means a full reversal.
pub fn deflection_angle(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> f64 {
    let (ux, uy) = (b.x - a.x, b.y - a.y);
    let (vx, vy) = (c.x - b.x, c.y - b.y);
    let nu = ux.hypot(uy);
    let nv = vx.hypot(vy);
    if nu == 0.0 || nv == 0.0 {
        return 0.0;
    }
    let cos = ((ux * vx + uy * vy) / (nu * nv)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Straight line between the centroids of two geometries
///
/// Falls back to an empty geometry collection when either centroid is undefined.
pub fn connecting_line(a: &Geometry<f64>, b: &Geometry<f64>) -> Geometry<f64> {
    match (a.centroid(), b.centroid()) {
        (Some(pa), Some(pb)) => Geometry::LineString(LineString::from(vec![pa.0, pb.0])),
        _ => Geometry::GeometryCollection(Default::default()),
    }
}
