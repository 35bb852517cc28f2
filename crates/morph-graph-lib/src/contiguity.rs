//! Polygon contiguity (queen and rook)

use crate::spatial::GeometryIndex;
use crate::{MorphError, utils};
use geo::{BoundingRect, Distance, Euclidean, Geometry, Length, Line};
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Distance under which two boundaries are considered to touch
pub const CONTIGUITY_TOLERANCE: f64 = 1e-6;

/// Rule deciding whether two polygons are neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Contiguity {
    /// Any shared boundary point
    #[default]
    Queen,
    /// A shared boundary stretch of non-zero length
    Rook,
}

impl FromStr for Contiguity {
    type Err = MorphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queen" => Ok(Contiguity::Queen),
            "rook" => Ok(Contiguity::Rook),
            _ => Err(MorphError::InvalidContiguity(s.to_string())),
        }
    }
}

impl fmt::Display for Contiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contiguity::Queen => write!(f, "queen"),
            Contiguity::Rook => write!(f, "rook"),
        }
    }
}

/// Unordered pairs of neighboring geometries, as `(lower row, higher row)` in ascending
/// order
pub fn contiguity_pairs(
    geometries: &[&Geometry<f64>],
    contiguity: Contiguity,
    tolerance: f64,
) -> Vec<(usize, usize)> {
    #[cfg(feature = "profiling")]
    profiling::scope!("contiguity::contiguity_pairs");

    let boundaries: Vec<Vec<Line<f64>>> =
        geometries.iter().map(|g| utils::boundary_lines(g)).collect();
    let index = GeometryIndex::new(geometries.to_vec());

    let mut pairs: Vec<(usize, usize)> = (0..geometries.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let candidates = geometries[i]
                .bounding_rect()
                .map(|rect| index.candidates(rect, tolerance))
                .unwrap_or_default();
            let boundaries = &boundaries;
            candidates
                .into_iter()
                .filter(move |&j| j > i)
                .filter(move |&j| match contiguity {
                    Contiguity::Queen => touches(&boundaries[i], &boundaries[j], tolerance),
                    Contiguity::Rook => {
                        shared_length(&boundaries[i], &boundaries[j], tolerance) > tolerance
                    }
                })
                .map(move |j| (i, j))
        })
        .collect();
    pairs.sort_unstable();
    pairs
}

fn touches(a: &[Line<f64>], b: &[Line<f64>], tolerance: f64) -> bool {
    a.iter()
        .any(|la| b.iter().any(|lb| Euclidean.distance(la, lb) <= tolerance))
}

fn shared_length(a: &[Line<f64>], b: &[Line<f64>], tolerance: f64) -> f64 {
    a.iter()
        .flat_map(|la| b.iter().map(move |lb| collinear_overlap(la, lb, tolerance)))
        .sum()
}

/// Length along `a` covered by `b`, when `b` lies on the line through `a`
fn collinear_overlap(a: &Line<f64>, b: &Line<f64>, tolerance: f64) -> f64 {
    let d = a.delta();
    let len = Euclidean.length(a);
    if len == 0.0 {
        return 0.0;
    }
    let (ux, uy) = (d.x / len, d.y / len);
    let offset = |c: geo::Coord<f64>| ((c.y - a.start.y) * ux - (c.x - a.start.x) * uy).abs();
    if offset(b.start) > tolerance || offset(b.end) > tolerance {
        return 0.0;
    }
    let along = |c: geo::Coord<f64>| (c.x - a.start.x) * ux + (c.y - a.start.y) * uy;
    let (s0, s1) = (along(b.start), along(b.end));
    (s0.max(s1).min(len) - s0.min(s1).max(0.0)).max(0.0)
}
