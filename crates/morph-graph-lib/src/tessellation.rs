//! Enclosed tessellation of private space
//!
//! Street barriers (plus the extent boundary) are polygonized into enclosures. Each
//! enclosure is then divided between the buildings it contains. Building boundaries are
//! densified into sample points, the Voronoi cells of the samples are merged per
//! building, and every footprint is added to its own cell and cut out of all others, so
//! a building always lies within the cell it generates. Enclosures without buildings are
//! kept whole as a single cell.

use crate::spatial::{GeometryIndex, PointItem, PointSnapper};
use crate::{GeoTable, Result, Value, polygonize, utils};
use geo::orient::{Direction, Orient};
use geo::{
    Area, BooleanOps, BoundingRect, Coord, Densify, Distance, Euclidean, Geometry,
    InteriorPoint, Intersects, LineString, MultiPolygon, Polygon, Rect, coord, unary_union,
};
use rayon::prelude::*;
use rstar::RTree;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Column holding the enclosure a tessellation cell belongs to
pub const ENCLOSURE_INDEX: &str = "enclosure_index";

/// Column holding the row of the building that generated a cell (null for empty enclosures)
pub const BUILDING_INDEX: &str = "building_index";

/// Configuration for tessellation
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TessellationConfig {
    /// Distance by which the extent of the inputs is grown before it closes the outermost
    /// enclosures, in CRS units. Default: 100.0
    pub extent_margin: f64,
    /// Endpoints closer than this are merged when noding barriers. Default: 1e-6
    pub snap_tolerance: f64,
    /// Maximum spacing of the sample points placed along building boundaries, in CRS
    /// units. Default: 0.5
    pub segment_length: f64,
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self {
            extent_margin: 100.0,
            snap_tolerance: 1e-6,
            segment_length: 0.5,
        }
    }
}

/// A cell before it is written into a table
struct Cell {
    enclosure: usize,
    building: Option<usize>,
    geometry: Geometry<f64>,
}

/// Geometry used to bound tessellation cells, one entry per segment
///
/// Uses `barrier_col` when the column exists and differs from the primary geometry;
/// otherwise the primary street geometry is used directly.
pub fn prepare_barriers(segments: &GeoTable, barrier_col: Option<&str>) -> Vec<Geometry<f64>> {
    let alternate = barrier_col.and_then(|col| segments.alternate_geometries(col));
    match alternate {
        Some(geoms) if geoms.iter().zip(segments.geometries()).any(|(a, p)| *a != p) => {
            geoms.into_iter().cloned().collect()
        }
        _ => {
            if let Some(col) = barrier_col {
                tracing::debug!("Barrier column '{}' unavailable; using street geometry", col);
            }
            segments.geometries().to_vec()
        }
    }
}

/// Build the enclosed tessellation of `buildings` bounded by the street `segments`
///
/// The result has one polygon row per cell with [`ENCLOSURE_INDEX`] and
/// [`BUILDING_INDEX`] columns, ordered by enclosure and then by building, and inherits
/// the CRS of the buildings.
pub fn create_tessellation(
    buildings: &GeoTable,
    segments: &GeoTable,
    barrier_col: Option<&str>,
    config: &TessellationConfig,
) -> Result<GeoTable> {
    #[cfg(feature = "profiling")]
    profiling::scope!("tessellation::create_tessellation");

    buildings.ensure_polygonal("buildings")?;
    segments.ensure_linear("segments")?;

    let empty = GeoTable::new(Vec::new())
        .with_crs(buildings.crs().cloned())
        .with_column(ENCLOSURE_INDEX, Vec::new())?
        .with_column(BUILDING_INDEX, Vec::new())?;
    if buildings.is_empty() {
        tracing::debug!("No buildings; tessellation is empty");
        return Ok(empty);
    }

    let barriers = prepare_barriers(segments, barrier_col);
    let Some(extent) = extent(buildings.geometries().iter().chain(&barriers)) else {
        return Ok(empty);
    };
    let margin = config.extent_margin.max(config.snap_tolerance * 10.0);
    let extent = Rect::new(
        coord! { x: extent.min().x - margin, y: extent.min().y - margin },
        coord! { x: extent.max().x + margin, y: extent.max().y + margin },
    );

    let mut linework: Vec<LineString<f64>> = barriers.iter().flat_map(utils::line_strings).collect();
    linework.push(extent.to_polygon().exterior().clone());
    let enclosures = polygonize(&linework, config.snap_tolerance);
    tracing::debug!(
        "Polygonized {} barrier lines into {} enclosures",
        linework.len(),
        enclosures.len()
    );

    let members = assign_buildings(buildings, &enclosures);
    let footprints: Vec<MultiPolygon<f64>> =
        buildings.geometries().iter().map(footprint).collect();
    let spacing = config
        .segment_length
        .max(config.snap_tolerance * 10.0)
        .max(f64::EPSILON);

    let cells: Vec<Cell> = enclosures
        .par_iter()
        .enumerate()
        .flat_map_iter(|(e, enclosure)| {
            enclosure_cells(
                e,
                enclosure,
                &members[e],
                &footprints,
                spacing,
                config.snap_tolerance,
            )
        })
        .collect();

    let mut geometry = Vec::with_capacity(cells.len());
    let mut enclosure_index = Vec::with_capacity(cells.len());
    let mut building_index = Vec::with_capacity(cells.len());
    for cell in cells {
        geometry.push(cell.geometry);
        enclosure_index.push(Value::from(cell.enclosure));
        building_index.push(Value::from(cell.building));
    }

    tracing::debug!("Tessellation has {} cells", geometry.len());
    GeoTable::new(geometry)
        .with_crs(buildings.crs().cloned())
        .with_column(ENCLOSURE_INDEX, enclosure_index)?
        .with_column(BUILDING_INDEX, building_index)
}

fn extent<'a>(geometries: impl Iterator<Item = &'a Geometry<f64>>) -> Option<Rect<f64>> {
    geometries
        .filter_map(|g| g.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        })
}

/// Buildings of every enclosure, by the first enclosure hit by the building's interior point
fn assign_buildings(buildings: &GeoTable, enclosures: &[Polygon<f64>]) -> Vec<Vec<usize>> {
    let enclosure_geoms: Vec<Geometry<f64>> =
        enclosures.iter().cloned().map(Geometry::Polygon).collect();
    let index = GeometryIndex::new(enclosure_geoms.iter().collect());

    let mut members = vec![Vec::new(); enclosures.len()];
    for (row, building) in buildings.geometries().iter().enumerate() {
        let hit = building
            .interior_point()
            .and_then(|p| index.intersecting(&Geometry::Point(p)).first().copied());
        match hit {
            Some(e) => members[e].push(row),
            None => tracing::warn!("Building {} lies outside every enclosure; skipped", row),
        }
    }
    members
}

/// Footprint as a counter-clockwise multipolygon (empty for non-polygonal geometries)
fn footprint(geometry: &Geometry<f64>) -> MultiPolygon<f64> {
    let polygons = match geometry {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        _ => Vec::new(),
    };
    MultiPolygon::new(polygons).orient(Direction::Default)
}

fn enclosure_cells(
    enclosure_idx: usize,
    enclosure: &Polygon<f64>,
    members: &[usize],
    footprints: &[MultiPolygon<f64>],
    spacing: f64,
    tolerance: f64,
) -> Vec<Cell> {
    if members.len() <= 1 {
        return vec![Cell {
            enclosure: enclosure_idx,
            building: members.first().copied(),
            geometry: Geometry::Polygon(enclosure.clone()),
        }];
    }
    let Some(bounds) = enclosure.bounding_rect() else {
        return Vec::new();
    };

    // Samples closer than the tolerance are kept once, for the first building
    let mut snapper = PointSnapper::new(tolerance);
    let mut owners: Vec<usize> = Vec::new();
    for &building in members {
        for line in utils::boundary_lines(&Geometry::MultiPolygon(footprints[building].clone())) {
            for c in Euclidean.densify(&line, spacing).0 {
                if snapper.snap(c) == owners.len() {
                    owners.push(building);
                }
            }
        }
    }
    let (samples, tree) = snapper.into_parts();

    let mut regions: BTreeMap<usize, Vec<Polygon<f64>>> = BTreeMap::new();
    for (sample, &building) in owners.iter().enumerate() {
        if let Some(region) = voronoi_region(&tree, &samples, sample, bounds) {
            regions.entry(building).or_default().push(region);
        }
    }

    members
        .iter()
        .filter_map(|&building| {
            let own = &footprints[building];
            let pieces = regions.get(&building)?;
            let merged = unary_union(own.iter().chain(pieces));
            let mut cell = enclosure.intersection(&merged);
            for &other in members.iter().filter(|&&o| o != building) {
                let other = &footprints[other];
                if cell.intersects(other) {
                    cell = cell.difference(other);
                }
            }

            let parts: Vec<Polygon<f64>> = cell
                .into_iter()
                .filter(|p| p.unsigned_area() > tolerance * tolerance)
                .collect();
            let geometry = match parts.len() {
                0 => return None,
                1 => Geometry::Polygon(parts.into_iter().next()?),
                _ => Geometry::MultiPolygon(MultiPolygon::new(parts)),
            };
            Some(Cell {
                enclosure: enclosure_idx,
                building: Some(building),
                geometry,
            })
        })
        .collect()
}

/// Voronoi cell of one sample within `bounds`
///
/// Neighbors are visited nearest first; once a neighbor is more than twice as far as the
/// farthest corner of the current cell, no further bisector can cut it.
fn voronoi_region(
    tree: &RTree<PointItem>,
    samples: &[Coord<f64>],
    sample: usize,
    bounds: Rect<f64>,
) -> Option<Polygon<f64>> {
    let seed = samples[sample];
    let mut region: Vec<Coord<f64>> = vec![
        bounds.min(),
        coord! { x: bounds.max().x, y: bounds.min().y },
        bounds.max(),
        coord! { x: bounds.min().x, y: bounds.max().y },
    ];
    for (item, d2) in tree.nearest_neighbor_iter_with_distance_2(&[seed.x, seed.y]) {
        if item.data == sample {
            continue;
        }
        let reach = region
            .iter()
            .map(|&c| Euclidean.distance(seed, c))
            .fold(0.0, f64::max);
        if d2 > 4.0 * reach * reach {
            break;
        }
        region = clip_half_plane(&region, seed, samples[item.data]);
        if region.len() < 3 {
            return None;
        }
    }
    Some(Polygon::new(LineString::new(region), vec![]))
}

/// Keep the part of a convex polygon closer to `seed` than to `other`
fn clip_half_plane(polygon: &[Coord<f64>], seed: Coord<f64>, other: Coord<f64>) -> Vec<Coord<f64>> {
    let mid = coord! { x: (seed.x + other.x) / 2.0, y: (seed.y + other.y) / 2.0 };
    let normal = coord! { x: other.x - seed.x, y: other.y - seed.y };
    let side = |c: Coord<f64>| (c.x - mid.x) * normal.x + (c.y - mid.y) * normal.y;

    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (k, &current) in polygon.iter().enumerate() {
        let next = polygon[(k + 1) % polygon.len()];
        let (sc, sn) = (side(current), side(next));
        if sc <= 0.0 {
            out.push(current);
        }
        if (sc < 0.0 && sn > 0.0) || (sc > 0.0 && sn < 0.0) {
            let t = sc / (sc - sn);
            let mut cut = coord! {
                x: current.x + (next.x - current.x) * t,
                y: current.y + (next.y - current.y) * t,
            };
            // Axis-aligned bisectors keep their exact coordinate
            if normal.y == 0.0 {
                cut.x = mid.x;
            }
            if normal.x == 0.0 {
                cut.y = mid.y;
            }
            out.push(cut);
        }
    }
    out
}
