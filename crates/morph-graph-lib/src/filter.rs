//! Filtering of tessellation cells and street segments
//!
//! Two filters decide which cells of private space are relevant to the streets:
//!
//! - **Adjacency**: Euclidean, based on intersection with or distance to segments,
//!   scoped to enclosure groups when the tessellation carries them
//! - **Network distance**: shortest-path distance along the street network from a center
//!   point, plus the straight-line offset from each cell centroid to its nearest node

use crate::spatial::GeometryIndex;
use crate::{ENCLOSURE_INDEX, GeoTable, NetworkConfig, Result, StreetNetwork};
use geo::{Centroid, Point};
use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum distance between a tessellation cell and the street segments
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TessellationDistance {
    /// No filtering at all
    #[default]
    Unlimited,
    /// Keep cells intersecting at least one segment
    Intersecting,
    /// Keep cells whose centroid is within this distance of the nearest segment
    Within(f64),
}

/// Retain the tessellation cells that are relevant to the street segments
///
/// With [`TessellationDistance::Within`] and an [`ENCLOSURE_INDEX`] column, every
/// enclosure only measures against the segments intersecting its own cells; enclosures
/// touching no segment are dropped entirely. Empty inputs leave the tessellation
/// unfiltered.
pub fn filter_adjacent_tessellation(
    tessellation: &GeoTable,
    segments: &GeoTable,
    max_distance: TessellationDistance,
) -> GeoTable {
    #[cfg(feature = "profiling")]
    profiling::scope!("filter::filter_adjacent_tessellation");

    if tessellation.is_empty() || segments.is_empty() {
        return tessellation.clone();
    }

    let index = GeometryIndex::new(segments.geometries().iter().collect());
    let kept: Vec<usize> = match max_distance {
        TessellationDistance::Unlimited => return tessellation.clone(),
        TessellationDistance::Intersecting => tessellation
            .geometries()
            .iter()
            .enumerate()
            .filter(|(_, cell)| !index.intersecting(cell).is_empty())
            .map(|(row, _)| row)
            .collect(),
        TessellationDistance::Within(distance) => {
            let mut kept = Vec::new();
            for rows in groups(tessellation).into_values() {
                kept.extend(within_distance(tessellation, &index, &rows, distance));
            }
            kept.sort_unstable();
            kept
        }
    };

    tracing::debug!(
        "Adjacency filter ({:?}) kept {} of {} cells",
        max_distance,
        kept.len(),
        tessellation.len()
    );
    tessellation.take(&kept)
}

/// Rows of the tessellation grouped by enclosure
///
/// Without an enclosure column (or for rows with a null enclosure) all rows form a
/// single group that measures against every segment.
fn groups(tessellation: &GeoTable) -> BTreeMap<Option<i64>, Vec<usize>> {
    let mut groups: BTreeMap<Option<i64>, Vec<usize>> = BTreeMap::new();
    let enclosures = tessellation.column(ENCLOSURE_INDEX);
    for row in 0..tessellation.len() {
        let key = enclosures.and_then(|values| values[row].as_i64());
        groups.entry(key).or_default().push(row);
    }
    groups
}

fn within_distance(
    tessellation: &GeoTable,
    index: &GeometryIndex<'_>,
    rows: &[usize],
    distance: f64,
) -> Vec<usize> {
    let grouped = tessellation.has_column(ENCLOSURE_INDEX)
        && rows
            .first()
            .and_then(|&r| tessellation.value(r, ENCLOSURE_INDEX))
            .is_some_and(|v| !v.is_null());

    let allowed: Option<BTreeSet<usize>> = grouped.then(|| {
        rows.iter()
            .flat_map(|&r| index.intersecting(&tessellation.geometries()[r]))
            .collect()
    });
    if allowed.as_ref().is_some_and(BTreeSet::is_empty) {
        return Vec::new();
    }

    rows.iter()
        .copied()
        .filter(|&row| {
            let Some(centroid) = tessellation.geometries()[row].centroid() else {
                return false;
            };
            index
                .nearest_line_distance(centroid, |seg| {
                    allowed.as_ref().is_none_or(|set| set.contains(&seg))
                })
                .is_some_and(|d| d <= distance)
        })
        .collect()
}

/// Retain the tessellation cells within `max_distance` network distance of `center`
///
/// A cell's distance is the shortest-path distance from the node nearest `center` to
/// the node nearest the cell centroid, plus the Euclidean offset between the centroid and
/// that node. Unreachable nodes count as infinitely far. A network without nodes leaves
/// the tessellation unfiltered.
pub fn filter_tessellation_by_network_distance(
    tessellation: &GeoTable,
    segments: &GeoTable,
    center: Point<f64>,
    max_distance: f64,
    config: &NetworkConfig,
) -> Result<GeoTable> {
    #[cfg(feature = "profiling")]
    profiling::scope!("filter::filter_tessellation_by_network_distance");

    let network = StreetNetwork::from_segments(segments, config)?;
    if network.is_empty() {
        tracing::debug!("Street network has no nodes; network distance filter skipped");
        return Ok(tessellation.clone());
    }

    let Some((start, _)) = network.nearest_node(center) else {
        return Ok(tessellation.empty_like());
    };
    let distances = network.shortest_path_lengths(start);

    let kept: Vec<usize> = tessellation
        .geometries()
        .iter()
        .enumerate()
        .filter(|(_, cell)| {
            let total = cell
                .centroid()
                .and_then(|c| network.nearest_node(c))
                .and_then(|(node, offset)| distances.get(&node).map(|d| d + offset))
                .unwrap_or(f64::INFINITY);
            total <= max_distance
        })
        .map(|(row, _)| row)
        .collect();

    tracing::debug!(
        "Network distance filter kept {} of {} cells within {}",
        kept.len(),
        tessellation.len(),
        max_distance
    );
    Ok(tessellation.take(&kept))
}

/// Retain the segments whose both ends lie within `distance` network distance of the
/// node nearest `center`
pub fn filter_segments_by_network_distance(
    segments: &GeoTable,
    center: Point<f64>,
    distance: f64,
    config: &NetworkConfig,
) -> Result<GeoTable> {
    let network = StreetNetwork::from_segments(segments, config)?;
    let Some((start, _)) = network.nearest_node(center) else {
        return Ok(segments.clone());
    };
    let distances = network.shortest_path_lengths(start);
    let within = |node| distances.get(&node).is_some_and(|&d| d <= distance);

    let kept: Vec<usize> = (0..segments.len())
        .filter(|&row| {
            network
                .segment_nodes(row)
                .is_some_and(|(a, b)| within(a) && within(b))
        })
        .collect();

    tracing::debug!(
        "Segment pre-filter kept {} of {} segments within {}",
        kept.len(),
        segments.len(),
        distance
    );
    Ok(segments.take(&kept))
}
