//! Street network graph
//!
//! Segment endpoints become graph nodes (endpoints closer than the snap tolerance are
//! merged) and every segment becomes an undirected edge weighted by its length. The
//! network answers nearest-node queries through an R-tree and shortest-path queries
//! through Dijkstra.

use crate::spatial::{PointItem, PointSnapper};
use crate::{GeoTable, Result, utils};
use geo::{Coord, Distance, Euclidean, Geometry, Length, Point};
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use rstar::RTree;
use std::collections::{BTreeSet, HashMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for street network construction
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkConfig {
    /// Column holding segment lengths; rows without a usable value fall back to the
    /// planar geometry length. Default: "length"
    pub length_col: String,
    /// Endpoints closer than this are merged into one node. Default: 1e-6
    pub snap_tolerance: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            length_col: "length".to_string(),
            snap_tolerance: 1e-6,
        }
    }
}

/// Payload for a network edge
#[derive(Debug, Clone, Copy)]
pub struct SegmentEdge {
    /// Row of the segment in the source table
    pub segment: usize,
    /// Length weight used for shortest paths
    pub length: f64,
}

/// Undirected weighted graph of street segments
pub struct StreetNetwork {
    graph: UnGraph<Point<f64>, SegmentEdge>,
    /// End nodes of each segment row (None for empty geometries)
    segment_nodes: Vec<Option<(NodeIndex, NodeIndex)>>,
    /// Node positions, with the node index as data
    node_tree: RTree<PointItem>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl StreetNetwork {
    /// Build the network from a table of linear geometries
    pub fn from_segments(segments: &GeoTable, config: &NetworkConfig) -> Result<Self> {
        segments.ensure_linear("segments")?;

        let mut snapper = PointSnapper::new(config.snap_tolerance);
        let ends: Vec<Option<(usize, usize)>> = segments
            .geometries()
            .iter()
            .map(|geometry| {
                let (start, end) = endpoints(geometry)?;
                Some((snapper.snap(start), snapper.snap(end)))
            })
            .collect();

        // Snapper ids are dense and in insertion order, so they double as node indices
        let (positions, node_tree) = snapper.into_parts();
        let mut graph: UnGraph<Point<f64>, SegmentEdge> = UnGraph::default();
        for c in positions {
            graph.add_node(Point::from(c));
        }

        let lengths = segments.column(&config.length_col);
        let mut segment_nodes = Vec::with_capacity(segments.len());
        for (row, (geometry, ends)) in segments.geometries().iter().zip(ends).enumerate() {
            let Some((a, b)) = ends else {
                segment_nodes.push(None);
                continue;
            };
            let (a, b) = (NodeIndex::new(a), NodeIndex::new(b));
            let length = lengths
                .and_then(|values| values[row].as_f64())
                .filter(|l| l.is_finite() && *l >= 0.0)
                .unwrap_or_else(|| {
                    utils::line_strings(geometry)
                        .iter()
                        .map(|ls| Euclidean.length(ls))
                        .sum()
                });
            graph.add_edge(a, b, SegmentEdge { segment: row, length });
            segment_nodes.push(Some((a, b)));
        }

        tracing::debug!(
            "Street network: {} nodes, {} edges from {} segments",
            graph.node_count(),
            graph.edge_count(),
            segments.len()
        );

        Ok(Self {
            graph,
            segment_nodes,
            node_tree,
        })
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    #[inline]
    pub fn node_position(&self, node: NodeIndex) -> Option<Point<f64>> {
        self.graph.node_weight(node).copied()
    }

    /// End nodes of a segment row
    #[inline]
    pub fn segment_nodes(&self, row: usize) -> Option<(NodeIndex, NodeIndex)> {
        self.segment_nodes.get(row).copied().flatten()
    }

    /// Nearest node to `point` and its Euclidean distance
    ///
    /// Among equidistant nodes the lowest node index wins.
    pub fn nearest_node(&self, point: Point<f64>) -> Option<(NodeIndex, f64)> {
        let query = [point.x(), point.y()];
        let mut candidates = self.node_tree.nearest_neighbor_iter_with_distance_2(&query);
        let (first, best_d2) = candidates.next()?;
        let mut best = first.data;
        for (item, d2) in candidates {
            if d2 > best_d2 {
                break;
            }
            best = best.min(item.data);
        }
        Some((NodeIndex::new(best), best_d2.sqrt()))
    }

    /// Shortest network distance from `source` to every reachable node
    pub fn shortest_path_lengths(&self, source: NodeIndex) -> HashMap<NodeIndex, f64> {
        if self.graph.node_weight(source).is_none() {
            return HashMap::new();
        }
        dijkstra(&self.graph, source, None, |e| e.weight().length)
            .into_iter()
            .collect()
    }

    /// Pairs of segments sharing a junction, with the deflection angle between them
    ///
    /// This is the dual graph of the network: segments become nodes, linked when they
    /// meet at an endpoint. Each unordered pair is reported once, lower row first.
    pub fn dual_edges(&self, segments: &GeoTable) -> Vec<(usize, usize, f64)> {
        let mut pairs = BTreeSet::new();
        let mut result = Vec::new();
        for node in self.graph.node_indices() {
            let incident: BTreeSet<usize> = self
                .graph
                .edges(node)
                .map(|e| e.weight().segment)
                .collect();
            let incident: Vec<usize> = incident.into_iter().collect();
            for (i, &a) in incident.iter().enumerate() {
                for &b in &incident[i + 1..] {
                    if !pairs.insert((a, b)) {
                        continue;
                    }
                    let angle = junction_angle(
                        &segments.geometries()[a],
                        &segments.geometries()[b],
                        self.graph[node].0,
                    );
                    result.push((a, b, angle));
                }
            }
        }
        result.sort_by_key(|&(a, b, _)| (a, b));
        result
    }
}

/// First and last coordinate of a linear geometry
fn endpoints(geometry: &Geometry<f64>) -> Option<(Coord<f64>, Coord<f64>)> {
    let lines = utils::line_strings(geometry);
    let start = lines.iter().find_map(|ls| ls.0.first().copied())?;
    let end = lines.iter().rev().find_map(|ls| ls.0.last().copied())?;
    Some((start, end))
}

/// Deflection angle between two segments meeting at `junction`
fn junction_angle(a: &Geometry<f64>, b: &Geometry<f64>, junction: Coord<f64>) -> f64 {
    match (approach(a, junction), approach(b, junction)) {
        // Arrive along `a`, leave along `b` (reverse its approach direction)
        (Some(from), Some(to)) => utils::deflection_angle(from, junction, to),
        _ => 0.0,
    }
}

/// Coordinate next to the endpoint of `geometry` that lies closest to `junction`
fn approach(geometry: &Geometry<f64>, junction: Coord<f64>) -> Option<Coord<f64>> {
    let (start, end) = endpoints(geometry)?;
    let dist = |c: Coord<f64>| Euclidean.distance(c, junction);
    let coords: Vec<Coord<f64>> = utils::line_strings(geometry)
        .into_iter()
        .flat_map(|ls| ls.0)
        .collect();
    if dist(start) <= dist(end) {
        coords.iter().copied().find(|&c| dist(c) > 0.0)
    } else {
        coords.iter().rev().copied().find(|&c| dist(c) > 0.0)
    }
}
