//! Export of a morphological graph as a single heterogeneous petgraph graph
//!
//! Node tables are appended kind by kind, so every kind occupies a contiguous block of
//! node indices starting at its offset. Edge tables are resolved through per-kind maps
//! from identifier to node index.

use crate::table::IdKey;
use crate::{EdgeType, GeoTable, MorphError, MorphologicalGraph, NodeKind, Result, Value};
use geo::{Centroid, Geometry, Point};
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{BTreeMap, HashMap};

/// Node of a [`HeteroGraph`]
#[derive(Debug, Clone, PartialEq)]
pub struct HeteroNode {
    pub kind: NodeKind,
    /// Identifier taken from the node table
    pub id: Value,
    /// Centroid of the node geometry
    pub position: Option<Point<f64>>,
}

/// Edge of a [`HeteroGraph`]
#[derive(Debug, Clone, PartialEq)]
pub struct HeteroEdge {
    pub edge_type: EdgeType,
    pub geometry: Geometry<f64>,
}

/// All node kinds and relations of a morphological graph in one undirected graph
#[derive(Debug, Clone)]
pub struct HeteroGraph {
    pub graph: UnGraph<HeteroNode, HeteroEdge>,
    /// First node index of every kind
    pub offsets: BTreeMap<NodeKind, usize>,
    ids: BTreeMap<NodeKind, HashMap<IdKey, NodeIndex>>,
}

impl HeteroGraph {
    #[inline]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node index of the node of `kind` with identifier `id`
    pub fn node_index(&self, kind: NodeKind, id: &Value) -> Option<NodeIndex> {
        self.ids.get(&kind)?.get(&id.id_key()?).copied()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MorphologicalGraph {
    /// Merge all node and edge tables into a [`HeteroGraph`]
    ///
    /// Node identifiers are read from `id_columns` (per node kind), which must hold unique
    /// non-null values. The first two columns of every edge table are taken as the source
    /// and target identifiers; edges naming an unknown node are skipped.
    pub fn to_hetero_graph(&self, id_columns: &BTreeMap<NodeKind, String>) -> Result<HeteroGraph> {
        let mut graph: UnGraph<HeteroNode, HeteroEdge> = UnGraph::default();
        let mut offsets = BTreeMap::new();
        let mut ids: BTreeMap<NodeKind, HashMap<IdKey, NodeIndex>> = BTreeMap::new();

        for (&kind, table) in &self.nodes {
            let column = id_columns.get(&kind).map_or("", String::as_str);
            let values = table.column(column).ok_or_else(|| MorphError::InvalidIdColumn {
                column: column.to_string(),
                reason: format!("not found in {kind} node table"),
            })?;
            offsets.insert(kind, graph.node_count());
            let map = ids.entry(kind).or_default();
            for (value, geometry) in values.iter().zip(table.geometries()) {
                let key = value.id_key().ok_or_else(|| MorphError::InvalidIdColumn {
                    column: column.to_string(),
                    reason: format!("{kind} node has no usable identifier ({value})"),
                })?;
                let node = graph.add_node(HeteroNode {
                    kind,
                    id: value.clone(),
                    position: geometry.centroid(),
                });
                if map.insert(key, node).is_some() {
                    return Err(MorphError::InvalidIdColumn {
                        column: column.to_string(),
                        reason: format!("duplicate {kind} identifier {value}"),
                    });
                }
            }
        }

        for (edge_type, table) in &self.edges {
            let skipped = add_edges(&mut graph, &ids, edge_type, table);
            if skipped > 0 {
                tracing::debug!("Skipped {} {} edges with unknown endpoints", skipped, edge_type);
            }
        }

        tracing::debug!(
            "Hetero graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(HeteroGraph {
            graph,
            offsets,
            ids,
        })
    }
}

/// Add the edges of one table, returning how many rows could not be resolved
fn add_edges(
    graph: &mut UnGraph<HeteroNode, HeteroEdge>,
    ids: &BTreeMap<NodeKind, HashMap<IdKey, NodeIndex>>,
    edge_type: &EdgeType,
    table: &GeoTable,
) -> usize {
    let [source, target] = match table.columns() {
        [source, target, ..] => [&source.values, &target.values],
        _ => return table.len(),
    };
    let (Some(sources), Some(targets)) = (ids.get(&edge_type.source), ids.get(&edge_type.target))
    else {
        return table.len();
    };

    let mut skipped = 0;
    for (row, geometry) in table.geometries().iter().enumerate() {
        let resolve = |values: &[Value], map: &HashMap<IdKey, NodeIndex>| {
            values[row].id_key().and_then(|key| map.get(&key).copied())
        };
        match (resolve(source, sources), resolve(target, targets)) {
            (Some(a), Some(b)) => {
                graph.add_edge(
                    a,
                    b,
                    HeteroEdge {
                        edge_type: edge_type.clone(),
                        geometry: geometry.clone(),
                    },
                );
            }
            _ => skipped += 1,
        }
    }
    skipped
}
