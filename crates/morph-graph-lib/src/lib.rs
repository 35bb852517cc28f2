//! Morph Graph Library - Graphs of Urban Form
//!
//! This library turns building footprints and street segments into typed node and edge
//! tables describing the relations between *private* space (a tessellation of the land
//! around buildings) and *public* space (the street network).
//!
//! # Architecture
//!
//! - **[`GeoTable`]**: Tabular geometry collection (primary geometry + attribute columns + CRS)
//! - **[`create_tessellation`]**: Enclosed tessellation of buildings bounded by street barriers
//! - **[`StreetNetwork`]**: Weighted street graph with nearest-node lookup and shortest paths
//! - **[`filter_adjacent_tessellation`]** / **[`filter_tessellation_by_network_distance`]**:
//!   Euclidean and network-distance filtering of tessellation cells
//! - **[`private_to_private_graph`]**, **[`public_to_public_graph`]**,
//!   **[`private_to_public_graph`]**: The three relational graph builders
//! - **[`morphological_graph`]**: Orchestration of the whole pipeline
//!
//! # Pipeline
//!
//! buildings + segments → barriers → tessellation → adjacency filter →
//! (network-distance filter) → relational graphs → [`MorphologicalGraph`]

mod contiguity;
mod crs;
mod filter;
mod hetero;
mod ids;
mod morphology;
mod network;
mod polygonize;
mod relations;
mod spatial;
mod table;
mod tessellation;
pub mod utils;

// Public API exports
pub use contiguity::{CONTIGUITY_TOLERANCE, Contiguity, contiguity_pairs};
pub use crs::Crs;
pub use filter::{
    TessellationDistance, filter_adjacent_tessellation, filter_segments_by_network_distance,
    filter_tessellation_by_network_distance,
};
pub use hetero::{HeteroEdge, HeteroGraph, HeteroNode};
pub use ids::{IdSource, ensure_id_column};
pub use morphology::{
    CONNECTED_TO, CenterPoint, EdgeType, FACED_TO, MorphologicalGraph, MorphologyConfig,
    NodeKind, TOUCHED_TO, add_building_info, morphological_graph,
};
pub use network::{NetworkConfig, StreetNetwork};
pub use polygonize::polygonize;
pub use relations::{
    INTERFACE, private_to_private_graph, private_to_public_graph, public_to_public_graph,
};
pub use table::{Column, GEOMETRY_COLUMN, GeoTable, Value};
pub use tessellation::{
    BUILDING_INDEX, ENCLOSURE_INDEX, TessellationConfig, create_tessellation, prepare_barriers,
};

/// Error types for morphological graph construction
#[derive(Debug, thiserror::Error)]
pub enum MorphError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid contiguity '{0}': expected 'queen' or 'rook'")]
    InvalidContiguity(String),

    #[error("Invalid id column '{column}': {reason}")]
    InvalidIdColumn { column: String, reason: String },

    #[error("Column length mismatch for '{column}': expected {expected}, got {actual}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot reproject from {from} to {to}")]
    UnsupportedReprojection { from: Crs, to: Crs },

    #[error("Invalid CRS identifier: {0}")]
    InvalidCrs(String),
}

pub type Result<T> = std::result::Result<T, MorphError>;

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small synthetic inputs shared by the unit tests.

    use crate::{GeoTable, Value};
    use geo::{Geometry, LineString, Polygon, coord};

    pub fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(Polygon::new(
            LineString::from(vec![
                (x, y),
                (x + size, y),
                (x + size, y + size),
                (x, y + size),
                (x, y),
            ]),
            vec![],
        ))
    }

    pub fn line(points: &[(f64, f64)]) -> Geometry<f64> {
        Geometry::LineString(LineString::new(
            points.iter().map(|&(x, y)| coord! { x: x, y: y }).collect(),
        ))
    }

    /// Two unit squares left and right of a vertical street at x = 2
    pub fn two_squares() -> (GeoTable, GeoTable) {
        let buildings = GeoTable::new(vec![square(0.0, 0.0, 1.0), square(3.0, 0.0, 1.0)]);
        let segments = GeoTable::new(vec![line(&[(2.0, -1.0), (2.0, 2.0)])]);
        (buildings, segments)
    }

    /// A 3x3 block grid of streets with one building in the middle of every block
    pub fn grid_city() -> (GeoTable, GeoTable) {
        let mut streets = Vec::new();
        for i in 0..4 {
            let v = i as f64 * 10.0;
            streets.push(line(&[(v, 0.0), (v, 30.0)]));
            streets.push(line(&[(0.0, v), (30.0, v)]));
        }
        let mut footprints = Vec::new();
        let mut names = Vec::new();
        for bx in 0..3 {
            for by in 0..3 {
                footprints.push(square(bx as f64 * 10.0 + 3.0, by as f64 * 10.0 + 3.0, 4.0));
                names.push(Value::from(format!("b{bx}{by}")));
            }
        }
        let buildings = GeoTable::new(footprints)
            .with_column("name", names)
            .unwrap();
        (buildings, GeoTable::new(streets))
    }
}
