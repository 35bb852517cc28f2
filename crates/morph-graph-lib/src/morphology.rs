//! Morphological graph orchestration
//!
//! Ties the pipeline together: tessellation of private space, adjacency and network
//! distance filtering, and the three relational graphs between private cells and public
//! street segments.

use crate::spatial::GeometryIndex;
use crate::{
    BUILDING_INDEX, Contiguity, ENCLOSURE_INDEX, GeoTable, NetworkConfig, Result,
    TessellationConfig, TessellationDistance, Value, create_tessellation, ensure_id_column,
    filter_adjacent_tessellation, filter_segments_by_network_distance,
    filter_tessellation_by_network_distance, private_to_private_graph, private_to_public_graph,
    public_to_public_graph,
};
use geo::{Centroid, Geometry, Point};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Relation between adjacent tessellation cells
pub const TOUCHED_TO: &str = "touched_to";
/// Relation between street segments sharing a junction
pub const CONNECTED_TO: &str = "connected_to";
/// Relation between a tessellation cell and the street segment it faces
pub const FACED_TO: &str = "faced_to";

const DEFAULT_PRIVATE_ID: &str = "private_id";
const DEFAULT_PUBLIC_ID: &str = "public_id";
const BUILDING_GEOMETRY: &str = "building_geometry";

/// Kind of node in the morphological graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NodeKind {
    /// Tessellation cells
    Private,
    /// Street segments
    Public,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Private => write!(f, "private"),
            NodeKind::Public => write!(f, "public"),
        }
    }
}

/// `(source, relation, target)` key of an edge table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeType {
    pub source: NodeKind,
    pub relation: String,
    pub target: NodeKind,
}

impl EdgeType {
    pub fn new(source: NodeKind, relation: &str, target: NodeKind) -> Self {
        Self {
            source,
            relation: relation.to_string(),
            target,
        }
    }

    /// `(private, touched_to, private)`
    pub fn touched_to() -> Self {
        Self::new(NodeKind::Private, TOUCHED_TO, NodeKind::Private)
    }

    /// `(public, connected_to, public)`
    pub fn connected_to() -> Self {
        Self::new(NodeKind::Public, CONNECTED_TO, NodeKind::Public)
    }

    /// `(private, faced_to, public)`
    pub fn faced_to() -> Self {
        Self::new(NodeKind::Private, FACED_TO, NodeKind::Public)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.source, self.relation, self.target)
    }
}

/// Center of the network distance filter
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CenterPoint {
    Point(Point<f64>),
    /// Only the centroid of the first geometry is used
    Collection(Vec<Geometry<f64>>),
}

impl CenterPoint {
    /// The point distances are measured from, if one can be derived
    pub fn resolve(&self) -> Option<Point<f64>> {
        match self {
            CenterPoint::Point(p) => Some(*p),
            CenterPoint::Collection(geometries) => geometries.first()?.centroid(),
        }
    }
}

impl From<Point<f64>> for CenterPoint {
    fn from(p: Point<f64>) -> Self {
        CenterPoint::Point(p)
    }
}

/// Configuration for [`morphological_graph`]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MorphologyConfig {
    /// Center of the network distance filter. Default: None
    pub center_point: Option<CenterPoint>,
    /// Maximum network distance from the center. Default: None
    pub distance: Option<f64>,
    /// Identifier column of tessellation cells. Default: None (`private_id`)
    pub private_id_col: Option<String>,
    /// Identifier column of street segments. Default: None (`public_id`)
    pub public_id_col: Option<String>,
    /// Adjacency bound between cells and segments. Default: Unlimited
    pub tessellation_distance: TessellationDistance,
    /// Alternate segment geometry used as barriers. Default: `barrier_geometry`
    pub barrier_col: Option<String>,
    /// Neighbor rule between cells. Default: Queen
    pub contiguity: Contiguity,
    /// Copy building attributes onto their cells. Default: false
    pub keep_buildings: bool,
    pub tessellation: TessellationConfig,
    pub network: NetworkConfig,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            center_point: None,
            distance: None,
            private_id_col: None,
            public_id_col: None,
            tessellation_distance: TessellationDistance::Unlimited,
            barrier_col: Some("barrier_geometry".to_string()),
            contiguity: Contiguity::Queen,
            keep_buildings: false,
            tessellation: TessellationConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

/// Typed node and edge tables of a morphological graph
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MorphologicalGraph {
    pub nodes: BTreeMap<NodeKind, GeoTable>,
    pub edges: BTreeMap<EdgeType, GeoTable>,
}

impl MorphologicalGraph {
    #[inline]
    pub fn node_table(&self, kind: NodeKind) -> Option<&GeoTable> {
        self.nodes.get(&kind)
    }

    #[inline]
    pub fn edge_table(&self, edge_type: &EdgeType) -> Option<&GeoTable> {
        self.edges.get(edge_type)
    }
}

/// Build the morphological graph of `buildings` and street `segments`
///
/// Segments are reprojected to the CRS of the buildings when both carry a different one.
/// When both a center point and a distance are configured, segments are first reduced to
/// those reachable within the distance and cells are kept only within that network
/// distance of the center.
pub fn morphological_graph(
    buildings: &GeoTable,
    segments: &GeoTable,
    config: &MorphologyConfig,
) -> Result<MorphologicalGraph> {
    #[cfg(feature = "profiling")]
    profiling::scope!("morphology::morphological_graph");

    buildings.ensure_polygonal("buildings")?;
    segments.ensure_linear("segments")?;

    let segments = match (buildings.crs(), segments.crs()) {
        (Some(target), Some(source)) if target != source => {
            tracing::debug!("Reprojecting segments from {} to {}", source, target);
            segments.to_crs(target)?
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!("Only one of buildings and segments has a CRS; no reprojection done");
            segments.clone()
        }
        _ => segments.clone(),
    };

    let private_id_col = config.private_id_col.as_deref().unwrap_or(DEFAULT_PRIVATE_ID);
    let public_id_col = config.public_id_col.as_deref().unwrap_or(DEFAULT_PUBLIC_ID);
    let barrier_col = config.barrier_col.as_deref();

    let tessellation = create_tessellation(buildings, &segments, barrier_col, &config.tessellation)?;
    let (tessellation, _) = ensure_id_column(&tessellation, private_id_col)?;

    let center = config.center_point.as_ref().and_then(CenterPoint::resolve);
    let bound = center.zip(config.distance);
    if config.center_point.is_some() && center.is_none() {
        tracing::warn!("Center point has no centroid; network distance filter skipped");
    }

    let public = match bound {
        Some((center, distance)) => {
            filter_segments_by_network_distance(&segments, center, distance, &config.network)?
        }
        None => segments.clone(),
    };
    let (public, _) = ensure_id_column(&public, public_id_col)?;

    let mut tessellation =
        filter_adjacent_tessellation(&tessellation, &public, config.tessellation_distance);
    if let Some((center, distance)) = bound {
        tessellation = filter_tessellation_by_network_distance(
            &tessellation,
            &segments,
            center,
            distance,
            &config.network,
        )?;
    }
    if config.keep_buildings {
        tessellation = add_building_info(&tessellation, buildings)?;
    }

    let touched = private_to_private_graph(
        &tessellation,
        private_id_col,
        Some(ENCLOSURE_INDEX),
        config.contiguity,
    )?;
    let connected = public_to_public_graph(&public, public_id_col, &config.network)?;
    let faced =
        private_to_public_graph(&tessellation, &public, private_id_col, public_id_col, barrier_col)?;
    if faced.is_empty() {
        tracing::warn!(
            "No private-public edges between {} cells and {} segments",
            tessellation.len(),
            public.len()
        );
    }

    tracing::debug!(
        "Morphological graph: {} private, {} public nodes; {} / {} / {} edges",
        tessellation.len(),
        public.len(),
        touched.len(),
        connected.len(),
        faced.len()
    );

    let nodes = BTreeMap::from([(NodeKind::Private, tessellation), (NodeKind::Public, public)]);
    let edges = BTreeMap::from([
        (EdgeType::touched_to(), touched),
        (EdgeType::connected_to(), connected),
        (EdgeType::faced_to(), faced),
    ]);
    Ok(MorphologicalGraph { nodes, edges })
}

/// Copy the attributes of the generating building onto each tessellation cell
///
/// Cells without a usable [`BUILDING_INDEX`] take the first building they intersect. Every
/// building column is copied, renamed with a `_building` suffix when the tessellation
/// already has a column of that name, and the footprint is stored in
/// `building_geometry`. The number of cells never changes.
pub fn add_building_info(tessellation: &GeoTable, buildings: &GeoTable) -> Result<GeoTable> {
    let index = GeometryIndex::new(buildings.geometries().iter().collect());
    let generators = tessellation.column(BUILDING_INDEX);

    let sources: Vec<Option<usize>> = tessellation
        .geometries()
        .iter()
        .enumerate()
        .map(|(row, cell)| {
            generators
                .and_then(|values| values[row].as_i64())
                .and_then(|b| usize::try_from(b).ok())
                .filter(|&b| b < buildings.len())
                .or_else(|| index.intersecting(cell).first().copied())
        })
        .collect();

    let matched = sources.iter().filter(|s| s.is_some()).count();
    tracing::debug!(
        "Building info matched {} of {} cells",
        matched,
        tessellation.len()
    );

    let mut result = tessellation.clone();
    for column in buildings.columns() {
        let name = if tessellation.has_column(&column.name) {
            format!("{}_building", column.name)
        } else {
            column.name.clone()
        };
        let values = sources
            .iter()
            .map(|s| s.map_or(Value::Null, |b| column.values[b].clone()))
            .collect();
        result.set_column(&name, values)?;
    }
    let footprints = sources
        .iter()
        .map(|s| s.map_or(Value::Null, |b| Value::Geometry(buildings.geometries()[b].clone())))
        .collect();
    result.set_column(BUILDING_GEOMETRY, footprints)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{grid_city, line, square, two_squares};
    use crate::{Crs, INTERFACE, MorphError};

    #[test]
    fn test_two_squares_scenario() {
        let (buildings, segments) = two_squares();
        let graph = morphological_graph(&buildings, &segments, &MorphologyConfig::default()).unwrap();

        let private = graph.node_table(NodeKind::Private).unwrap();
        let public = graph.node_table(NodeKind::Public).unwrap();
        assert_eq!(private.len(), 2);
        assert_eq!(public.len(), 1);
        assert!(private.has_column("private_id"));
        assert!(public.has_column("public_id"));

        // The two Voronoi cells share the bisector under the street
        let touched = graph.edge_table(&EdgeType::touched_to()).unwrap();
        assert_eq!(touched.len(), 1);
        let faced = graph.edge_table(&EdgeType::faced_to()).unwrap();
        assert_eq!(faced.len(), 2);
        let connected = graph.edge_table(&EdgeType::connected_to()).unwrap();
        assert!(connected.is_empty());
        assert_eq!(
            connected.column_names(),
            vec!["from_public_id", "to_public_id", "angle"]
        );
    }

    #[test]
    fn test_edge_type_keys() {
        let graph = morphological_graph(
            &two_squares().0,
            &two_squares().1,
            &MorphologyConfig::default(),
        )
        .unwrap();
        let keys: Vec<String> = graph.edges.keys().map(ToString::to_string).collect();
        assert_eq!(
            keys,
            vec![
                "(private, faced_to, public)",
                "(private, touched_to, private)",
                "(public, connected_to, public)",
            ]
        );
        assert_eq!(
            graph.nodes.keys().copied().collect::<Vec<_>>(),
            vec![NodeKind::Private, NodeKind::Public]
        );
    }

    #[test]
    fn test_distance_zero() {
        let (buildings, segments) = two_squares();
        let config = MorphologyConfig {
            center_point: Some(Point::new(2.0, -1.0).into()),
            distance: Some(0.0),
            ..Default::default()
        };
        let graph = morphological_graph(&buildings, &segments, &config).unwrap();
        let private = graph.node_table(NodeKind::Private).unwrap();
        assert!(private.is_empty());
        assert!(private.has_column("private_id"));
        assert!(graph.edges.values().all(GeoTable::is_empty));
    }

    #[test]
    fn test_empty_segments() {
        let (buildings, segments) = two_squares();
        let segments = segments.empty_like();
        let config = MorphologyConfig {
            tessellation_distance: TessellationDistance::Within(1.0),
            ..Default::default()
        };
        let graph = morphological_graph(&buildings, &segments, &config).unwrap();
        // Nothing to filter against: the tessellation is kept whole
        assert_eq!(graph.node_table(NodeKind::Private).unwrap().len(), 2);
        assert!(graph.edge_table(&EdgeType::faced_to()).unwrap().is_empty());
        assert!(graph.edge_table(&EdgeType::connected_to()).unwrap().is_empty());
    }

    #[test]
    fn test_grid_with_network_filter() {
        let (buildings, streets) = grid_city();
        let config = MorphologyConfig {
            center_point: Some(CenterPoint::Collection(vec![square(-1.0, -1.0, 2.0)])),
            distance: Some(30.0),
            tessellation_distance: TessellationDistance::Within(6.0),
            ..Default::default()
        };
        let graph = morphological_graph(&buildings, &streets, &config).unwrap();
        let public = graph.node_table(NodeKind::Public).unwrap();
        // Only the two streets leaving the corner at the origin fit within 30
        assert_eq!(public.len(), 2);
        let private = graph.node_table(NodeKind::Private).unwrap();
        assert!(!private.is_empty());
        assert!(private.len() < 10);
    }

    #[test]
    fn test_custom_id_columns() {
        let (buildings, segments) = two_squares();
        let segments = segments
            .with_column("street", vec![Value::from("main")])
            .unwrap();
        let config = MorphologyConfig {
            private_id_col: Some("cell".to_string()),
            public_id_col: Some("street".to_string()),
            ..Default::default()
        };
        let graph = morphological_graph(&buildings, &segments, &config).unwrap();
        let faced = graph.edge_table(&EdgeType::faced_to()).unwrap();
        assert_eq!(faced.column_names(), vec!["cell", "street", INTERFACE]);
        assert_eq!(faced.value(0, "street"), Some(&Value::from("main")));
    }

    #[test]
    fn test_invalid_inputs() {
        let (buildings, segments) = two_squares();
        let config = MorphologyConfig::default();
        assert!(matches!(
            morphological_graph(&segments, &segments, &config),
            Err(MorphError::InvalidInput(_))
        ));
        let null_ids = segments
            .clone()
            .with_column("public_id", vec![Value::Null])
            .unwrap();
        assert!(matches!(
            morphological_graph(&buildings, &null_ids, &config),
            Err(MorphError::InvalidIdColumn { .. })
        ));
    }

    #[test]
    fn test_crs_reconciliation() {
        let (buildings, segments) = two_squares();
        let buildings = buildings.with_crs(Some(Crs::WebMercator));
        let config = MorphologyConfig::default();

        // Only one side has a CRS: no reprojection
        let graph = morphological_graph(&buildings, &segments, &config).unwrap();
        assert_eq!(graph.node_table(NodeKind::Public).unwrap().crs(), None);

        let other = segments.clone().with_crs(Some(Crs::Other("EPSG:27700".to_string())));
        assert!(matches!(
            morphological_graph(&buildings, &other, &config),
            Err(MorphError::UnsupportedReprojection { .. })
        ));

        let wgs = segments.clone().with_crs(Some(Crs::Wgs84));
        let graph = morphological_graph(&buildings, &wgs, &config).unwrap();
        assert_eq!(
            graph.node_table(NodeKind::Public).unwrap().crs(),
            Some(&Crs::WebMercator)
        );
    }

    #[test]
    fn test_keep_buildings() {
        let (buildings, streets) = grid_city();
        let config = MorphologyConfig {
            keep_buildings: true,
            ..Default::default()
        };
        let graph = morphological_graph(&buildings, &streets, &config).unwrap();
        let private = graph.node_table(NodeKind::Private).unwrap();
        assert_eq!(private.len(), 10);
        let names = private.column("name").unwrap();
        assert_eq!(names.iter().filter(|v| v.is_null()).count(), 1);
        let footprints = private.column(BUILDING_GEOMETRY).unwrap();
        assert_eq!(footprints.iter().filter(|v| v.as_geometry().is_some()).count(), 9);
    }

    #[test]
    fn test_add_building_info_fallback_and_collisions() {
        let buildings = GeoTable::new(vec![square(0.0, 0.0, 1.0), square(0.5, 0.0, 1.0)])
            .with_column("name", vec![Value::from("first"), Value::from("second")])
            .unwrap();
        // A single cell overlapping both buildings, without a generating building
        let cells = GeoTable::new(vec![square(0.0, 0.0, 2.0), square(5.0, 5.0, 1.0)])
            .with_column("name", vec![Value::from("cell"), Value::from("far")])
            .unwrap();
        let enriched = add_building_info(&cells, &buildings).unwrap();
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched.value(0, "name"), Some(&Value::from("cell")));
        assert_eq!(enriched.value(0, "name_building"), Some(&Value::from("first")));
        assert_eq!(enriched.value(1, "name_building"), Some(&Value::Null));
        assert_eq!(enriched.value(1, BUILDING_GEOMETRY), Some(&Value::Null));
    }

    #[test]
    fn test_center_point_resolve() {
        assert_eq!(
            CenterPoint::from(Point::new(1.0, 2.0)).resolve(),
            Some(Point::new(1.0, 2.0))
        );
        let collection = CenterPoint::Collection(vec![
            line(&[(0.0, 0.0), (2.0, 0.0)]),
            square(10.0, 10.0, 1.0),
        ]);
        assert_eq!(collection.resolve(), Some(Point::new(1.0, 0.0)));
        assert_eq!(CenterPoint::Collection(vec![]).resolve(), None);
    }
}
