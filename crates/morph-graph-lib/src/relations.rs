//! Relational graph builders
//!
//! Each builder returns an edge table: one row per relation, a pair of identifier
//! columns, and a straight line between the centroids of the two related geometries as
//! the primary geometry. Empty inputs give empty tables that still carry every column.

use crate::spatial::GeometryIndex;
use crate::table::IdKey;
use crate::{
    Contiguity, CONTIGUITY_TOLERANCE, GeoTable, NetworkConfig, Result, StreetNetwork, Value,
    contiguity_pairs, ensure_id_column, utils,
};
use geo::{BooleanOps, Euclidean, Geometry, Length, MultiLineString};
use std::collections::BTreeMap;

/// Column of private-public edges holding the part of the segment inside the cell
pub const INTERFACE: &str = "interface";

/// Contiguity edges between tessellation cells
///
/// Neighbors are only searched inside the same group when `group_col` names an existing
/// column; cells with a null group get no edges. The edge table has the columns
/// `from_<id>`, `to_<id>` and, when `group_col` is given, the group column itself. The
/// lower row is always the source.
pub fn private_to_private_graph(
    tessellation: &GeoTable,
    private_id_col: &str,
    group_col: Option<&str>,
    contiguity: Contiguity,
) -> Result<GeoTable> {
    #[cfg(feature = "profiling")]
    profiling::scope!("relations::private_to_private_graph");

    tessellation.ensure_polygonal("tessellation")?;
    let (tessellation, _) = ensure_id_column(tessellation, private_id_col)?;
    let group_values = group_col.and_then(|col| tessellation.column(col));

    let mut groups: BTreeMap<Option<IdKey>, Vec<usize>> = BTreeMap::new();
    for row in 0..tessellation.len() {
        let key = match group_values {
            Some(values) => match values[row].id_key() {
                Some(key) => Some(key),
                None => continue,
            },
            None => None,
        };
        groups.entry(key).or_default().push(row);
    }

    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for rows in groups.values() {
        let geometries: Vec<&Geometry<f64>> =
            rows.iter().map(|&r| &tessellation.geometries()[r]).collect();
        pairs.extend(
            contiguity_pairs(&geometries, contiguity, CONTIGUITY_TOLERANCE)
                .into_iter()
                .map(|(a, b)| (rows[a], rows[b])),
        );
    }
    pairs.sort_unstable();
    pairs.dedup();

    tracing::debug!(
        "{} contiguity: {} edges between {} cells in {} groups",
        contiguity,
        pairs.len(),
        tessellation.len(),
        groups.len()
    );

    let ids = id_values(&tessellation, private_id_col);
    let geometry = pairs
        .iter()
        .map(|&(a, b)| {
            utils::connecting_line(&tessellation.geometries()[a], &tessellation.geometries()[b])
        })
        .collect();
    let mut edges = GeoTable::new(geometry)
        .with_crs(tessellation.crs().cloned())
        .with_column(
            &format!("from_{private_id_col}"),
            pairs.iter().map(|&(a, _)| ids[a].clone()).collect(),
        )?
        .with_column(
            &format!("to_{private_id_col}"),
            pairs.iter().map(|&(_, b)| ids[b].clone()).collect(),
        )?;
    if let Some(col) = group_col {
        let values = pairs
            .iter()
            .map(|&(a, _)| group_values.map_or(Value::Null, |values| values[a].clone()))
            .collect();
        edges.set_column(col, values)?;
    }
    Ok(edges)
}

/// Edges between street segments meeting at a shared endpoint
///
/// The edge table has the columns `from_<id>`, `to_<id>` and `angle`, the deflection in
/// degrees between the two segments at the junction. Junctions are found with the snap
/// tolerance of `config`.
pub fn public_to_public_graph(
    segments: &GeoTable,
    public_id_col: &str,
    config: &NetworkConfig,
) -> Result<GeoTable> {
    #[cfg(feature = "profiling")]
    profiling::scope!("relations::public_to_public_graph");

    segments.ensure_linear("segments")?;
    let (segments, _) = ensure_id_column(segments, public_id_col)?;
    let network = StreetNetwork::from_segments(&segments, config)?;
    let dual = network.dual_edges(&segments);

    tracing::debug!(
        "Dual graph: {} edges between {} segments",
        dual.len(),
        segments.len()
    );

    let ids = id_values(&segments, public_id_col);
    let geometry = dual
        .iter()
        .map(|&(a, b, _)| utils::connecting_line(&segments.geometries()[a], &segments.geometries()[b]))
        .collect();
    GeoTable::new(geometry)
        .with_crs(segments.crs().cloned())
        .with_column(
            &format!("from_{public_id_col}"),
            dual.iter().map(|&(a, _, _)| ids[a].clone()).collect(),
        )?
        .with_column(
            &format!("to_{public_id_col}"),
            dual.iter().map(|&(_, b, _)| ids[b].clone()).collect(),
        )?
        .with_column("angle", dual.iter().map(|&(_, _, angle)| Value::Float(angle)).collect())
}

/// Edges between tessellation cells and the street segments they intersect
///
/// Intersection is tested against `barrier_col` geometries when that column exists, and
/// against the primary segment geometry otherwise. The edge line always joins the
/// centroids of the primary geometries. The [`INTERFACE`] column holds the part of the
/// tested segment geometry lying in the cell, or null when they only meet at points.
pub fn private_to_public_graph(
    tessellation: &GeoTable,
    segments: &GeoTable,
    private_id_col: &str,
    public_id_col: &str,
    barrier_col: Option<&str>,
) -> Result<GeoTable> {
    #[cfg(feature = "profiling")]
    profiling::scope!("relations::private_to_public_graph");

    tessellation.ensure_polygonal("tessellation")?;
    segments.ensure_linear("segments")?;
    let (tessellation, _) = ensure_id_column(tessellation, private_id_col)?;
    let (segments, _) = ensure_id_column(segments, public_id_col)?;

    let barriers = barrier_col
        .and_then(|col| segments.alternate_geometries(col))
        .unwrap_or_else(|| segments.geometries().iter().collect());
    let index = GeometryIndex::new(barriers.clone());

    let pairs: Vec<(usize, usize)> = tessellation
        .geometries()
        .iter()
        .enumerate()
        .flat_map(|(cell, geometry)| {
            index
                .intersecting(geometry)
                .into_iter()
                .map(move |segment| (cell, segment))
        })
        .collect();

    tracing::debug!(
        "Private-public: {} edges between {} cells and {} segments",
        pairs.len(),
        tessellation.len(),
        segments.len()
    );

    let private_ids = id_values(&tessellation, private_id_col);
    let public_ids = id_values(&segments, public_id_col);
    let geometry = pairs
        .iter()
        .map(|&(c, s)| utils::connecting_line(&tessellation.geometries()[c], &segments.geometries()[s]))
        .collect();
    let interfaces = pairs
        .iter()
        .map(|&(c, s)| match interface(&tessellation.geometries()[c], barriers[s]) {
            Some(part) => Value::Geometry(Geometry::MultiLineString(part)),
            None => Value::Null,
        })
        .collect();
    GeoTable::new(geometry)
        .with_crs(tessellation.crs().cloned())
        .with_column(
            private_id_col,
            pairs.iter().map(|&(c, _)| private_ids[c].clone()).collect(),
        )?
        .with_column(
            public_id_col,
            pairs.iter().map(|&(_, s)| public_ids[s].clone()).collect(),
        )?
        .with_column(INTERFACE, interfaces)
}

/// Part of a linear geometry inside (or on the boundary of) a polygonal cell
fn interface(cell: &Geometry<f64>, segment: &Geometry<f64>) -> Option<MultiLineString<f64>> {
    let lines = MultiLineString::new(utils::line_strings(segment));
    let mut part = match cell {
        Geometry::Polygon(p) => p.clip(&lines, false),
        Geometry::MultiPolygon(mp) => mp.clip(&lines, false),
        Geometry::Rect(r) => r.to_polygon().clip(&lines, false),
        Geometry::Triangle(t) => t.to_polygon().clip(&lines, false),
        _ => return None,
    };
    // Point contacts come back as degenerate pieces
    part.0.retain(|ls| ls.0.len() >= 2 && Euclidean.length(ls) > 0.0);
    (!part.0.is_empty()).then_some(part)
}

fn id_values<'a>(table: &'a GeoTable, column: &str) -> &'a [Value] {
    table.column(column).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{grid_city, line, square, two_squares};
    use crate::{ENCLOSURE_INDEX, MorphError, TessellationConfig, create_tessellation};

    fn grid_tessellation() -> (GeoTable, GeoTable) {
        let (buildings, streets) = grid_city();
        let tess =
            create_tessellation(&buildings, &streets, None, &TessellationConfig::default())
                .unwrap();
        (tess, streets)
    }

    #[test]
    fn test_private_to_private_within_groups() {
        let (tess, _) = grid_tessellation();
        // Every grid block is its own enclosure, so grouping leaves no edges
        let edges =
            private_to_private_graph(&tess, "private_id", Some(ENCLOSURE_INDEX), Contiguity::Queen)
                .unwrap();
        assert!(edges.is_empty());
        assert_eq!(
            edges.column_names(),
            vec!["from_private_id", "to_private_id", ENCLOSURE_INDEX]
        );
    }

    #[test]
    fn test_private_to_private_without_groups() {
        let (tess, _) = grid_tessellation();
        let queen = private_to_private_graph(&tess, "private_id", None, Contiguity::Queen).unwrap();
        let rook = private_to_private_graph(&tess, "private_id", None, Contiguity::Rook).unwrap();
        // 12 edges shared between blocks and 8 with the outer ring; queen adds the
        // 8 diagonal block neighbors
        assert_eq!(rook.len(), 12 + 8);
        assert_eq!(queen.len(), 12 + 8 + 8);
        assert!(!queen.column_names().contains(&ENCLOSURE_INDEX));

        let key = |t: &GeoTable, row: usize| {
            (
                t.value(row, "from_private_id").cloned(),
                t.value(row, "to_private_id").cloned(),
            )
        };
        let queen_pairs: Vec<_> = (0..queen.len()).map(|r| key(&queen, r)).collect();
        assert!((0..rook.len()).all(|r| queen_pairs.contains(&key(&rook, r))));
    }

    #[test]
    fn test_private_to_private_lower_row_is_source() {
        let tess = GeoTable::new(vec![square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0)])
            .with_column("cell", vec![Value::from("b"), Value::from("a")])
            .unwrap();
        let edges = private_to_private_graph(&tess, "cell", None, Contiguity::Rook).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges.value(0, "from_cell"), Some(&Value::from("b")));
        assert_eq!(edges.value(0, "to_cell"), Some(&Value::from("a")));
        assert!(matches!(edges.geometries()[0], Geometry::LineString(_)));
    }

    #[test]
    fn test_private_to_private_duplicate_ids() {
        let tess = GeoTable::new(vec![square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0)])
            .with_column("cell", vec![Value::Int(1), Value::Int(1)])
            .unwrap();
        let err = private_to_private_graph(&tess, "cell", None, Contiguity::Queen).unwrap_err();
        assert!(matches!(err, MorphError::InvalidIdColumn { .. }));
    }

    #[test]
    fn test_public_to_public_grid_corners() {
        let (_, streets) = grid_city();
        let edges = public_to_public_graph(&streets, "public_id", &NetworkConfig::default()).unwrap();
        // Unnoded grid streets only meet at the four outer corners
        assert_eq!(edges.len(), 4);
        assert_eq!(
            edges.column_names(),
            vec!["from_public_id", "to_public_id", "angle"]
        );
        for row in 0..edges.len() {
            let angle = edges.value(row, "angle").and_then(Value::as_f64).unwrap();
            assert!((angle - 90.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_public_to_public_chain() {
        let segments = GeoTable::new(vec![
            line(&[(0.0, 0.0), (1.0, 0.0)]),
            line(&[(1.0, 0.0), (2.0, 0.0)]),
            line(&[(5.0, 5.0), (6.0, 5.0)]),
        ])
        .with_column("sid", vec![Value::Int(10), Value::Int(20), Value::Int(30)])
        .unwrap();
        let edges = public_to_public_graph(&segments, "sid", &NetworkConfig::default()).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges.value(0, "from_sid"), Some(&Value::Int(10)));
        assert_eq!(edges.value(0, "to_sid"), Some(&Value::Int(20)));
        assert_eq!(edges.value(0, "angle").and_then(Value::as_f64), Some(0.0));
    }

    #[test]
    fn test_private_to_public_two_squares() {
        let (buildings, segments) = two_squares();
        let tess =
            create_tessellation(&buildings, &segments, None, &TessellationConfig::default())
                .unwrap();
        let edges =
            private_to_public_graph(&tess, &segments, "private_id", "public_id", None).unwrap();
        // The street runs along the bisector of the two buildings, so both cells face it
        assert_eq!(edges.column_names(), vec!["private_id", "public_id", INTERFACE]);
        assert_eq!(edges.len(), 2);
        for row in 0..edges.len() {
            assert_eq!(edges.value(row, "public_id"), Some(&Value::Int(0)));
        }
    }

    #[test]
    fn test_public_to_public_uses_snap_tolerance() {
        let segments = GeoTable::new(vec![
            line(&[(0.0, 0.0), (1.0, 0.0)]),
            line(&[(1.05, 0.0), (2.0, 0.0)]),
        ]);
        let strict = public_to_public_graph(&segments, "public_id", &NetworkConfig::default())
            .unwrap();
        assert!(strict.is_empty());
        let loose = NetworkConfig {
            snap_tolerance: 0.1,
            ..Default::default()
        };
        let edges = public_to_public_graph(&segments, "public_id", &loose).unwrap();
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn test_private_to_public_interface_geometry() {
        let tess = GeoTable::new(vec![square(0.0, 0.0, 2.0)]);
        let segments = GeoTable::new(vec![
            line(&[(1.0, -1.0), (1.0, 3.0)]),
            line(&[(2.0, 2.0), (3.0, 3.0)]),
        ]);
        let edges = private_to_public_graph(&tess, &segments, "private_id", "public_id", None).unwrap();
        assert_eq!(edges.len(), 2);

        // The crossing street contributes the piece inside the cell
        let Some(Value::Geometry(Geometry::MultiLineString(part))) = edges.value(0, INTERFACE) else {
            panic!("expected an interface line");
        };
        assert!((Euclidean.length(part) - 2.0).abs() < 1e-6);
        // The second street only touches the corner
        assert_eq!(edges.value(1, INTERFACE), Some(&Value::Null));
    }

    #[test]
    fn test_private_to_public_uses_barrier_column() {
        let tess = GeoTable::new(vec![square(0.0, 0.0, 1.0)]);
        let segments = GeoTable::new(vec![line(&[(5.0, 0.0), (5.0, 1.0)])])
            .with_column(
                "barrier_geometry",
                vec![Value::Geometry(line(&[(0.5, -1.0), (0.5, 2.0)]))],
            )
            .unwrap();
        let plain = private_to_public_graph(&tess, &segments, "private_id", "public_id", None).unwrap();
        assert!(plain.is_empty());
        let barrier = private_to_public_graph(
            &tess,
            &segments,
            "private_id",
            "public_id",
            Some("barrier_geometry"),
        )
        .unwrap();
        assert_eq!(barrier.len(), 1);
        // Edge joins the primary centroids
        let Geometry::LineString(ls) = &barrier.geometries()[0] else {
            panic!("expected a connecting line");
        };
        assert_eq!(ls.0.last().map(|c| (c.x, c.y)), Some((5.0, 0.5)));
    }

    #[test]
    fn test_empty_inputs_keep_schema() {
        let empty_cells = GeoTable::new(vec![]);
        let empty_segments = GeoTable::new(vec![]);
        let p2p = private_to_private_graph(&empty_cells, "private_id", Some(ENCLOSURE_INDEX), Contiguity::Queen)
            .unwrap();
        assert!(p2p.is_empty());
        assert_eq!(
            p2p.column_names(),
            vec!["from_private_id", "to_private_id", ENCLOSURE_INDEX]
        );

        let q2q = public_to_public_graph(&empty_segments, "public_id", &NetworkConfig::default()).unwrap();
        assert!(q2q.is_empty());
        assert_eq!(q2q.column_names(), vec!["from_public_id", "to_public_id", "angle"]);

        let p2q = private_to_public_graph(&empty_cells, &empty_segments, "private_id", "public_id", None)
            .unwrap();
        assert!(p2q.is_empty());
        assert_eq!(p2q.column_names(), vec!["private_id", "public_id", INTERFACE]);
    }

    #[test]
    fn test_wrong_geometry_kind() {
        let (buildings, segments) = two_squares();
        let err = private_to_public_graph(&segments, &buildings, "private_id", "public_id", None)
            .unwrap_err();
        assert!(matches!(err, MorphError::InvalidInput(_)));
    }
}
