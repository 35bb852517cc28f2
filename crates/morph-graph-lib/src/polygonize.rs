//! Polygonization of barrier linework
//!
//! Linework is noded at every mutual intersection, turned into a planar graph whose
//! nodes are snapped endpoints, cleaned of dangles, and finally walked face by face over
//! a half-edge structure. Rings of nested components become holes of the smallest face
//! containing them.

use crate::spatial::PointSnapper;
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Area, Contains, Coord, Euclidean, Length, Line, LineString, Point, Polygon};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use smallvec::SmallVec;
use std::collections::HashSet;

/// Planar graph extracted from noded linework
struct PlanarGraph {
    /// Node positions
    nodes: Vec<Coord<f64>>,
    /// Undirected edges as (lower node, higher node)
    edges: Vec<(usize, usize)>,
}

/// Polygonize linework into the faces it encloses
///
/// Endpoints closer than `snap_tolerance` are merged. Dangling lines do not contribute to
/// any face. The result is deterministic for a given input order.
pub fn polygonize(lines: &[LineString<f64>], snap_tolerance: f64) -> Vec<Polygon<f64>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("polygonize");

    let pieces = node_linework(lines, snap_tolerance);
    let graph = build_planar_graph(&pieces, snap_tolerance);
    let alive = prune_dangles(&graph);
    let rings = trace_rings(&graph, &alive);

    let min_area = snap_tolerance * snap_tolerance;
    let mut faces: Vec<Polygon<f64>> = Vec::new();
    let mut outer_rings: Vec<LineString<f64>> = Vec::new();
    for ring in rings {
        let polygon = Polygon::new(ring, vec![]);
        let area = polygon.signed_area();
        if area > min_area {
            faces.push(polygon);
        } else if area < -min_area {
            outer_rings.push(polygon.exterior().clone());
        }
    }

    attach_holes(faces, outer_rings)
}

/// Split every straight piece of the input at its intersections with all others
fn node_linework(lines: &[LineString<f64>], snap_tolerance: f64) -> Vec<Line<f64>> {
    let pieces: Vec<Line<f64>> = lines
        .iter()
        .flat_map(|ls| ls.lines())
        .filter(|l| Euclidean.length(l) > snap_tolerance)
        .collect();

    let tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>> = RTree::bulk_load(
        pieces
            .iter()
            .enumerate()
            .map(|(i, l)| {
                GeomWithData::new(
                    Rectangle::from_corners(
                        [l.start.x.min(l.end.x), l.start.y.min(l.end.y)],
                        [l.start.x.max(l.end.x), l.start.y.max(l.end.y)],
                    ),
                    i,
                )
            })
            .collect(),
    );

    let mut splits: Vec<Vec<Coord<f64>>> = pieces.iter().map(|l| vec![l.start, l.end]).collect();
    for (i, piece) in pieces.iter().enumerate() {
        let envelope = AABB::from_corners(
            [
                piece.start.x.min(piece.end.x) - snap_tolerance,
                piece.start.y.min(piece.end.y) - snap_tolerance,
            ],
            [
                piece.start.x.max(piece.end.x) + snap_tolerance,
                piece.start.y.max(piece.end.y) + snap_tolerance,
            ],
        );
        for other in tree.locate_in_envelope_intersecting(&envelope) {
            let j = other.data;
            if j <= i {
                continue;
            }
            match line_intersection(*piece, pieces[j]) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    splits[i].push(intersection);
                    splits[j].push(intersection);
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    for c in [intersection.start, intersection.end] {
                        splits[i].push(c);
                        splits[j].push(c);
                    }
                }
                None => {}
            }
        }
    }

    pieces
        .iter()
        .zip(splits)
        .flat_map(|(piece, mut points)| {
            let d = piece.delta();
            let along = |c: &Coord<f64>| (c.x - piece.start.x) * d.x + (c.y - piece.start.y) * d.y;
            points.sort_by(|a, b| along(a).total_cmp(&along(b)));
            points
                .windows(2)
                .map(|w| Line::new(w[0], w[1]))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn build_planar_graph(pieces: &[Line<f64>], snap_tolerance: f64) -> PlanarGraph {
    let mut snapper = PointSnapper::new(snap_tolerance);
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for piece in pieces {
        let a = snapper.snap(piece.start);
        let b = snapper.snap(piece.end);
        if a == b {
            continue;
        }
        let key = (a.min(b), a.max(b));
        if seen.insert(key) {
            edges.push(key);
        }
    }

    let (nodes, _) = snapper.into_parts();
    PlanarGraph { nodes, edges }
}

/// Repeatedly remove edges hanging off degree-one nodes
fn prune_dangles(graph: &PlanarGraph) -> Vec<bool> {
    let mut incident: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); graph.nodes.len()];
    for (e, &(a, b)) in graph.edges.iter().enumerate() {
        incident[a].push(e);
        incident[b].push(e);
    }

    let mut alive = vec![true; graph.edges.len()];
    let mut degree: Vec<usize> = incident.iter().map(|edges| edges.len()).collect();
    let mut stack: Vec<usize> = (0..graph.nodes.len()).filter(|&n| degree[n] == 1).collect();

    while let Some(node) = stack.pop() {
        if degree[node] != 1 {
            continue;
        }
        let Some(&edge) = incident[node].iter().find(|&&e| alive[e]) else {
            continue;
        };
        alive[edge] = false;
        let (a, b) = graph.edges[edge];
        for end in [a, b] {
            degree[end] -= 1;
            if degree[end] == 1 {
                stack.push(end);
            }
        }
    }

    alive
}

/// Walk every face of the planar graph, keeping the face on the left
///
/// Half-edge `2e` runs from the lower to the higher node of edge `e`, `2e + 1` the
/// other way. Bounded faces come out counter-clockwise, outer boundaries of connected
/// components clockwise.
fn trace_rings(graph: &PlanarGraph, alive: &[bool]) -> Vec<LineString<f64>> {
    let half_count = graph.edges.len() * 2;
    let origin = |h: usize| {
        let (a, b) = graph.edges[h / 2];
        if h % 2 == 0 { a } else { b }
    };
    let angle = |h: usize| {
        let from = graph.nodes[origin(h)];
        let to = graph.nodes[origin(h ^ 1)];
        (to.y - from.y).atan2(to.x - from.x)
    };

    let mut outgoing: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); graph.nodes.len()];
    for h in (0..half_count).filter(|h| alive[h / 2]) {
        outgoing[origin(h)].push(h);
    }
    let mut position = vec![0usize; half_count];
    for out in &mut outgoing {
        out.sort_by(|&a, &b| angle(a).total_cmp(&angle(b)));
        for (k, &h) in out.iter().enumerate() {
            position[h] = k;
        }
    }

    // Next half-edge: the one immediately clockwise from the twin around the head node
    let next = |h: usize| {
        let twin = h ^ 1;
        let out = &outgoing[origin(twin)];
        out[(position[twin] + out.len() - 1) % out.len()]
    };

    let mut visited = vec![false; half_count];
    let mut rings = Vec::new();
    for start in (0..half_count).filter(|h| alive[h / 2]) {
        if visited[start] {
            continue;
        }
        let mut coords = Vec::new();
        let mut current = start;
        for _ in 0..half_count {
            visited[current] = true;
            coords.push(graph.nodes[origin(current)]);
            current = next(current);
            if current == start {
                break;
            }
        }
        if coords.len() >= 3 {
            coords.push(coords[0]);
            rings.push(LineString::new(coords));
        }
    }
    rings
}

/// Attach each clockwise component boundary as a hole of the smallest face containing it
fn attach_holes(faces: Vec<Polygon<f64>>, outer_rings: Vec<LineString<f64>>) -> Vec<Polygon<f64>> {
    let areas: Vec<f64> = faces.iter().map(|f| f.unsigned_area()).collect();
    let mut holes: Vec<Vec<LineString<f64>>> = vec![Vec::new(); faces.len()];

    for ring in outer_rings {
        let Some(&first) = ring.0.first() else {
            continue;
        };
        let sample = Point::from(first);
        let container = faces
            .iter()
            .enumerate()
            .filter(|(_, face)| face.contains(&sample))
            .min_by(|(a, _), (b, _)| areas[*a].total_cmp(&areas[*b]))
            .map(|(i, _)| i);
        if let Some(i) = container {
            holes[i].push(ring);
        }
    }

    faces
        .into_iter()
        .zip(holes)
        .map(|(face, interiors)| {
            if interiors.is_empty() {
                face
            } else {
                Polygon::new(face.exterior().clone(), interiors)
            }
        })
        .collect()
}
