//! R-tree backed spatial index over table geometries

use geo::{BoundingRect, Coord, Distance, Euclidean, Geometry, Intersects, Point, Rect};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};

type IndexItem = GeomWithData<Rectangle<[f64; 2]>, usize>; // Data is the row of the geometry

/// Point entry of a [`PointSnapper`] tree
pub(crate) type PointItem = GeomWithData<[f64; 2], usize>; // Data is the point id

/// Envelope index over a slice of geometries, answering intersection and
/// nearest-distance queries by row
pub(crate) struct GeometryIndex<'a> {
    geometries: Vec<&'a Geometry<f64>>,
    tree: RTree<IndexItem>,
}

impl<'a> GeometryIndex<'a> {
    pub fn new(geometries: Vec<&'a Geometry<f64>>) -> Self {
        let items: Vec<IndexItem> = geometries
            .iter()
            .enumerate()
            .filter_map(|(row, g)| {
                let rect = g.bounding_rect()?;
                Some(GeomWithData::new(
                    Rectangle::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                    row,
                ))
            })
            .collect();
        Self {
            geometries,
            tree: RTree::bulk_load(items),
        }
    }

    /// Rows whose envelope intersects `rect` grown by `padding`, in ascending order
    pub fn candidates(&self, rect: Rect<f64>, padding: f64) -> Vec<usize> {
        let envelope = AABB::from_corners(
            [rect.min().x - padding, rect.min().y - padding],
            [rect.max().x + padding, rect.max().y + padding],
        );
        let mut rows: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|item| item.data)
            .collect();
        rows.sort_unstable();
        rows
    }

    /// Rows whose geometry intersects `geometry`, in ascending order
    pub fn intersecting(&self, geometry: &Geometry<f64>) -> Vec<usize> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        self.candidates(rect, 0.0)
            .into_iter()
            .filter(|&row| self.geometries[row].intersects(geometry))
            .collect()
    }

    /// Distance from `point` to the nearest accepted linear geometry
    ///
    /// Candidates are visited in envelope-distance order, so the search stops as soon as
    /// no remaining envelope can beat the best exact distance.
    pub fn nearest_line_distance(
        &self,
        point: Point<f64>,
        accept: impl Fn(usize) -> bool,
    ) -> Option<f64> {
        let mut best: Option<f64> = None;
        for (item, envelope_d2) in self
            .tree
            .nearest_neighbor_iter_with_distance_2(&[point.x(), point.y()])
        {
            if let Some(b) = best {
                if envelope_d2.sqrt() > b {
                    break;
                }
            }
            if !accept(item.data) {
                continue;
            }
            let d = Euclidean.distance(&point, self.geometries[item.data]);
            best = Some(best.map_or(d, |b| b.min(d)));
        }
        best
    }
}

/// Incremental point set that merges coordinates closer than a tolerance
///
/// Lookups search the R-tree for existing points within the tolerance, so two close
/// coordinates always merge no matter where they fall relative to any grid.
pub(crate) struct PointSnapper {
    tolerance: f64,
    coords: Vec<Coord<f64>>,
    tree: RTree<PointItem>,
}

impl PointSnapper {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.max(0.0),
            coords: Vec::new(),
            tree: RTree::new(),
        }
    }

    /// Id of the point at `c`: the lowest existing id within the tolerance, or a new one
    pub fn snap(&mut self, c: Coord<f64>) -> usize {
        let existing = self
            .tree
            .locate_within_distance([c.x, c.y], self.tolerance * self.tolerance)
            .map(|item| item.data)
            .min();
        existing.unwrap_or_else(|| {
            let id = self.coords.len();
            self.coords.push(c);
            self.tree.insert(GeomWithData::new([c.x, c.y], id));
            id
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Point positions by id, and the tree over them
    pub fn into_parts(self) -> (Vec<Coord<f64>>, RTree<PointItem>) {
        (self.coords, self.tree)
    }
}
