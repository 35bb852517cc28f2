//! Synthetic street grids with buildings, used in place of real input data.

use geo::{Geometry, LineString, Polygon};
use morph_graph_lib::{Crs, GeoTable, Result, Value};

/// Street grid of `blocks` x `blocks` blocks with `per_side` x `per_side` buildings each
///
/// Streets are split at every crossing so they form a connected network. Buildings get a
/// `name` column (`b<block x>_<block y>_<k>`), streets a `length` column.
pub fn grid_city(
    blocks: usize,
    block_size: f64,
    per_side: usize,
    crs: Option<Crs>,
) -> Result<(GeoTable, GeoTable)> {
    let mut streets = Vec::new();
    let mut lengths = Vec::new();
    for i in 0..=blocks {
        let v = i as f64 * block_size;
        for j in 0..blocks {
            let a = j as f64 * block_size;
            let b = a + block_size;
            streets.push(line(&[(v, a), (v, b)]));
            streets.push(line(&[(a, v), (b, v)]));
            lengths.extend([Value::Float(block_size), Value::Float(block_size)]);
        }
    }

    let per_side = per_side.max(1);
    let step = block_size / per_side as f64;
    let size = step * 0.5;
    let mut buildings = Vec::new();
    let mut names = Vec::new();
    for bx in 0..blocks {
        for by in 0..blocks {
            for k in 0..per_side * per_side {
                let x = bx as f64 * block_size + (k % per_side) as f64 * step + step * 0.25;
                let y = by as f64 * block_size + (k / per_side) as f64 * step + step * 0.25;
                buildings.push(square(x, y, size));
                names.push(Value::from(format!("b{bx}_{by}_{k}")));
            }
        }
    }

    tracing::debug!(
        "Generated {} buildings and {} streets on a {}x{} grid",
        buildings.len(),
        streets.len(),
        blocks,
        blocks
    );
    let buildings = GeoTable::new(buildings)
        .with_crs(crs.clone())
        .with_column("name", names)?;
    let streets = GeoTable::new(streets)
        .with_crs(crs)
        .with_column("length", lengths)?;
    Ok((buildings, streets))
}

fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
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

fn line(points: &[(f64, f64)]) -> Geometry<f64> {
    Geometry::LineString(LineString::from(points.to_vec()))
}
