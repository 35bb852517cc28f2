//! Performance benchmarks for morph-graph-lib
//!
//! Run with: cargo bench --package morph-graph-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use geo::{Geometry, LineString, Point, Polygon};
use morph_graph_lib::{
    Contiguity, GeoTable, MorphologyConfig, NetworkConfig, StreetNetwork, TessellationConfig,
    TessellationDistance, create_tessellation, filter_tessellation_by_network_distance,
    morphological_graph, private_to_private_graph,
};

const BLOCK: f64 = 100.0;

/// Generate a street grid of `blocks` x `blocks` city blocks, with every street split at
/// each crossing, and `per_block` x `per_block` buildings inside each block.
fn generate_city(blocks: usize, per_block: usize) -> (GeoTable, GeoTable) {
    let mut streets = Vec::new();
    for i in 0..=blocks {
        let v = i as f64 * BLOCK;
        for j in 0..blocks {
            let a = j as f64 * BLOCK;
            let b = a + BLOCK;
            streets.push(line(&[(v, a), (v, b)]));
            streets.push(line(&[(a, v), (b, v)]));
        }
    }

    let step = BLOCK / per_block as f64;
    let size = step * 0.5;
    let mut buildings = Vec::new();
    for bx in 0..blocks {
        for by in 0..blocks {
            for k in 0..per_block * per_block {
                // Small jitter so Voronoi bisectors are not all axis aligned
                let jitter = ((bx * 7 + by * 13 + k * 3) % 5) as f64;
                let x = bx as f64 * BLOCK + (k % per_block) as f64 * step + step * 0.25 + jitter;
                let y = by as f64 * BLOCK + (k / per_block) as f64 * step + step * 0.25;
                buildings.push(square(x, y, size));
            }
        }
    }

    (GeoTable::new(buildings), GeoTable::new(streets))
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

// ============================================================================
// Core Benchmarks - Pipeline stages
// ============================================================================

fn bench_tessellation(c: &mut Criterion) {
    let mut group = c.benchmark_group("tessellation");
    group.sample_size(20);

    for blocks in [5, 10] {
        let (buildings, streets) = generate_city(blocks, 3);
        group.throughput(Throughput::Elements(buildings.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &blocks, |b, _| {
            b.iter(|| {
                create_tessellation(&buildings, &streets, None, &TessellationConfig::default())
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_network(c: &mut Criterion) {
    let mut group = c.benchmark_group("network");

    let (buildings, streets) = generate_city(10, 3);
    let tessellation =
        create_tessellation(&buildings, &streets, None, &TessellationConfig::default()).unwrap();
    let config = NetworkConfig::default();

    group.bench_function("build_10x10", |b| {
        b.iter(|| StreetNetwork::from_segments(&streets, &config).unwrap());
    });

    let center = Point::new(500.0, 500.0);
    group.bench_function("distance_filter_10x10", |b| {
        b.iter(|| {
            filter_tessellation_by_network_distance(&tessellation, &streets, center, 300.0, &config)
                .unwrap()
        });
    });

    group.finish();
}

fn bench_contiguity(c: &mut Criterion) {
    let mut group = c.benchmark_group("contiguity");
    group.sample_size(20);

    let (buildings, streets) = generate_city(10, 3);
    let tessellation =
        create_tessellation(&buildings, &streets, None, &TessellationConfig::default()).unwrap();

    for contiguity in [Contiguity::Queen, Contiguity::Rook] {
        group.bench_function(contiguity.to_string(), |b| {
            b.iter(|| {
                private_to_private_graph(&tessellation, "private_id", None, contiguity).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_morphological_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphological_graph");
    group.sample_size(10);

    let (buildings, streets) = generate_city(10, 3);
    let config = MorphologyConfig {
        center_point: Some(Point::new(500.0, 500.0).into()),
        distance: Some(400.0),
        tessellation_distance: TessellationDistance::Within(60.0),
        ..Default::default()
    };

    group.throughput(Throughput::Elements(buildings.len() as u64));
    group.bench_function("full_10x10", |b| {
        b.iter(|| morphological_graph(&buildings, &streets, &config).unwrap());
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    benches,
    bench_tessellation,
    bench_network,
    bench_contiguity,
    bench_morphological_graph,
);

criterion_main!(benches);
