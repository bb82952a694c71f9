//! Benchmarks for mesh-lod operations.
//!
//! Run with: cargo bench -p mesh-lod
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-lod -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-lod -- --baseline main

#![allow(clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_lod::{
    LodParams, Model, OperatorKind, build_hierarchy, deserialize, serialize, weld_vertices,
};
use mesh_types::{IndexedMesh, icosphere};

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Unshare every face's vertices so welding has work to do.
fn triangle_soup(mesh: &IndexedMesh) -> IndexedMesh {
    let mut soup = IndexedMesh::with_capacity(mesh.faces.len() * 3, mesh.faces.len());
    for face in &mesh.faces {
        let base = soup.vertices.len() as u32;
        for &i in face {
            soup.vertices.push(mesh.vertices[i as usize]);
        }
        soup.faces.push([base, base + 1, base + 2]);
    }
    soup
}

fn test_spheres() -> [(&'static str, IndexedMesh); 3] {
    [
        ("sphere_320tri", icosphere(2)),
        ("sphere_1280tri", icosphere(3)),
        ("sphere_5120tri", icosphere(4)),
    ]
}

// =============================================================================
// Welding Benchmarks
// =============================================================================

fn bench_weld(c: &mut Criterion) {
    let mut group = c.benchmark_group("Weld");

    for (name, mesh) in &test_spheres() {
        let soup = triangle_soup(mesh);
        group.throughput(Throughput::Elements(soup.vertices.len() as u64));

        group.bench_with_input(BenchmarkId::new("weld_soup", name), &soup, |b, soup| {
            b.iter(|| {
                let mut model = Model::from_mesh(black_box(soup)).unwrap();
                weld_vertices(&mut model, black_box(1e-9)).unwrap()
            });
        });
    }

    group.finish();
}

// =============================================================================
// Hierarchy Benchmarks
// =============================================================================

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("Build");
    group.sample_size(20); // Building is slower, reduce samples

    for (name, mesh) in &test_spheres() {
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));

        for operator in [OperatorKind::HalfEdge, OperatorKind::FullEdge] {
            let params = LodParams::with_percent_reduction(0.5).with_operator(operator);
            group.bench_with_input(
                BenchmarkId::new(format!("build_{operator}"), name),
                &(mesh, params),
                |b, (mesh, params)| {
                    b.iter(|| build_hierarchy(black_box(mesh), black_box(params)).unwrap());
                },
            );
        }
    }

    group.finish();
}

// =============================================================================
// Serialization Benchmarks
// =============================================================================

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("Serialize");

    let hierarchy = build_hierarchy(&icosphere(4), &LodParams::default()).unwrap();
    let bytes = serialize(&hierarchy);
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("serialize_sphere_5120tri", |b| {
        b.iter(|| serialize(black_box(&hierarchy)));
    });
    group.bench_function("deserialize_sphere_5120tri", |b| {
        b.iter(|| deserialize(black_box(&bytes)).unwrap());
    });

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_weld, bench_build, bench_serialize);
criterion_main!(benches);
