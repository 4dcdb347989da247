//! Benchmarks for mesh-morph operations.
//!
//! Run with: cargo bench -p mesh-morph
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-morph -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-morph -- --baseline main

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_morph::{
    Geometry, Mesh, MorphConfig, RemeshParams, SmoothParams, SmoothingScheme, SubdivideParams,
    Tolerance, Vertex, analyze_quality, cage_corners, cage_deform,
};
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Create an icosphere mesh with specified subdivision level.
fn create_sphere(subdivisions: u32) -> Mesh {
    let mut mesh = Mesh::new();

    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let a = 1.0;
    let b = 1.0 / phi;

    let ico_verts = [
        [0.0, b, -a],
        [b, a, 0.0],
        [-b, a, 0.0],
        [0.0, b, a],
        [0.0, -b, a],
        [-a, 0.0, b],
        [0.0, -b, -a],
        [a, 0.0, -b],
        [a, 0.0, b],
        [-a, 0.0, -b],
        [b, -a, 0.0],
        [-b, -a, 0.0],
    ];
    for v in &ico_verts {
        let p = Vector3::new(v[0], v[1], v[2]).normalize();
        mesh.vertices.push(Vertex::from_coords(p.x, p.y, p.z));
    }

    let ico_faces: [[u32; 3]; 20] = [
        [0, 1, 2],
        [3, 2, 1],
        [3, 4, 5],
        [3, 8, 4],
        [0, 6, 7],
        [0, 9, 6],
        [4, 10, 11],
        [6, 11, 10],
        [2, 5, 9],
        [11, 9, 5],
        [1, 7, 8],
        [10, 8, 7],
        [3, 5, 2],
        [3, 1, 8],
        [0, 2, 9],
        [0, 7, 1],
        [6, 9, 11],
        [6, 10, 7],
        [4, 11, 5],
        [4, 8, 10],
    ];
    let mut faces = ico_faces.to_vec();

    for _ in 0..subdivisions {
        let mut edge_midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut get_midpoint = |v1: u32, v2: u32, vertices: &mut Vec<Vertex>| -> u32 {
            let key = if v1 < v2 { (v1, v2) } else { (v2, v1) };
            *edge_midpoints.entry(key).or_insert_with(|| {
                let m = (vertices[v1 as usize].position.coords
                    + vertices[v2 as usize].position.coords)
                    .normalize();
                vertices.push(Vertex::from_coords(m.x, m.y, m.z));
                (vertices.len() - 1) as u32
            })
        };

        let mut next = Vec::with_capacity(faces.len() * 4);
        for &[v0, v1, v2] in &faces {
            let a = get_midpoint(v0, v1, &mut mesh.vertices);
            let b = get_midpoint(v1, v2, &mut mesh.vertices);
            let c = get_midpoint(v2, v0, &mut mesh.vertices);
            next.extend([[v0, a, c], [v1, b, a], [v2, c, b], [a, b, c]]);
        }
        faces = next;
    }

    mesh.faces = faces.into_iter().map(Into::into).collect();
    mesh
}

// =============================================================================
// Subdivision Benchmarks
// =============================================================================

fn bench_subdivision(c: &mut Criterion) {
    let mut group = c.benchmark_group("Subdivision");
    let config = MorphConfig::default();

    let test_cases = [
        ("sphere_80tri", create_sphere(1)),
        ("sphere_1280tri", create_sphere(3)),
    ];

    for (name, mesh) in &test_cases {
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));

        group.bench_with_input(BenchmarkId::new("loop_1", name), mesh, |b, mesh| {
            let params = SubdivideParams::loop_levels(1);
            b.iter(|| mesh_morph::subdivide(black_box(mesh), black_box(&params), &config))
        });
        group.bench_with_input(BenchmarkId::new("butterfly_1", name), mesh, |b, mesh| {
            let params = SubdivideParams::butterfly(1);
            b.iter(|| mesh_morph::subdivide(black_box(mesh), black_box(&params), &config))
        });
    }

    group.finish();
}

// =============================================================================
// Smoothing Benchmarks
// =============================================================================

fn bench_smoothing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Smoothing");
    let config = MorphConfig::default();
    let mesh = create_sphere(3);

    group.throughput(Throughput::Elements(mesh.vertices.len() as u64));

    for scheme in [
        SmoothingScheme::Uniform,
        SmoothingScheme::Cotangent,
        SmoothingScheme::taubin(),
        SmoothingScheme::MeanCurvatureFlow { time_step: 0.1 },
    ] {
        let params = SmoothParams::new(scheme, 10);
        group.bench_with_input(
            BenchmarkId::new(scheme.name(), "sphere_1280tri"),
            &mesh,
            |b, mesh| b.iter(|| mesh_morph::smooth(black_box(mesh), black_box(&params), &config)),
        );
    }

    group.finish();
}

// =============================================================================
// Cage Deformation Benchmarks
// =============================================================================

fn bench_cage_deform(c: &mut Criterion) {
    let mut group = c.benchmark_group("CageDeform");
    let config = MorphConfig::default();

    for subdivisions in [2, 4] {
        let mesh = create_sphere(subdivisions);
        let (min, max) = mesh.bounds().unwrap_or((Point3::origin(), Point3::origin()));
        let cage = cage_corners(min, max);
        let twisted: Vec<_> = cage
            .iter()
            .map(|p| Point3::new(p.x + 0.3 * p.z, p.y, p.z * 1.5))
            .collect();
        let geometry = Geometry::Mesh(mesh);

        group.throughput(Throughput::Elements(geometry.point_count() as u64));
        group.bench_with_input(
            BenchmarkId::new("trilinear", geometry.point_count()),
            &geometry,
            |b, geometry| {
                b.iter(|| cage_deform(black_box(geometry), &cage, black_box(&twisted), &config))
            },
        );
    }

    group.finish();
}

// =============================================================================
// Remeshing Benchmarks
// =============================================================================

fn bench_remeshing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Remeshing");
    group.sample_size(10); // Remeshing is slow
    let config = MorphConfig::default();

    let test_cases = [
        ("sphere_320tri", create_sphere(2)),
        ("sphere_1280tri", create_sphere(3)),
    ];

    for (name, mesh) in &test_cases {
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));

        group.bench_with_input(BenchmarkId::new("isotropic", name), mesh, |b, mesh| {
            let params = RemeshParams::new(0.1).with_max_iterations(3);
            b.iter(|| mesh_morph::remesh(black_box(mesh), black_box(&params), &config))
        });
    }

    group.finish();
}

// =============================================================================
// Quality Benchmarks
// =============================================================================

fn bench_quality(c: &mut Criterion) {
    let mut group = c.benchmark_group("Quality");
    let tolerance = Tolerance::default();

    for subdivisions in [2, 4] {
        let mesh = create_sphere(subdivisions);
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("analyze", mesh.faces.len()),
            &mesh,
            |b, mesh| b.iter(|| analyze_quality(black_box(mesh), &tolerance)),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_subdivision,
    bench_smoothing,
    bench_cage_deform,
    bench_remeshing,
    bench_quality,
);
criterion_main!(benches);
