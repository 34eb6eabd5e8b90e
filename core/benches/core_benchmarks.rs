use criterion::{Criterion, black_box, criterion_group, criterion_main};

use oven_core::mesh::generators::{generate_cube, generate_sphere};
use oven_core::mesh::{compress_mesh, decode_geometry};

// ---------------------------------------------------------------------------
// Mesh compression
// ---------------------------------------------------------------------------

fn bench_compress_sphere_low(c: &mut Criterion) {
    let mesh = generate_sphere(1.0, 16, 8, "m");
    c.bench_function("compress_sphere_16x8", |b| {
        b.iter(|| compress_mesh(black_box(&mesh), None));
    });
}

fn bench_compress_sphere_medium(c: &mut Criterion) {
    let mesh = generate_sphere(1.0, 64, 32, "m");
    c.bench_function("compress_sphere_64x32", |b| {
        b.iter(|| compress_mesh(black_box(&mesh), None));
    });
}

fn bench_compress_sphere_high(c: &mut Criterion) {
    let mesh = generate_sphere(1.0, 128, 64, "m");
    c.bench_function("compress_sphere_128x64", |b| {
        b.iter(|| compress_mesh(black_box(&mesh), None));
    });
}

fn bench_compress_cube_multi_material(c: &mut Criterion) {
    let mesh = generate_cube(1.0, &["a", "b", "c"]);
    c.bench_function("compress_cube_3_materials", |b| {
        b.iter(|| compress_mesh(black_box(&mesh), None));
    });
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn bench_decode_sphere(c: &mut Criterion) {
    let mesh = generate_sphere(1.0, 64, 32, "m");
    let Ok(outcome) = compress_mesh(&mesh, None) else {
        return;
    };
    let Some(geometry) = outcome.into_geometry() else {
        return;
    };
    c.bench_function("decode_sphere_64x32", |b| {
        b.iter(|| decode_geometry(black_box(&geometry.data)));
    });
}

criterion_group!(
    benches,
    bench_compress_sphere_low,
    bench_compress_sphere_medium,
    bench_compress_sphere_high,
    bench_compress_cube_multi_material,
    bench_decode_sphere,
);

criterion_main!(benches);
