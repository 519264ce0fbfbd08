//! Benchmarks the per-frame tracked-object state machine end to end:
//! `TrackedObjectRegistry::step` over a synthetic field with a handful of
//! moving blobs, the frame-sequential hot path spec'd to run once per frame.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use opencv::core::{Mat, Scalar, CV_8UC3};
use opencv::prelude::*;

use pitchtrack::vision::field_color::FieldColorModel;
use pitchtrack::vision::registry::{RegistryParams, TrackedObjectRegistry};
use pitchtrack::vision::terrain::TerrainMask;

fn field_frame(rows: i32, cols: i32, blob_centers: &[(i32, i32)]) -> Mat {
    let mut frame = Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::new(60.0, 130.0, 45.0, 0.0)).unwrap();
    for &(center_row, center_col) in blob_centers {
        for dr in -4..=4 {
            for dc in -4..=4 {
                let row = center_row + dr;
                let col = center_col + dc;
                if row >= 0 && row < rows && col >= 0 && col < cols {
                    *frame.at_2d_mut::<opencv::core::Vec3b>(row, col).unwrap() = opencv::core::Vec3b::from([20, 20, 200]);
                }
            }
        }
    }
    frame
}

fn bench_registry_step(c: &mut Criterion) {
    let rows = 200;
    let cols = 300;
    let terrain = TerrainMask::from_polygon(&[(5, 5), (5, 295), (195, 295), (195, 5)], rows, cols).unwrap();
    let field_color = FieldColorModel::default();
    let background = field_frame(rows, cols, &[]);

    c.bench_function("registry_step_5_blobs", |bencher| {
        bencher.iter(|| {
            let mut registry = TrackedObjectRegistry::new(rows, cols, RegistryParams::default());
            let centers = [(40, 40), (60, 120), (100, 200), (150, 80), (170, 250)];
            for frame_index in 0..10u64 {
                let shifted: Vec<(i32, i32)> = centers.iter().map(|&(r, c)| (r + frame_index as i32, c)).collect();
                let frame = field_frame(rows, cols, &shifted);
                let _ = registry.step(
                    black_box(&frame),
                    None,
                    black_box(&background),
                    true,
                    Some((0, rows - 1, 0, cols - 1)),
                    black_box(&terrain),
                    black_box(&field_color),
                    frame_index,
                );
            }
        });
    });
}

criterion_group!(benches, bench_registry_step);
criterion_main!(benches);
