//! # Blob Detection Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use car_if::eqpt::cam::{Frame, Rgb};
use car_lib::per::{
    blob::BlobDetector,
    classify::classify_frame,
    BlobParams, ClassifyParams,
};

/// Build a frame of track-like stripes with a few blue guidance blobs on it.
fn synthetic_frame(width: usize, height: usize) -> Frame {
    let mut frame = Frame::filled(width, height, Rgb::new(10, 10, 10));

    for y in 0..height {
        for x in 0..width {
            let rgb = match (x * 8 / width.max(1), (x + y) % 17) {
                (0, _) | (1, _) => Rgb::new(20, 180, 60),
                (6, _) | (7, _) => Rgb::new(200, 40, 30),
                (_, 0) => Rgb::new(20, 30, 200),
                _ => continue,
            };
            frame.set(x, y, rgb);
        }
    }

    // Guidance triangles
    for &(cx, top) in [(width / 3, height / 2), (2 * width / 3, height / 3)].iter() {
        for dy in 0..height / 4 {
            for x in cx.saturating_sub(dy)..=(cx + dy).min(width - 1) {
                frame.set(x, top + dy, Rgb::new(20, 30, 200));
            }
        }
    }

    frame
}

fn blob_benchmark(c: &mut Criterion) {
    let classify_params = ClassifyParams::default();
    let detector = BlobDetector::new(BlobParams::default());

    for &(width, height) in [(64, 48), (320, 240)].iter() {
        let frame = synthetic_frame(width, height);
        let classified = classify_frame(&frame, &classify_params);

        c.bench_function(&format!("classify_frame::{}x{}", width, height), |b| {
            b.iter(|| classify_frame(&frame, &classify_params))
        });

        c.bench_function(&format!("BlobDetector::detect::{}x{}", width, height), |b| {
            b.iter(|| detector.detect(&classified))
        });
    }
}

criterion_group!(benches, blob_benchmark);
criterion_main!(benches);
