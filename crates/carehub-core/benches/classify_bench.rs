//! Criterion benchmarks for device classification and image header probing.
//!
//! Both run once per frame on the hot path: classification for every frame
//! of a session that has not identified itself yet, probing for every camera
//! frame.
//!
//! Run with:
//! ```bash
//! cargo bench --package carehub-core --bench classify_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use carehub_core::{probe_image, Classification};

// ── Fixtures ──────────────────────────────────────────────────────────────────

const IDENTIFICATION_MESSAGES: &[&str] = &[
    "CAM-livingroom",
    "WEARABLE band-02",
    "TEST diagnostic client",
    "hello from an unknown device with a fairly long banner string",
];

fn png_frame(width: u32, height: u32, body_len: usize) -> Vec<u8> {
    let mut buf = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    buf.extend_from_slice(&13u32.to_be_bytes());
    buf.extend_from_slice(b"IHDR");
    buf.extend_from_slice(&width.to_be_bytes());
    buf.extend_from_slice(&height.to_be_bytes());
    buf.extend_from_slice(&[8, 2, 0, 0, 0]);
    buf.resize(buf.len() + body_len, 0);
    buf
}

fn jpeg_frame(width: u16, height: u16, app_segments: usize) -> Vec<u8> {
    let mut buf = vec![0xFF, 0xD8];
    for _ in 0..app_segments {
        // APPn with a 64-byte body
        buf.extend_from_slice(&[0xFF, 0xE1, 0x00, 0x42]);
        buf.extend_from_slice(&[0u8; 64]);
    }
    buf.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    buf.extend_from_slice(&height.to_be_bytes());
    buf.extend_from_slice(&width.to_be_bytes());
    buf.extend_from_slice(&[3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
    buf
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_identify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");

    for message in IDENTIFICATION_MESSAGES {
        group.bench_with_input(BenchmarkId::new("identify", message), message, |b, m| {
            b.iter(|| Classification::identify(black_box(m)))
        });
    }

    group.finish();
}

fn bench_probe(c: &mut Criterion) {
    let mut group = c.benchmark_group("image_probe");

    let png = png_frame(1280, 720, 64 * 1024);
    group.bench_function("png_64k", |b| b.iter(|| probe_image(black_box(&png))));

    for segments in [0usize, 4, 16] {
        let jpeg = jpeg_frame(1280, 720, segments);
        group.bench_with_input(
            BenchmarkId::new("jpeg_app_segments", segments),
            &jpeg,
            |b, data| b.iter(|| probe_image(black_box(data))),
        );
    }

    group.bench_function("unknown_format", |b| {
        b.iter(|| probe_image(black_box(b"definitely not an image")))
    });

    group.finish();
}

criterion_group!(benches, bench_identify, bench_probe);
criterion_main!(benches);
