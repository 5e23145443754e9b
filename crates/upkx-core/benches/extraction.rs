//! Benchmarks for package extraction, preview and scanning throughput.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use std::hint::black_box;
use tempfile::TempDir;
use upkx_core::ExtractionOptions;
use upkx_core::PreviewOptions;
use upkx_core::ScanOptions;
use upkx_core::extract_package;
use upkx_core::preview_package;
use upkx_core::scan_package;
use upkx_core::test_utils::PackageBuilder;
use upkx_core::test_utils::write_package;

/// Pseudo-random content that gzip cannot shrink much.
fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state.to_le_bytes()[0]
        })
        .collect()
}

fn package_with(asset_count: usize, asset_size: usize) -> Vec<u8> {
    let mut builder = PackageBuilder::new();
    for i in 0..asset_count {
        builder = builder.asset(
            &format!("{i:032x}"),
            &format!("Assets/Bench/file_{i:05}.bytes"),
            &noise(asset_size, i as u64),
        );
    }
    builder.build()
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    group.sample_size(10);

    for (count, size) in [(1000usize, 1024usize), (50, 256 * 1024), (4, 8 * 1024 * 1024)] {
        let temp = TempDir::new().unwrap();
        let package = write_package(temp.path(), "bench.unitypackage", &package_with(count, size));
        group.throughput(Throughput::Bytes((count * size) as u64));

        for workers in [1usize, 4] {
            let options = ExtractionOptions::default()
                .with_organize_by_categories(false)
                .with_workers(workers);
            group.bench_with_input(
                BenchmarkId::new(format!("{count}x{size}"), workers),
                &options,
                |b, options| {
                    b.iter(|| {
                        let out = TempDir::new().unwrap();
                        black_box(extract_package(&package, out.path(), options).unwrap());
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_preview_and_scan(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let package = write_package(temp.path(), "bench.unitypackage", &package_with(500, 16 * 1024));

    let mut group = c.benchmark_group("inspect");
    group.throughput(Throughput::Bytes(500 * 16 * 1024));
    group.bench_function("preview", |b| {
        b.iter(|| black_box(preview_package(&package, &PreviewOptions::default()).unwrap()));
    });
    group.bench_function("scan_package", |b| {
        b.iter(|| black_box(scan_package(&package, ScanOptions::default()).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_extract, bench_preview_and_scan);
criterion_main!(benches);
