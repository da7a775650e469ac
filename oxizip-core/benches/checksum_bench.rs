//! Throughput benchmarks for the CRC-32 and Adler-32 implementations.
//!
//! Covers small inputs (below the slicing-by-8 threshold), large inputs, and
//! a split-update case that exercises the running-value API.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxizip_core::checksum::{ADLER32_INIT, Adler32, CRC32_INIT, Crc32, adler32, crc32};
use std::hint::black_box;

fn text_like(size: usize) -> Vec<u8> {
    let text = b"The quick brown fox jumps over the lazy dog. ";
    text.iter().copied().cycle().take(size).collect()
}

const SIZES: [(&str, usize); 4] = [
    ("16B", 16),
    ("4KB", 4 * 1024),
    ("64KB", 64 * 1024),
    ("1MB", 1024 * 1024),
];

fn bench_crc32(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32");
    for (name, size) in SIZES {
        let data = text_like(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &data, |b, data| {
            b.iter(|| black_box(Crc32::compute(black_box(data))));
        });
    }
    group.finish();
}

fn bench_adler32(c: &mut Criterion) {
    let mut group = c.benchmark_group("adler32");
    for (name, size) in SIZES {
        let data = text_like(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &data, |b, data| {
            b.iter(|| black_box(Adler32::compute(black_box(data))));
        });
    }
    group.finish();
}

fn bench_incremental(c: &mut Criterion) {
    let data = text_like(64 * 1024);
    let mut group = c.benchmark_group("incremental_4k_chunks");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("crc32", |b| {
        b.iter(|| {
            let value = data
                .chunks(4096)
                .fold(CRC32_INIT, |acc, chunk| crc32(acc, black_box(chunk)));
            black_box(value)
        });
    });
    group.bench_function("adler32", |b| {
        b.iter(|| {
            let value = data
                .chunks(4096)
                .fold(ADLER32_INIT, |acc, chunk| adler32(acc, black_box(chunk)));
            black_box(value)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_crc32, bench_adler32, bench_incremental);
criterion_main!(benches);
