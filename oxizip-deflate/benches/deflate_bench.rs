//! Compression and decompression throughput across levels.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxizip_core::traits::{Decompressor, FlushMode};
use oxizip_deflate::{Deflater, StreamInflater, deflate, inflate};
use std::hint::black_box;

fn text_like(size: usize) -> Vec<u8> {
    let words: &[&[u8]] = &[
        b"archive ", b"entry ", b"central ", b"directory ", b"local ", b"header ", b"stored ",
        b"deflated ", b"window ", b"match ",
    ];
    let mut data = Vec::with_capacity(size);
    let mut seed = 7u32;
    while data.len() < size {
        seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        data.extend_from_slice(words[(seed >> 16) as usize % words.len()]);
    }
    data.truncate(size);
    data
}

fn bench_deflate_levels(c: &mut Criterion) {
    let data = text_like(256 * 1024);
    let mut group = c.benchmark_group("deflate");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for level in [1u8, 3, 6, 9] {
        group.bench_with_input(BenchmarkId::from_parameter(level), &data, |b, data| {
            b.iter(|| black_box(deflate(black_box(data), level).unwrap()));
        });
    }
    group.finish();
}

fn bench_deflate_sync_flushes(c: &mut Criterion) {
    let data = text_like(256 * 1024);
    let mut group = c.benchmark_group("deflate_sync_every_4k");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("level6", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            let mut deflater = Deflater::new(6);
            for chunk in data.chunks(4096) {
                deflater
                    .compress_to(chunk, FlushMode::Sync, |bytes| {
                        out.extend_from_slice(bytes);
                        Ok(())
                    })
                    .unwrap();
            }
            deflater
                .compress_to(&[], FlushMode::Finish, |bytes| {
                    out.extend_from_slice(bytes);
                    Ok(())
                })
                .unwrap();
            black_box(out)
        });
    });
    group.finish();
}

fn bench_inflate(c: &mut Criterion) {
    let data = text_like(256 * 1024);
    let packed = deflate(&data, 6).unwrap();
    let mut group = c.benchmark_group("inflate");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("one_shot", |b| {
        b.iter(|| black_box(inflate(black_box(&packed)).unwrap()));
    });
    group.bench_function("ring_buffer", |b| {
        b.iter(|| {
            let mut inflater = StreamInflater::new();
            black_box(inflater.decompress_all(black_box(&packed)).unwrap())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_deflate_levels, bench_deflate_sync_flushes, bench_inflate);
criterion_main!(benches);
