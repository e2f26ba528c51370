//! Allocation strategy benchmarks.
//!
//! Each iteration allocates a fresh buffer, so first-write numbers include the
//! page faults a strategy leaves behind. Allocator reuse between iterations
//! can hide them for small sizes.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lazyalloc_core::AllocationStrategy;
use lazyalloc_core::config::BYTES_PER_MIB;

const SIZES_MIB: &[usize] = &[1, 4, 16];

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate");
    for &mib in SIZES_MIB {
        let size = mib * BYTES_PER_MIB;
        group.throughput(Throughput::Bytes(size as u64));
        for strategy in AllocationStrategy::ALL {
            group.bench_with_input(BenchmarkId::new(strategy.label(), mib), &size, |b, &sz| {
                b.iter(|| {
                    let buf = strategy.allocate(sz).ok();
                    criterion::black_box(buf);
                });
            });
        }
    }
    group.finish();
}

fn bench_first_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_write");
    group.sample_size(20);
    for &mib in SIZES_MIB {
        let size = mib * BYTES_PER_MIB;
        group.throughput(Throughput::Bytes(size as u64));
        for strategy in AllocationStrategy::ALL {
            group.bench_with_input(BenchmarkId::new(strategy.label(), mib), &size, |b, &sz| {
                b.iter(|| {
                    if let Ok(mut buf) = strategy.allocate(sz) {
                        buf.fill_sequential();
                        criterion::black_box(&buf);
                    }
                });
            });
        }
    }
    group.finish();
}

fn bench_steady_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("steady_write");
    for &mib in SIZES_MIB {
        let size = mib * BYTES_PER_MIB;
        group.throughput(Throughput::Bytes(size as u64));
        for strategy in AllocationStrategy::ALL {
            let Ok(mut buf) = strategy.allocate(size) else {
                continue;
            };
            buf.fill_sequential();
            group.bench_function(BenchmarkId::new(strategy.label(), mib), |b| {
                b.iter(|| {
                    buf.fill_sequential();
                    criterion::black_box(&buf);
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_allocate, bench_first_write, bench_steady_write);
criterion_main!(benches);
