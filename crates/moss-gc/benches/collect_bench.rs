//! Collector Benchmarks
//!
//! Measures cycle pause times and allocation throughput.
//!
//! Run with: `cargo bench -p moss-gc`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use moss_gc::{Collector, GcConfig, PointerValidity, ScanRange};
use std::hint::black_box;
use std::time::{Duration, Instant};

/// Allocate `n` blocks and return a root frame holding every other one
fn populate(gc: &mut Collector, n: usize) -> Vec<usize> {
    let mut frame = Vec::with_capacity(n / 2);
    for i in 0..n {
        let block = gc.zero_allocate(4, 8).unwrap();
        if i % 2 == 0 {
            frame.push(block.as_ptr() as usize);
        }
    }
    frame
}

/// Pause time with half the heap rooted
fn cycle_pause_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_pause");

    for num_blocks in [100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("blocks", num_blocks),
            num_blocks,
            |b, &n| {
                b.iter_custom(|iters| {
                    let mut total = Duration::ZERO;
                    for _ in 0..iters {
                        let mut gc = Collector::new();
                        let frame = populate(&mut gc, n);

                        let start = Instant::now();
                        let stats = gc.collect_from(&[ScanRange::of_words(&frame)]);
                        total += start.elapsed();

                        black_box(stats);
                    }
                    total
                });
            },
        );
    }

    group.finish();
}

/// Exact lookups against interior lookups on the same heap
fn lookup_mode_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_mode");
    let n = 5000;

    for (name, validity) in [
        ("exact", PointerValidity::Exact),
        ("interior", PointerValidity::Interior),
    ] {
        group.bench_function(name, |b| {
            let mut gc = Collector::with_config(GcConfig::default().with_pointer_validity(validity));
            let frame = populate(&mut gc, n);
            b.iter(|| black_box(gc.collect_from(&[ScanRange::of_words(&frame)])));
        });
    }

    group.finish();
}

/// Raw allocation throughput without cycles
fn allocation_benchmark(c: &mut Criterion) {
    c.bench_function("allocate_1000", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let mut gc = Collector::with_config(GcConfig::default().with_lazy_anchor(false));
                let start = Instant::now();
                for size in 1..=1000 {
                    black_box(gc.allocate(size).unwrap());
                }
                total += start.elapsed();
            }
            total
        });
    });
}

criterion_group!(
    benches,
    cycle_pause_benchmark,
    lookup_mode_benchmark,
    allocation_benchmark
);
criterion_main!(benches);
