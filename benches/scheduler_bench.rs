// Scheduler Performance Benchmarks
// Measures submission-to-completion throughput for flat fan-out batches and
// permit chains under the default worker complement.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use weft::{Options, Scheduler};

fn noop(_data: *mut ()) {}

fn bench_options() -> Options {
    Options {
        workers: -1,
        main_thread_does_work: true,
        tasks: 8192,
        permits: 8192,
        queue: 8192,
        ..Options::default()
    }
}

fn bench_fan_out(c: &mut Criterion) {
    let scheduler = Scheduler::new(bench_options()).unwrap();

    let mut group = c.benchmark_group("fan_out");
    for &count in &[64usize, 512, 2048] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let handles: Vec<_> = (0..count)
                    .map(|_| scheduler.describe(noop, std::ptr::null_mut(), 0))
                    .collect();
                scheduler.kick_and_do_work_while_waiting_n(black_box(&handles));
            });
        });
    }
    group.finish();

    scheduler.shutdown();
}

fn bench_chain(c: &mut Criterion) {
    let scheduler = Scheduler::new(bench_options()).unwrap();

    let mut group = c.benchmark_group("chain");
    for &length in &[16usize, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, &length| {
            b.iter(|| {
                let handles: Vec<_> = (0..length)
                    .map(|_| scheduler.describe(noop, std::ptr::null_mut(), 0))
                    .collect();
                for pair in handles.windows(2) {
                    scheduler.permits(pair[0], pair[1]);
                }
                scheduler.kick_and_do_work_while_waiting_n(black_box(&handles));
            });
        });
    }
    group.finish();

    scheduler.shutdown();
}

criterion_group!(benches, bench_fan_out, bench_chain);
criterion_main!(benches);
