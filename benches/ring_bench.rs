//! Benchmarks for the subtask ring.
//!
//! Benchmarks cover:
//! - Same-thread produce/consume pairs
//! - Batch admission at varying batch sizes
//! - Cross-thread single-producer/single-consumer handoff

use std::hint::black_box;
use std::thread;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use offload_admission::core::ring::{self, RingConsume};
use offload_admission::core::AdmissionError;

fn bench_produce_consume_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring/produce_consume");
    group.throughput(Throughput::Elements(1));
    group.bench_function("single", |b| {
        let (mut producer, mut consumer) = ring::bounded::<u64>(64);
        b.iter(|| {
            producer.produce(black_box(1u64)).unwrap();
            match consumer.consume() {
                RingConsume::Item(v) => black_box(v),
                RingConsume::Stopped => unreachable!(),
            }
        });
    });
    group.finish();
}

fn bench_batch_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring/batch");
    for batch in [1usize, 4, 16] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let (mut producer, mut consumer) = ring::bounded::<u64>(64);
            b.iter(|| {
                producer
                    .try_produce_batch((0..batch as u64).collect())
                    .unwrap();
                for _ in 0..batch {
                    match consumer.consume() {
                        RingConsume::Item(v) => {
                            black_box(v);
                        }
                        RingConsume::Stopped => unreachable!(),
                    }
                }
            });
        });
    }
    group.finish();
}

fn bench_cross_thread_handoff(c: &mut Criterion) {
    const ITEMS: u64 = 10_000;

    let mut group = c.benchmark_group("ring/spsc_handoff");
    group.throughput(Throughput::Elements(ITEMS));
    group.sample_size(10);
    group.bench_function("10k_items", |b| {
        b.iter(|| {
            let (mut producer, mut consumer) = ring::bounded::<u64>(64);
            let feeder = thread::spawn(move || {
                for i in 0..ITEMS {
                    loop {
                        match producer.produce(i) {
                            Ok(()) => break,
                            Err(AdmissionError::QueueFull { .. }) => thread::yield_now(),
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                }
            });
            let mut total = 0u64;
            for _ in 0..ITEMS {
                match consumer.consume() {
                    RingConsume::Item(v) => total += v,
                    RingConsume::Stopped => unreachable!(),
                }
            }
            feeder.join().unwrap();
            black_box(total)
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_produce_consume_pair,
    bench_batch_admission,
    bench_cross_thread_handoff
);
criterion_main!(benches);
