//! # Throughput & latency
//!
//! Mirrors the throughput/latency split used for the original SPSC channel
//! benchmarks: one case drives as many values as the buffer/backpressure
//! protocol allows, the other measures the cost of a single round trip with
//! no backlog.

use costream::buffer::FixedBuffer;
use costream::Stream;
use criterion::{criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;

const BUFFER_SIZE: usize = 1024;
const TOTAL_MESSAGES: usize = 100_000;

fn rt() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn throughput(c: &mut Criterion) {
    c.bench_function("stream_throughput", |b| {
        b.iter_batched(
            rt,
            |rt| {
                rt.block_on(async {
                    let s: Stream<i32> =
                        Stream::new(Box::new(FixedBuffer::new(BUFFER_SIZE).unwrap()), |push, close, _stop| async move {
                            for i in 0..TOTAL_MESSAGES {
                                if push.push(i as i32).await.is_err() {
                                    break;
                                }
                            }
                            close.close(None);
                            Ok(None)
                        });

                    let mut received = 0usize;
                    while s.next().await.unwrap().is_some() {
                        received += 1;
                    }
                    criterion::black_box(received);
                });
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn single_round_trip_latency(c: &mut Criterion) {
    c.bench_function("stream_single_round_trip", |b| {
        b.iter_batched(
            rt,
            |rt| {
                rt.block_on(async {
                    let s: Stream<i32> = Stream::new(Box::new(FixedBuffer::new(0).unwrap()), |push, close, _stop| async move {
                        push.push(1).await.ok();
                        close.close(None);
                        Ok(None)
                    });
                    criterion::black_box(s.next().await.unwrap());
                });
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, throughput, single_round_trip_latency);
criterion_main!(benches);
