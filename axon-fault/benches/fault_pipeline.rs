//! Mirrors `neuron-context`'s `compaction` bench: a `benchmark_group`
//! parameterized over a size axis, here the number of attempts before the
//! operation behind the pipeline succeeds.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axon_fault::{Backoff, FaultTolerance, RetryPolicy};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio_util::sync::CancellationToken;

fn bench_fault_tolerance(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("fault_tolerance_execute");

    for attempts_before_success in [1u32, 3, 5] {
        group.bench_function(format!("{attempts_before_success}_attempts"), |b| {
            b.iter(|| {
                let pipeline = FaultTolerance::passthrough().with_retry(RetryPolicy {
                    max_attempts: attempts_before_success,
                    backoff: Backoff::Fixed(Duration::ZERO),
                    jitter: 0.0,
                });
                let calls = AtomicU32::new(0);
                let cancel = CancellationToken::new();
                rt.block_on(async {
                    let result: Result<u32, _> = pipeline
                        .execute(&cancel, |_: &&str| true, || {
                            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                            async move {
                                if attempt < attempts_before_success {
                                    Err("not yet")
                                } else {
                                    Ok(black_box(attempt))
                                }
                            }
                        })
                        .await;
                    result.unwrap()
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fault_tolerance);
criterion_main!(benches);
