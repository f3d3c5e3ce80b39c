//! Benchmarks for number spelling and batch execution.

use batchflow::prelude::*;
use batchflow::testing::{image_inputs, StaticCompute};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use futures::StreamExt;

fn words_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_words");
    for value in [7_i64, 1_234, 250_000, 999_999_999_999] {
        group.bench_with_input(BenchmarkId::from_parameter(value), &value, |b, &v| {
            b.iter(|| to_words(black_box(v)));
        });
    }
    group.finish();
}

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let engine = PipelineEngine::builder("bench")
        .stage("load", StaticCompute::lines(["loaded"]))
        .stage("analyse", StaticCompute::lines(["analysed"]))
        .stage("report", StaticCompute::lines(["reported"]))
        .config(EngineConfig::new().with_events(false))
        .build()
        .unwrap();

    let mut group = c.benchmark_group("run_batch");
    for items in [1_usize, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(items), &items, |b, &n| {
            b.iter(|| {
                runtime.block_on(async {
                    let batch = engine.submit(image_inputs(n)).unwrap();
                    let count = engine.run(batch.id).unwrap().count().await;
                    engine.clear(batch.id).unwrap();
                    black_box(count)
                })
            });
        });
    }
    group.finish();
}

criterion_group!(benches, words_benchmark, pipeline_benchmark);
criterion_main!(benches);
