//! Benchmarks for the frame pipeline.
//!
//! Measures end-to-end frame throughput across stage counts and channel
//! capacities.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kurosawa::{Frame, Pipeline, Scope};
use ks_pipeline::{FrameRateStage, MapStage, PassThrough};

const FRAMES: u64 = 1_000;

fn frames(size: usize) -> Vec<Frame> {
    (0..FRAMES)
        .map(|i| Frame::new(vec![0u8; size], Duration::from_millis(i * 33)))
        .collect()
}

fn bench_stage_count(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("pipeline_stages");
    group.throughput(Throughput::Elements(FRAMES));

    for stages in [1usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(stages), &stages, |b, &stages| {
            b.iter(|| {
                rt.block_on(async {
                    let mut pipeline = Pipeline::new();
                    for n in 0..stages {
                        pipeline
                            .add_stage(PassThrough::new(format!("pass-{n}")))
                            .unwrap();
                    }
                    black_box(pipeline.run(&Scope::new(), frames(64)).await.unwrap())
                })
            });
        });
    }

    group.finish();
}

fn bench_capacity(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("pipeline_capacity");
    group.throughput(Throughput::Elements(FRAMES));

    for capacity in [1usize, 16, 128] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    rt.block_on(async {
                        let mut pipeline = Pipeline::with_capacity(capacity);
                        pipeline
                            .add_stage(MapStage::new("touch", |f: Frame| Ok(f)))
                            .unwrap();
                        pipeline.add_stage(FrameRateStage::new(15.0).unwrap()).unwrap();
                        black_box(pipeline.run(&Scope::new(), frames(1024)).await.unwrap())
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_stage_count, bench_capacity);
criterion_main!(benches);
