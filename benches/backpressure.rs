use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flow_pipeline::{translate, IterSource, MapStage, PipelineBuilder, PipelineConfig};
use std::io::{self, Cursor};
use std::time::Duration;

fn benchmark_slow_consumer(c: &mut Criterion) {
    let mut group = c.benchmark_group("slow_consumer_1000_msgs");
    for capacity in [1usize, 5, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let (pipeline, mut output) = PipelineBuilder::new()
                    .with_capacity(capacity)
                    .source(IterSource::new("producer", 0u32..1000))
                    .expect("Build failed")
                    .stage(MapStage::new("slow", |v: u32| {
                        std::thread::sleep(Duration::from_micros(10));
                        Ok(v)
                    }))
                    .into_output();

                let running = pipeline.start().expect("Start failed");
                black_box(output.collect_values().expect("Drain failed"));
                running.wait().expect("Wait failed")
            });
        });
    }
    group.finish();
}

fn benchmark_translate_capacity(c: &mut Criterion) {
    let program = "+>-<.,[]".repeat(5_000).into_bytes();

    let mut group = c.benchmark_group("translate_40000_symbols");
    for capacity in [1usize, 5, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let config = PipelineConfig {
                    capacity,
                    ..PipelineConfig::default()
                };
                translate(Cursor::new(black_box(program.clone())), io::sink(), config)
                    .expect("Translate failed")
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(15))
        .sample_size(20);
    targets = benchmark_slow_consumer, benchmark_translate_capacity
);
criterion_main!(benches);
