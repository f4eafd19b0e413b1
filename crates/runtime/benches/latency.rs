use criterion::{black_box, criterion_group, criterion_main, Criterion};
use core_sim::{EngineConfig, InstrumentId, TickGenerator, ZeroCost};
use runtime::{logging::NullRunLogWriter, metrics::RoundLatencyMetrics, Engine, TARGET_ROUNDS_PER_SEC};
use std::time::Instant;
use strategy::{strategies::PriceBand, SizingConfig};
use tokio::runtime::Builder;

const LATENCY_SAMPLES: usize = 5_000;

fn engine() -> Engine {
    let band = PriceBand::new(InstrumentId::new("ES"), 100.0, 0.5, SizingConfig::default())
        .expect("valid band");
    Engine::builder(EngineConfig::default())
        .cost_model(ZeroCost)
        .strategy("band", band)
        .build()
        .expect("engine should build")
}

fn bench_round_latency(c: &mut Criterion) {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime should build");

    let mut metrics = RoundLatencyMetrics::new();
    runtime.block_on(async {
        let mut engine = engine();
        let ticks = TickGenerator::new(11, &["ES", "NQ"], 100.0, 0.5).take(LATENCY_SAMPLES);
        for tick in ticks {
            let started = Instant::now();
            let output = engine
                .process_tick(tick, &mut NullRunLogWriter)
                .await
                .expect("generated ticks are ordered");
            metrics.record(started.elapsed());
            black_box(output);
        }
    });

    if let Some(report) = metrics.percentiles() {
        let budget_micros = 1_000_000 / TARGET_ROUNDS_PER_SEC;
        println!(
            "latency_budget_micros={budget_micros} p50_micros={} p90_micros={} p99_micros={} max_micros={} samples={}",
            report.p50_micros, report.p90_micros, report.p99_micros, report.max_micros, report.count
        );
    }

    c.bench_function("round_latency_process_tick", |b| {
        let mut engine = engine();
        let mut ticks = TickGenerator::new(13, &["ES", "NQ"], 100.0, 0.5);
        b.iter(|| {
            let tick = ticks.next_tick();
            runtime.block_on(async {
                let output = engine
                    .process_tick(tick, &mut NullRunLogWriter)
                    .await
                    .expect("generated ticks are ordered");
                black_box(output);
            });
        });
    });
}

criterion_group!(benches, bench_round_latency);
criterion_main!(benches);
