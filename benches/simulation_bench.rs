//! Performance benchmarks for the kpnsim engine.
//!
//! Run with: `cargo bench`
//! Or for specific bench: `cargo bench --bench simulation_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use kpnsim::config::SimulationParams;
use kpnsim::event::{EventKind, EventQueue};
use kpnsim::graph::KpnGraph;
use kpnsim::mapping::Mapping;
use kpnsim::parallel::BatchRunner;
use kpnsim::platform::{Platform, PolicyDesc, Primitive, Processor, SchedulerDesc};
use kpnsim::registry::create_default_registry;
use kpnsim::system::System;
use kpnsim::timing::FrequencyDomain;
use kpnsim::trace::{ScriptedTraceSource, TraceSegment};

// ============================================================================
// Workload
// ============================================================================

/// A linear pipeline of `stages` processes spread round-robin over `cpus`
/// processors, streaming `tokens` tokens through two-slot channels.
fn pipeline(stages: usize, cpus: usize, tokens: usize, policy: &str) -> System {
    let cpu_names: Vec<String> = (0..cpus).map(|i| format!("cpu{i}")).collect();

    let mut platform = Platform::new("bench");
    let mut shm = Primitive::new("shm");
    for name in &cpu_names {
        platform.add_processor(
            Processor::new(name.as_str(), "ARM", FrequencyDomain::new("fd", 1_000_000_000))
                .with_context_costs(20, 20),
        );
        platform.add_scheduler(SchedulerDesc::new(
            format!("sched_{name}"),
            vec![name.clone()],
            ["Dummy", "FIFO", "RoundRobin"]
                .into_iter()
                .map(|p| PolicyDesc::new(p, 50))
                .collect(),
        ));
        shm = shm
            .with_producer(name.as_str(), Vec::new())
            .with_consumer(name.as_str(), Vec::new());
    }
    platform.add_primitive(shm);

    let mut graph = KpnGraph::new("pipeline");
    let mut mapping = Mapping::new();
    let mut traces = ScriptedTraceSource::new();
    for name in &cpu_names {
        mapping = mapping.select_policy(format!("sched_{name}"), policy);
    }
    for s in 0..stages {
        let stage = format!("s{s}");
        graph.add_process(stage.as_str());
        let cpu = &cpu_names[s % cpus];
        mapping = mapping.map_process(stage.as_str(), format!("sched_{cpu}"), cpu.as_str());
        if s + 1 < stages {
            let channel = format!("c{s}");
            let next = format!("s{}", s + 1);
            graph.add_channel(channel.as_str(), 64, stage.as_str(), &[next.as_str()]);
            mapping = mapping.map_channel(channel, 2, "shm");
        }

        let mut trace = Vec::with_capacity(tokens * 2 + 1);
        for t in 0..tokens {
            if s > 0 {
                trace.push(TraceSegment::read(format!("c{}", s - 1), 1));
            }
            let work = 100 + (t as u64 * 7 + s as u64 * 13) % 50;
            if s + 1 < stages {
                trace.push(TraceSegment::write(format!("c{s}"), 1).after_compute(work));
            } else {
                trace.push(TraceSegment::compute(work));
            }
        }
        trace.push(TraceSegment::terminate());
        traces.add_trace(stage, trace);
    }

    System::new(
        &platform,
        &graph,
        &mapping,
        Box::new(traces),
        &create_default_registry(),
        SimulationParams::default(),
    )
    .expect("benchmark system is valid")
}

// ============================================================================
// Engine Benchmarks
// ============================================================================

fn bench_pipeline_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_stages");

    for stages in [2, 8, 32].iter() {
        group.throughput(Throughput::Elements(*stages as u64 * 100));
        group.bench_with_input(BenchmarkId::new("stages", stages), stages, |b, &stages| {
            b.iter_batched(
                || pipeline(stages, 4, 100, "FIFO"),
                |mut system| black_box(system.run().expect("pipeline completes")),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_pipeline_tokens(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_tokens");

    for tokens in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*tokens as u64));
        group.bench_with_input(BenchmarkId::new("tokens", tokens), tokens, |b, &tokens| {
            b.iter_batched(
                || pipeline(4, 2, tokens, "FIFO"),
                |mut system| black_box(system.run().expect("pipeline completes")),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("policies");

    for policy in ["Dummy", "FIFO", "RoundRobin"] {
        group.bench_function(policy, |b| {
            b.iter_batched(
                || pipeline(8, 1, 200, policy),
                |mut system| black_box(system.run().expect("pipeline completes")),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// ============================================================================
// Batch Benchmarks
// ============================================================================

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    let candidates = 8;

    group.bench_function("one_by_one", |b| {
        b.iter_batched(
            || (0..candidates).map(|i| pipeline(8, 1 + i % 4, 200, "FIFO")).collect::<Vec<_>>(),
            |systems| {
                for mut system in systems {
                    black_box(system.run().expect("pipeline completes"));
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.bench_function("batch_runner", |b| {
        b.iter_batched(
            || {
                let mut batch = BatchRunner::new();
                for i in 0..candidates {
                    batch.add(pipeline(8, 1 + i % 4, 200, "FIFO"));
                }
                batch
            },
            |batch| black_box(batch.run()),
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

// ============================================================================
// Event Queue Benchmarks
// ============================================================================

fn bench_event_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_queue");

    for num_events in [1000, 10000, 100000].iter() {
        group.throughput(Throughput::Elements(*num_events as u64));

        // Push benchmark
        group.bench_with_input(
            BenchmarkId::new("push", num_events),
            num_events,
            |b, &num_events| {
                b.iter(|| {
                    let mut queue = EventQueue::new();
                    for i in 0..num_events as u64 {
                        queue.push(i % 97, EventKind::Resume { process: i as usize });
                    }
                    black_box(queue.len());
                });
            },
        );

        // Pop benchmark
        group.bench_with_input(
            BenchmarkId::new("pop", num_events),
            num_events,
            |b, &num_events| {
                b.iter_batched(
                    || {
                        let mut queue = EventQueue::new();
                        for i in 0..num_events as u64 {
                            queue.push(i % 97, EventKind::Resume { process: i as usize });
                        }
                        queue
                    },
                    |mut queue| {
                        while queue.pop().is_some() {}
                        black_box(queue.len());
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

// ============================================================================
// Criterion Groups
// ============================================================================

criterion_group!(
    benches,
    bench_pipeline_stages,
    bench_pipeline_tokens,
    bench_policies,
    bench_batch,
    bench_event_queue,
);

criterion_main!(benches);
