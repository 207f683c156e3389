//! Decoder Pipeline Example
//!
//! A three-stage frame decoder (`parse -> decode -> display`) on a
//! big.LITTLE board with a shared bus between the clusters. The example:
//!
//! - evaluates three candidate mappings as one batch,
//! - picks the fastest and re-runs it with the event log enabled,
//! - prints the summary and optionally writes JSON, CSV and trace-viewer
//!   output.
//!
//! Run with `cargo run --example pipeline [config.yaml]`. The optional
//! config file uses the `simulation:` layout of [`kpnsim::config`].

use kpnsim::config::{SimConfig, SimulationParams};
use kpnsim::graph::KpnGraph;
use kpnsim::mapping::Mapping;
use kpnsim::parallel::BatchRunner;
use kpnsim::platform::{
    CommunicationPhase, CommunicationResource, ContextSwitchMode, Direction, Platform, PolicyDesc,
    Primitive, Processor, SchedulerDesc,
};
use kpnsim::registry::create_default_registry;
use kpnsim::system::System;
use kpnsim::timing::FrequencyDomain;
use kpnsim::trace::{ScriptedTraceSource, TraceSegment};

// ============================================================================
// Workload Configuration
// ============================================================================

const FRAMES: u64 = 30;
const FRAME_BYTES: u64 = 4096;
const PARSE_CYCLES: u64 = 20_000;
const DECODE_CYCLES: u64 = 120_000;
const DISPLAY_CYCLES: u64 = 15_000;

const BIG: [&str; 2] = ["big0", "big1"];
const LITTLE: [&str; 2] = ["little0", "little1"];

// ============================================================================
// Platform
// ============================================================================

fn platform() -> Platform {
    let mut platform = Platform::new("big_little");
    let fd_big = FrequencyDomain::new("fd_big", 2_000_000_000);
    let fd_little = FrequencyDomain::new("fd_little", 1_000_000_000);

    for name in BIG {
        platform.add_processor(Processor::new(name, "A76", fd_big.clone()).with_context_costs(200, 200));
    }
    for name in LITTLE {
        platform.add_processor(Processor::new(name, "A55", fd_little.clone()).with_context_costs(300, 300));
    }

    let bus = CommunicationResource::new("cci", FrequencyDomain::new("fd_bus", 800_000_000))
        .with_latency(40, 30)
        .with_throughput(16.0, 16.0);
    platform.add_resource(bus.clone());

    // every core can write to and read from shared memory over the bus
    let mut shm = Primitive::new("shm");
    for name in BIG.into_iter().chain(LITTLE) {
        shm = shm
            .with_producer(
                name,
                vec![CommunicationPhase::new("store", Direction::Write, vec![bus.clone()])],
            )
            .with_consumer(
                name,
                vec![CommunicationPhase::new("load", Direction::Read, vec![bus.clone()])],
            );
    }
    platform.add_primitive(shm);

    let policies = || {
        vec![
            PolicyDesc::new("FIFO", 500),
            PolicyDesc::new("RoundRobin", 800),
        ]
    };
    platform.add_scheduler(SchedulerDesc::new(
        "big_cluster",
        BIG.iter().map(|s| s.to_string()).collect(),
        policies(),
    ));
    platform.add_scheduler(
        SchedulerDesc::new(
            "little_cluster",
            LITTLE.iter().map(|s| s.to_string()).collect(),
            policies(),
        )
        .with_context_switch_mode(ContextSwitchMode::Always),
    );
    platform
}

// ============================================================================
// Application
// ============================================================================

fn graph() -> KpnGraph {
    let mut graph = KpnGraph::new("decoder");
    graph.add_process("parse");
    graph.add_process("decode");
    graph.add_process("display");
    graph.add_channel("bitstream", FRAME_BYTES / 4, "parse", &["decode"]);
    graph.add_channel("frames", FRAME_BYTES, "decode", &["display"]);
    graph
}

fn traces() -> ScriptedTraceSource {
    let mut parse = Vec::new();
    let mut decode = Vec::new();
    let mut display = Vec::new();
    for frame in 0..FRAMES {
        // every fifth frame is an intra frame and costs twice as much
        let decode_cycles = if frame % 5 == 0 { DECODE_CYCLES * 2 } else { DECODE_CYCLES };
        parse.push(TraceSegment::write("bitstream", 1).after_compute(PARSE_CYCLES));
        decode.push(TraceSegment::read("bitstream", 1));
        decode.push(TraceSegment::write("frames", 1).after_compute(decode_cycles));
        display.push(TraceSegment::read("frames", 1));
        display.push(TraceSegment::compute(DISPLAY_CYCLES));
    }
    for trace in [&mut parse, &mut decode, &mut display] {
        trace.push(TraceSegment::terminate());
    }

    let mut traces = ScriptedTraceSource::new();
    traces.add_trace("parse", parse);
    traces.add_trace("decode", decode);
    traces.add_trace("display", display);
    traces
}

/// Places the three stages; `decode_on_big` moves the heavy stage.
fn mapping(decode_on_big: bool, policy: &str) -> Mapping {
    let decode = if decode_on_big {
        ("big_cluster", BIG[0])
    } else {
        ("little_cluster", LITTLE[1])
    };
    Mapping::new()
        .map_process("parse", "little_cluster", LITTLE[0])
        .map_process("decode", decode.0, decode.1)
        .map_process("display", "little_cluster", LITTLE[0])
        .map_channel("bitstream", 4, "shm")
        .map_channel("frames", 2, "shm")
        .select_policy("big_cluster", policy)
        .select_policy("little_cluster", policy)
}

fn build(mapping: &Mapping, params: SimulationParams) -> System {
    match System::new(
        &platform(),
        &graph(),
        mapping,
        Box::new(traces()),
        &create_default_registry(),
        params,
    ) {
        Ok(system) => system,
        Err(e) => {
            eprintln!("invalid system: {e}");
            std::process::exit(1);
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match SimConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("cannot load {path}: {e}");
                std::process::exit(1);
            }
        },
        None => SimConfig::new(),
    };
    let params = config.simulation;
    kpnsim::init_logging(&params.log_level);

    println!("=== Decoder Pipeline Example ===");
    println!("{FRAMES} frames, parse -> decode -> display\n");

    let candidates = [
        ("decode on little, FIFO", mapping(false, "FIFO")),
        ("decode on big, FIFO", mapping(true, "FIFO")),
        ("decode on big, RoundRobin", mapping(true, "RoundRobin")),
    ];

    let mut batch = BatchRunner::new().with_threads(params.threads.unwrap_or(0));
    for (_, m) in &candidates {
        batch.add(build(m, params.clone()));
    }
    let results = batch.run();

    println!("--- Candidates ---");
    for ((label, _), result) in candidates.iter().zip(&results) {
        match result {
            Ok(r) => println!("{label:<28} {:>12} ticks", r.total_ticks),
            Err(e) => println!("{label:<28} failed: {e}"),
        }
    }

    let Some((best, _)) = BatchRunner::fastest(&results) else {
        eprintln!("no candidate completed");
        std::process::exit(1);
    };
    println!("\nFastest: {}\n", candidates[best].0);

    let record = SimulationParams {
        record_events: true,
        ..params.clone()
    };
    let result = match build(&candidates[best].1, record).run() {
        Ok(result) => result,
        Err(e) => {
            eprintln!("simulation failed: {e}");
            std::process::exit(1);
        }
    };
    print!("{}", result.summary());

    if let Some(dir) = params.output_dir.as_deref() {
        let written = std::fs::create_dir_all(dir)
            .and_then(|_| result.to_json_file(format!("{dir}/result.json")))
            .and_then(|_| result.to_csv_dir(dir))
            .and_then(|_| match result.event_log.as_ref() {
                Some(log) => log.to_json_file(format!("{dir}/trace.json")),
                None => Ok(()),
            });
        match written {
            Ok(()) => println!("\nResults written to {dir}/ (open trace.json in a trace viewer)"),
            Err(e) => eprintln!("cannot write results: {e}"),
        }
    }
}
