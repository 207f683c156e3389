//! # kpnsim
//!
//! A tick-accurate discrete-event simulator for Kahn process network
//! applications mapped onto multiprocessor platforms.
//!
//! ## Design Principles
//!
//! - **Trace-Driven**: Each process replays a trace of compute, read and
//!   write segments. The simulator never executes application code; it only
//!   accounts for time.
//! - **Mapping as Input**: A [`Platform`](platform::Platform), an application
//!   graph ([`KpnGraph`](graph::KpnGraph)) and a [`Mapping`](mapping::Mapping)
//!   are combined by [`System`](system::System) into runtime objects. Bad
//!   combinations fail before any simulated time passes.
//! - **Unified Timeline**: All processors share one picosecond-resolution
//!   clock ([`SimTime`]). Cycle counts are converted per frequency domain.
//! - **Deterministic**: Events at the same tick fire in scheduling order, so
//!   the same inputs always produce the same result.
//!
//! ## Features
//!
//! - `parallel` - Run batches of independent systems on a rayon pool
//!
//! ## Quick Start
//!
//! ```rust
//! use kpnsim::config::SimulationParams;
//! use kpnsim::graph::KpnGraph;
//! use kpnsim::mapping::Mapping;
//! use kpnsim::platform::{Platform, PolicyDesc, Primitive, Processor, SchedulerDesc};
//! use kpnsim::registry::create_default_registry;
//! use kpnsim::system::System;
//! use kpnsim::timing::FrequencyDomain;
//! use kpnsim::trace::{ScriptedTraceSource, TraceSegment};
//!
//! let mut platform = Platform::new("board");
//! platform.add_processor(Processor::new("cpu0", "ARM", FrequencyDomain::new("fd", 1_000_000_000)));
//! platform.add_primitive(
//!     Primitive::new("shm")
//!         .with_producer("cpu0", vec![])
//!         .with_consumer("cpu0", vec![]),
//! );
//! platform.add_scheduler(SchedulerDesc::new(
//!     "sched0",
//!     vec!["cpu0".to_string()],
//!     vec![PolicyDesc::new("FIFO", 0)],
//! ));
//!
//! let mut graph = KpnGraph::new("app");
//! graph.add_process("src");
//! graph.add_process("sink");
//! graph.add_channel("c", 4, "src", &["sink"]);
//!
//! let mapping = Mapping::new()
//!     .map_process("src", "sched0", "cpu0")
//!     .map_process("sink", "sched0", "cpu0")
//!     .map_channel("c", 1, "shm")
//!     .select_policy("sched0", "FIFO");
//!
//! let traces = ScriptedTraceSource::new()
//!     .with_trace("src", vec![TraceSegment::write("c", 1), TraceSegment::terminate()])
//!     .with_trace("sink", vec![TraceSegment::read("c", 1), TraceSegment::terminate()]);
//!
//! let mut system = System::new(
//!     &platform,
//!     &graph,
//!     &mapping,
//!     Box::new(traces),
//!     &create_default_registry(),
//!     SimulationParams::default(),
//! )
//! .unwrap();
//!
//! let result = system.run().unwrap();
//! assert_eq!(result.channel("c").unwrap().tokens_written, 1);
//! println!("{}", result.summary());
//! ```
//!
//! ## Batch Execution
//!
//! Enable the `parallel` feature to evaluate candidate mappings concurrently:
//!
//! ```rust,ignore
//! use kpnsim::parallel::BatchRunner;
//!
//! let mut batch = BatchRunner::new().with_threads(4);
//! // ... add one System per candidate mapping
//! let results = batch.run();
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use kpnsim::config::SimConfig;
//!
//! let config = SimConfig::from_yaml_file("simulation.yaml")?;
//! kpnsim::init_logging(&config.simulation.log_level);
//! ```

pub mod types;
pub mod timing;
pub mod platform;
pub mod graph;
pub mod mapping;
pub mod trace;
pub mod channel;
pub mod process;
pub mod event;
pub mod scheduler;
pub mod policies;
pub mod registry;
pub mod engine;
pub mod system;
pub mod event_log;
pub mod stats;
pub mod config;
pub mod error;
pub mod parallel;

// Re-export commonly used types
pub use types::{ChannelId, Cycles, LaneId, ProcessId, SchedulerId, SimTime};
pub use timing::{FrequencyDomain, TICKS_PER_SECOND};
pub use platform::{ContextSwitchMode, Platform, PolicyDesc, Primitive, Processor, SchedulerDesc};
pub use graph::KpnGraph;
pub use mapping::Mapping;
pub use trace::{ScriptedTraceSource, TraceSegment, TraceSource};
pub use channel::{ChannelRole, RuntimeChannel};
pub use process::{ProcessState, RuntimeProcess};
pub use event::{Event, EventKind, EventQueue};
pub use scheduler::RuntimeScheduler;
pub use policies::SchedulingPolicy;
pub use registry::{create_default_registry, PolicyRegistry};
pub use engine::SimulationEngine;
pub use system::System;
pub use event_log::EventLog;
pub use stats::{SimulationResult, Timer};
pub use config::{ConfigError, SimConfig, SimConfigBuilder, SimulationParams};
pub use error::{
    ConfigurationError, ExhaustionError, ProtocolViolation, SimError, SimResult, StallCause,
};
pub use parallel::BatchRunner;

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging. `RUST_LOG`
/// overrides `level` when set.
///
/// # Example
///
/// ```rust,ignore
/// kpnsim::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    // a second call (tests, batch tools) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
