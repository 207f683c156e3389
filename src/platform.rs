//! Static description of the hardware platform.
//!
//! A [`Platform`] lists processors, communication resources, communication
//! primitives and schedulers. It is built once, validated, and then only
//! referenced: runtime objects keep indices or clones of the small pieces
//! they need.
//!
//! # Communication cost model
//!
//! A [`Primitive`] describes how data moves from a producing processor to a
//! consuming processor. Each side is an ordered list of
//! [`CommunicationPhase`]s; a phase touches a set of
//! [`CommunicationResource`]s in one direction. For a transfer of `s` bytes
//! a phase costs
//!
//! ```text
//! latency_sum + ceil(s / min_throughput)
//! ```
//!
//! cycles, where `latency_sum` adds every resource's latency in the phase's
//! direction and `min_throughput` is the bottleneck throughput (bytes per
//! cycle). Latencies are converted in each resource's own frequency domain;
//! the transfer term is converted in the bottleneck resource's domain.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigurationError;
use crate::timing::FrequencyDomain;
use crate::types::{Cycles, SimTime};

/// A processing element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Processor {
    pub name: String,
    /// Processor type tag used to select type-specific traces
    pub processor_type: String,
    pub frequency_domain: FrequencyDomain,
    /// Cycles needed to load a process context
    #[serde(default)]
    pub context_load_cycles: Option<Cycles>,
    /// Cycles needed to store a process context
    #[serde(default)]
    pub context_store_cycles: Option<Cycles>,
}

impl Processor {
    /// Creates a processor without context switch costs.
    pub fn new(
        name: impl Into<String>,
        processor_type: impl Into<String>,
        frequency_domain: FrequencyDomain,
    ) -> Self {
        Self {
            name: name.into(),
            processor_type: processor_type.into(),
            frequency_domain,
            context_load_cycles: None,
            context_store_cycles: None,
        }
    }

    /// Sets the context load and store costs in cycles.
    pub fn with_context_costs(mut self, load: Cycles, store: Cycles) -> Self {
        self.context_load_cycles = Some(load);
        self.context_store_cycles = Some(store);
        self
    }

    /// Converts cycles of this processor into ticks.
    #[inline]
    pub fn ticks(&self, cycles: Cycles) -> SimTime {
        self.frequency_domain.ticks(cycles)
    }

    /// Ticks needed to load a context onto this processor.
    pub fn context_load_ticks(&self) -> SimTime {
        self.ticks(self.context_load_cycles.unwrap_or(0))
    }

    /// Ticks needed to store a context from this processor.
    pub fn context_store_ticks(&self) -> SimTime {
        self.ticks(self.context_store_cycles.unwrap_or(0))
    }
}

/// Access direction of a communication phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Read,
    Write,
}

/// A shared communication resource such as a bus, link or memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommunicationResource {
    pub name: String,
    pub frequency_domain: FrequencyDomain,
    /// Fixed read latency in cycles
    #[serde(default)]
    pub read_latency: Cycles,
    /// Fixed write latency in cycles
    #[serde(default)]
    pub write_latency: Cycles,
    /// Read throughput in bytes per cycle (`inf` for unbounded)
    #[serde(default = "unbounded", deserialize_with = "throughput_or_unbounded")]
    pub read_throughput: f64,
    /// Write throughput in bytes per cycle (`inf` for unbounded)
    #[serde(default = "unbounded", deserialize_with = "throughput_or_unbounded")]
    pub write_throughput: f64,
}

fn unbounded() -> f64 {
    f64::INFINITY
}

// serde_json writes infinite floats as `null`
fn throughput_or_unbounded<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

impl CommunicationResource {
    /// Creates a resource with zero latency and unbounded throughput.
    pub fn new(name: impl Into<String>, frequency_domain: FrequencyDomain) -> Self {
        Self {
            name: name.into(),
            frequency_domain,
            read_latency: 0,
            write_latency: 0,
            read_throughput: f64::INFINITY,
            write_throughput: f64::INFINITY,
        }
    }

    /// Sets read and write latencies.
    pub fn with_latency(mut self, read: Cycles, write: Cycles) -> Self {
        self.read_latency = read;
        self.write_latency = write;
        self
    }

    /// Sets read and write throughputs in bytes per cycle.
    pub fn with_throughput(mut self, read: f64, write: f64) -> Self {
        self.read_throughput = read;
        self.write_throughput = write;
        self
    }

    pub fn latency(&self, direction: Direction) -> Cycles {
        match direction {
            Direction::Read => self.read_latency,
            Direction::Write => self.write_latency,
        }
    }

    pub fn throughput(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Read => self.read_throughput,
            Direction::Write => self.write_throughput,
        }
    }
}

/// One step of a primitive: a set of resources accessed in one direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommunicationPhase {
    pub name: String,
    pub direction: Direction,
    pub resources: Vec<CommunicationResource>,
}

impl CommunicationPhase {
    pub fn new(
        name: impl Into<String>,
        direction: Direction,
        resources: Vec<CommunicationResource>,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            resources,
        }
    }

    /// Sum of resource latencies in this phase's direction, in cycles.
    pub fn latency_cycles(&self) -> Cycles {
        self.resources
            .iter()
            .map(|r| r.latency(self.direction))
            .fold(0, Cycles::saturating_add)
    }

    /// The resource with the lowest throughput; first one wins on ties.
    fn bottleneck(&self) -> Option<&CommunicationResource> {
        self.resources.iter().fold(None, |best, r| match best {
            Some(b) if b.throughput(self.direction) <= r.throughput(self.direction) => Some(b),
            _ => Some(r),
        })
    }

    /// Cycles spent moving `size` bytes through the bottleneck resource.
    pub fn transfer_cycles(&self, size: u64) -> Cycles {
        let Some(bottleneck) = self.bottleneck() else {
            return 0;
        };
        let throughput = bottleneck.throughput(self.direction);
        if size == 0 || throughput.is_infinite() {
            return 0;
        }
        let cycles = (size as f64 / throughput).ceil();
        if cycles >= Cycles::MAX as f64 {
            Cycles::MAX
        } else {
            cycles as Cycles
        }
    }

    /// Raw phase cost in cycles: `latency_sum + ceil(size / min_throughput)`.
    pub fn cycles(&self, size: u64) -> Cycles {
        self.latency_cycles().saturating_add(self.transfer_cycles(size))
    }

    /// Phase cost in ticks for a transfer of `size` bytes.
    pub fn ticks(&self, size: u64) -> SimTime {
        let latency = self
            .resources
            .iter()
            .map(|r| r.frequency_domain.ticks(r.latency(self.direction)))
            .fold(0, SimTime::saturating_add);
        let transfer = self
            .bottleneck()
            .map(|b| b.frequency_domain.ticks(self.transfer_cycles(size)))
            .unwrap_or(0);
        latency.saturating_add(transfer)
    }
}

/// How a channel's data moves between a producer and its consumers.
///
/// Keys of `producers` / `consumers` are processor names; the phases are the
/// costs paid on that processor's side of the transfer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub name: String,
    #[serde(default)]
    pub producers: BTreeMap<String, Vec<CommunicationPhase>>,
    #[serde(default)]
    pub consumers: BTreeMap<String, Vec<CommunicationPhase>>,
}

impl Primitive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            producers: BTreeMap::new(),
            consumers: BTreeMap::new(),
        }
    }

    /// Declares the produce phases paid when writing from `processor`.
    pub fn with_producer(
        mut self,
        processor: impl Into<String>,
        phases: Vec<CommunicationPhase>,
    ) -> Self {
        self.producers.insert(processor.into(), phases);
        self
    }

    /// Declares the consume phases paid when reading on `processor`.
    pub fn with_consumer(
        mut self,
        processor: impl Into<String>,
        phases: Vec<CommunicationPhase>,
    ) -> Self {
        self.consumers.insert(processor.into(), phases);
        self
    }

    /// Whether this primitive connects `src` to every processor in `sinks`.
    pub fn is_suitable<'a>(&self, src: &str, sinks: impl IntoIterator<Item = &'a str>) -> bool {
        self.producers.contains_key(src) && sinks.into_iter().all(|s| self.consumers.contains_key(s))
    }

    /// Produce-side cost in ticks of writing `size` bytes from `processor`.
    ///
    /// Returns `None` if the primitive does not serve that processor.
    pub fn produce_ticks(&self, processor: &str, size: u64) -> Option<SimTime> {
        self.producers.get(processor).map(|phases| phases_ticks(phases, size))
    }

    /// Consume-side cost in ticks of reading `size` bytes on `processor`.
    pub fn consume_ticks(&self, processor: &str, size: u64) -> Option<SimTime> {
        self.consumers.get(processor).map(|phases| phases_ticks(phases, size))
    }
}

fn phases_ticks(phases: &[CommunicationPhase], size: u64) -> SimTime {
    phases
        .iter()
        .map(|p| p.ticks(size))
        .fold(0, SimTime::saturating_add)
}

/// A scheduling policy offered by a platform scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDesc {
    pub name: String,
    /// Cost of one scheduling decision, in cycles of the deciding processor
    #[serde(default)]
    pub scheduling_cycles: Cycles,
}

impl PolicyDesc {
    pub fn new(name: impl Into<String>, scheduling_cycles: Cycles) -> Self {
        Self {
            name: name.into(),
            scheduling_cycles,
        }
    }
}

/// When the scheduler pays context store/load costs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSwitchMode {
    /// On every decision, even when the same process is picked again
    Always,
    /// Only when the picked process differs from the loaded one
    #[default]
    AfterScheduling,
    /// Never (cooperative execution without OS context)
    Never,
}

/// Static descriptor of a scheduler: which processors it arbitrates and
/// which policies it supports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerDesc {
    pub name: String,
    pub processors: Vec<String>,
    pub policies: Vec<PolicyDesc>,
    #[serde(default)]
    pub context_switch_mode: ContextSwitchMode,
}

impl SchedulerDesc {
    pub fn new(name: impl Into<String>, processors: Vec<String>, policies: Vec<PolicyDesc>) -> Self {
        Self {
            name: name.into(),
            processors,
            policies,
            context_switch_mode: ContextSwitchMode::default(),
        }
    }

    pub fn with_context_switch_mode(mut self, mode: ContextSwitchMode) -> Self {
        self.context_switch_mode = mode;
        self
    }

    /// Looks up a supported policy by name.
    pub fn find_policy(&self, name: &str) -> Option<&PolicyDesc> {
        self.policies.iter().find(|p| p.name == name)
    }

    pub fn governs(&self, processor: &str) -> bool {
        self.processors.iter().any(|p| p == processor)
    }
}

/// The complete hardware platform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
    #[serde(default)]
    pub processors: Vec<Processor>,
    #[serde(default)]
    pub resources: Vec<CommunicationResource>,
    #[serde(default)]
    pub primitives: Vec<Primitive>,
    #[serde(default)]
    pub schedulers: Vec<SchedulerDesc>,
}

impl Platform {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_processor(&mut self, processor: Processor) {
        self.processors.push(processor);
    }

    pub fn add_resource(&mut self, resource: CommunicationResource) {
        self.resources.push(resource);
    }

    pub fn add_primitive(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    pub fn add_scheduler(&mut self, scheduler: SchedulerDesc) {
        self.schedulers.push(scheduler);
    }

    pub fn find_processor(&self, name: &str) -> Option<&Processor> {
        self.processors.iter().find(|p| p.name == name)
    }

    pub fn find_primitive(&self, name: &str) -> Option<&Primitive> {
        self.primitives.iter().find(|p| p.name == name)
    }

    pub fn find_scheduler(&self, name: &str) -> Option<&SchedulerDesc> {
        self.schedulers.iter().find(|s| s.name == name)
    }

    /// Checks names are unique and every reference resolves.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut processors = HashSet::new();
        for p in &self.processors {
            if !processors.insert(p.name.as_str()) {
                return Err(ConfigurationError::Duplicate {
                    kind: "processor",
                    name: p.name.clone(),
                });
            }
            if p.frequency_domain.frequency == 0 {
                return Err(ConfigurationError::InvalidPlatform(format!(
                    "processor '{}' has a zero frequency",
                    p.name
                )));
            }
        }

        let mut resources = HashSet::new();
        for r in &self.resources {
            if !resources.insert(r.name.as_str()) {
                return Err(ConfigurationError::Duplicate {
                    kind: "resource",
                    name: r.name.clone(),
                });
            }
        }

        let mut primitives = HashSet::new();
        for prim in &self.primitives {
            if !primitives.insert(prim.name.as_str()) {
                return Err(ConfigurationError::Duplicate {
                    kind: "primitive",
                    name: prim.name.clone(),
                });
            }
            for processor in prim.producers.keys().chain(prim.consumers.keys()) {
                if !processors.contains(processor.as_str()) {
                    return Err(ConfigurationError::UnknownProcessor(processor.clone()));
                }
            }
            for phase in prim.producers.values().chain(prim.consumers.values()).flatten() {
                for r in &phase.resources {
                    // inline resources are accepted when the platform lists none
                    if !resources.is_empty() && !resources.contains(r.name.as_str()) {
                        return Err(ConfigurationError::UnknownResource(r.name.clone()));
                    }
                    if r.frequency_domain.frequency == 0 {
                        return Err(ConfigurationError::InvalidPlatform(format!(
                            "resource '{}' has a zero frequency",
                            r.name
                        )));
                    }
                    let throughput = r.throughput(phase.direction);
                    if throughput.is_nan() || throughput <= 0.0 {
                        return Err(ConfigurationError::InvalidPlatform(format!(
                            "resource '{}' has non-positive throughput",
                            r.name
                        )));
                    }
                }
            }
        }

        let mut schedulers = HashSet::new();
        for s in &self.schedulers {
            if !schedulers.insert(s.name.as_str()) {
                return Err(ConfigurationError::Duplicate {
                    kind: "scheduler",
                    name: s.name.clone(),
                });
            }
            if s.processors.is_empty() {
                return Err(ConfigurationError::InvalidPlatform(format!(
                    "scheduler '{}' governs no processor",
                    s.name
                )));
            }
            for processor in &s.processors {
                if !processors.contains(processor.as_str()) {
                    return Err(ConfigurationError::UnknownProcessor(processor.clone()));
                }
            }
        }

        Ok(())
    }
}
