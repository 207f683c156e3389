//! Orchestrator: turns a platform, an application and a mapping into a
//! runnable [`SimulationEngine`].
//!
//! Setup fails fast with a [`ConfigurationError`] before any simulated time
//! passes. It checks, in this order:
//!
//! 1. the platform and the graph are self-consistent,
//! 2. every mapped name exists and every graph element is mapped,
//! 3. processes sit on processors their scheduler governs,
//! 4. channels have a non-zero capacity and a primitive serving their
//!    producer and all consumers,
//! 5. every used scheduler selects a policy it supports and that the
//!    registry can instantiate,
//! 6. used schedulers either share the exact same processor set or are
//!    disjoint. Schedulers sharing a set are merged into one runtime
//!    instance and must agree on the policy, its decision cost and the
//!    context-switch mode.
//!
//! The run parameters are checked first, the same way a loaded
//! [`SimConfig`](crate::config::SimConfig) is.
//!
//! # Example
//!
//! ```
//! use kpnsim::config::SimulationParams;
//! use kpnsim::graph::KpnGraph;
//! use kpnsim::mapping::Mapping;
//! use kpnsim::platform::{Platform, PolicyDesc, Processor, SchedulerDesc};
//! use kpnsim::registry::create_default_registry;
//! use kpnsim::system::System;
//! use kpnsim::timing::FrequencyDomain;
//! use kpnsim::trace::{ScriptedTraceSource, TraceSegment};
//!
//! let mut platform = Platform::new("board");
//! platform.add_processor(Processor::new("cpu0", "ARM", FrequencyDomain::new("fd", 1_000_000_000)));
//! platform.add_scheduler(SchedulerDesc::new(
//!     "sched0",
//!     vec!["cpu0".to_string()],
//!     vec![PolicyDesc::new("Dummy", 0)],
//! ));
//!
//! let mut graph = KpnGraph::new("app");
//! graph.add_process("p");
//!
//! let mapping = Mapping::new()
//!     .map_process("p", "sched0", "cpu0")
//!     .select_policy("sched0", "Dummy");
//!
//! let traces = ScriptedTraceSource::new()
//!     .with_trace("p", vec![TraceSegment::compute(100), TraceSegment::terminate()]);
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
//! let result = system.run().unwrap();
//! assert_eq!(result.total_ticks, 100_000);
//! ```

use std::collections::{BTreeSet, HashMap};

use crate::channel::RuntimeChannel;
use crate::config::{ConfigError, SimulationParams};
use crate::engine::SimulationEngine;
use crate::error::{ConfigurationError, SimResult};
use crate::graph::KpnGraph;
use crate::mapping::Mapping;
use crate::platform::{Platform, SchedulerDesc};
use crate::process::RuntimeProcess;
use crate::registry::PolicyRegistry;
use crate::scheduler::RuntimeScheduler;
use crate::stats::SimulationResult;
use crate::trace::TraceSource;
use crate::types::{ProcessId, SchedulerId};

/// A validated, instantiated system ready to simulate.
#[derive(Debug)]
pub struct System {
    engine: SimulationEngine,
    /// Platform scheduler name to runtime instance
    scheduler_ids: HashMap<String, SchedulerId>,
}

impl System {
    /// Validates the inputs and builds every runtime object.
    pub fn new(
        platform: &Platform,
        graph: &KpnGraph,
        mapping: &Mapping,
        traces: Box<dyn TraceSource>,
        registry: &PolicyRegistry,
        params: SimulationParams,
    ) -> Result<Self, ConfigurationError> {
        params.validate().map_err(|e| match e {
            ConfigError::Validation(msg) => ConfigurationError::InvalidParams(msg),
            other => ConfigurationError::InvalidParams(other.to_string()),
        })?;
        platform.validate()?;
        graph.validate()?;
        check_references(platform, graph, mapping)?;

        let used = used_schedulers(platform, mapping);
        check_policies(registry, mapping, &used)?;
        let groups = deduplicate(mapping, &used)?;

        let mut schedulers = Vec::with_capacity(groups.len());
        let mut scheduler_ids = HashMap::new();
        for (sid, group) in groups.iter().enumerate() {
            let desc = group[0];
            let policy_name = mapping
                .policy(&desc.name)
                .ok_or_else(|| ConfigurationError::UnmappedScheduler(desc.name.clone()))?;
            let policy_desc =
                desc.find_policy(policy_name)
                    .ok_or_else(|| ConfigurationError::UnsupportedPolicy {
                        scheduler: desc.name.clone(),
                        policy: policy_name.to_string(),
                    })?;
            let mut scheduler = RuntimeScheduler::new(
                desc.name.clone(),
                policy_name,
                policy_desc.scheduling_cycles,
                desc.context_switch_mode,
            );
            for processor_name in &desc.processors {
                let processor = platform
                    .find_processor(processor_name)
                    .ok_or_else(|| ConfigurationError::UnknownProcessor(processor_name.clone()))?;
                let policy = registry
                    .create(policy_name)
                    .ok_or_else(|| ConfigurationError::UnregisteredPolicy(policy_name.to_string()))?;
                scheduler.add_lane(processor.clone(), policy);
            }
            for member in group {
                scheduler_ids.insert(member.name.clone(), sid);
            }
            if group.len() > 1 {
                tracing::info!(
                    scheduler = %desc.name,
                    merged = ?group.iter().skip(1).map(|d| d.name.as_str()).collect::<Vec<_>>(),
                    "merged schedulers sharing a processor set"
                );
            }
            schedulers.push(scheduler);
        }

        let mut processes = Vec::with_capacity(graph.processes.len());
        let mut process_ids: HashMap<&str, ProcessId> = HashMap::new();
        for (pid, desc) in graph.processes.iter().enumerate() {
            let placement = mapping
                .process(&desc.name)
                .ok_or_else(|| ConfigurationError::UnmappedProcess(desc.name.clone()))?;
            let sid = *scheduler_ids
                .get(&placement.scheduler)
                .ok_or_else(|| ConfigurationError::UnknownScheduler(placement.scheduler.clone()))?;
            let lane = schedulers[sid].lane_of(&placement.processor).ok_or_else(|| {
                ConfigurationError::ProcessorNotGoverned {
                    process: desc.name.clone(),
                    processor: placement.processor.clone(),
                    scheduler: placement.scheduler.clone(),
                }
            })?;
            let processor = schedulers[sid].lane(lane).processor().clone();
            schedulers[sid].register(lane, pid);
            processes.push(RuntimeProcess::new(pid, desc.name.clone(), sid, lane, processor));
            process_ids.insert(desc.name.as_str(), pid);
        }

        let mut channels = Vec::with_capacity(graph.channels.len());
        for (cid, desc) in graph.channels.iter().enumerate() {
            let placement = mapping
                .channel(&desc.name)
                .ok_or_else(|| ConfigurationError::UnmappedChannel(desc.name.clone()))?;
            let primitive = platform
                .find_primitive(&placement.primitive)
                .ok_or_else(|| ConfigurationError::UnknownPrimitive(placement.primitive.clone()))?;
            let lookup = |name: &str| {
                process_ids.get(name).copied().ok_or_else(|| {
                    ConfigurationError::DanglingEndpoint {
                        channel: desc.name.clone(),
                        process: name.to_string(),
                    }
                })
            };
            let producer = lookup(desc.producer.as_str())?;
            let consumers = desc
                .consumers
                .iter()
                .map(|c| Ok((lookup(c.as_str())?, c.as_str())))
                .collect::<Result<Vec<_>, ConfigurationError>>()?;

            processes[producer].connect(desc.name.clone(), cid);
            for &(consumer, _) in &consumers {
                processes[consumer].connect(desc.name.clone(), cid);
            }
            channels.push(RuntimeChannel::new(
                desc.name.clone(),
                placement.capacity,
                desc.token_size,
                primitive.clone(),
                (producer, desc.producer.as_str()),
                &consumers,
            ));
        }

        tracing::info!(
            application = %graph.name,
            platform = %platform.name,
            processes = processes.len(),
            channels = channels.len(),
            schedulers = schedulers.len(),
            "system instantiated"
        );

        let engine = SimulationEngine::new(
            graph.name.clone(),
            processes,
            channels,
            schedulers,
            traces,
            params,
        );
        Ok(Self {
            engine,
            scheduler_ids,
        })
    }

    /// Runs the simulation to quiescence.
    pub fn run(&mut self) -> SimResult<SimulationResult> {
        self.engine.run()
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    /// Runtime scheduler instance serving the platform scheduler `name`.
    ///
    /// Merged schedulers resolve to the same instance.
    pub fn scheduler_instance(&self, name: &str) -> Option<SchedulerId> {
        self.scheduler_ids.get(name).copied()
    }

    /// Number of distinct runtime schedulers.
    pub fn scheduler_count(&self) -> usize {
        self.engine.schedulers().len()
    }
}

/// Every mapped name exists and every graph element is mapped.
fn check_references(
    platform: &Platform,
    graph: &KpnGraph,
    mapping: &Mapping,
) -> Result<(), ConfigurationError> {
    for name in mapping.processes.keys() {
        if graph.find_process(name).is_none() {
            return Err(ConfigurationError::UnknownProcess(name.clone()));
        }
    }
    for name in mapping.channels.keys() {
        if graph.find_channel(name).is_none() {
            return Err(ConfigurationError::UnknownChannel(name.clone()));
        }
    }
    for name in mapping.policies.keys() {
        if platform.find_scheduler(name).is_none() {
            return Err(ConfigurationError::UnknownScheduler(name.clone()));
        }
    }

    for process in &graph.processes {
        let placement = mapping
            .process(&process.name)
            .ok_or_else(|| ConfigurationError::UnmappedProcess(process.name.clone()))?;
        let scheduler = platform
            .find_scheduler(&placement.scheduler)
            .ok_or_else(|| ConfigurationError::UnknownScheduler(placement.scheduler.clone()))?;
        if platform.find_processor(&placement.processor).is_none() {
            return Err(ConfigurationError::UnknownProcessor(placement.processor.clone()));
        }
        if !scheduler.governs(&placement.processor) {
            return Err(ConfigurationError::ProcessorNotGoverned {
                process: process.name.clone(),
                processor: placement.processor.clone(),
                scheduler: scheduler.name.clone(),
            });
        }
    }

    for channel in &graph.channels {
        let placement = mapping
            .channel(&channel.name)
            .ok_or_else(|| ConfigurationError::UnmappedChannel(channel.name.clone()))?;
        if placement.capacity == 0 {
            return Err(ConfigurationError::ZeroCapacity(channel.name.clone()));
        }
        let primitive = platform
            .find_primitive(&placement.primitive)
            .ok_or_else(|| ConfigurationError::UnknownPrimitive(placement.primitive.clone()))?;
        let processor_of = |process: &str| mapping.process(process).map(|m| m.processor.as_str());
        let src = processor_of(&channel.producer)
            .ok_or_else(|| ConfigurationError::UnmappedProcess(channel.producer.clone()))?;
        let sinks = channel
            .consumers
            .iter()
            .map(|c| processor_of(c).ok_or_else(|| ConfigurationError::UnmappedProcess(c.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        if !primitive.is_suitable(src, sinks) {
            return Err(ConfigurationError::UnsuitablePrimitive {
                channel: channel.name.clone(),
                primitive: primitive.name.clone(),
            });
        }
    }

    Ok(())
}

/// Platform schedulers with at least one process, in platform order.
fn used_schedulers<'a>(platform: &'a Platform, mapping: &Mapping) -> Vec<&'a SchedulerDesc> {
    let used: BTreeSet<&str> = mapping.used_schedulers().into_iter().collect();
    for name in mapping.policies.keys() {
        if !used.contains(name.as_str()) {
            tracing::warn!(scheduler = %name, "policy selected for a scheduler without processes; ignored");
        }
    }
    platform
        .schedulers
        .iter()
        .filter(|s| used.contains(s.name.as_str()))
        .collect()
}

/// Each used scheduler selects a supported, registered policy.
fn check_policies(
    registry: &PolicyRegistry,
    mapping: &Mapping,
    used: &[&SchedulerDesc],
) -> Result<(), ConfigurationError> {
    for desc in used {
        let policy = mapping
            .policy(&desc.name)
            .ok_or_else(|| ConfigurationError::UnmappedScheduler(desc.name.clone()))?;
        if desc.find_policy(policy).is_none() {
            return Err(ConfigurationError::UnsupportedPolicy {
                scheduler: desc.name.clone(),
                policy: policy.to_string(),
            });
        }
        if !registry.contains(policy) {
            return Err(ConfigurationError::UnregisteredPolicy(policy.to_string()));
        }
    }
    Ok(())
}

/// Groups used schedulers with identical processor sets.
///
/// The first member of each group (in platform order) is the canonical
/// descriptor of the runtime instance, so every member must select the same
/// policy at the same decision cost and use the same context-switch mode.
fn deduplicate<'a>(
    mapping: &Mapping,
    used: &[&'a SchedulerDesc],
) -> Result<Vec<Vec<&'a SchedulerDesc>>, ConfigurationError> {
    let mut groups: Vec<(BTreeSet<&str>, Vec<&'a SchedulerDesc>)> = Vec::new();
    for &desc in used {
        let set: BTreeSet<&str> = desc.processors.iter().map(String::as_str).collect();
        let mut joined = false;
        for (group_set, members) in groups.iter_mut() {
            if *group_set == set {
                let first = members[0];
                let policy = mapping.policy(&first.name);
                if policy != mapping.policy(&desc.name) {
                    return Err(ConfigurationError::ConflictingPolicies {
                        first: first.name.clone(),
                        second: desc.name.clone(),
                    });
                }
                let cycles = |d: &SchedulerDesc| {
                    policy.and_then(|p| d.find_policy(p)).map(|p| p.scheduling_cycles)
                };
                let mismatch = if cycles(first) != cycles(desc) {
                    Some("scheduling cycles")
                } else if first.context_switch_mode != desc.context_switch_mode {
                    Some("context switch mode")
                } else {
                    None
                };
                if let Some(what) = mismatch {
                    return Err(ConfigurationError::IncompatibleSchedulers {
                        first: first.name.clone(),
                        second: desc.name.clone(),
                        what,
                    });
                }
                members.push(desc);
                joined = true;
                break;
            }
            if !group_set.is_disjoint(&set) {
                return Err(ConfigurationError::AmbiguousSchedulers {
                    first: members[0].name.clone(),
                    second: desc.name.clone(),
                });
            }
        }
        if !joined {
            groups.push((set, vec![desc]));
        }
    }
    Ok(groups.into_iter().map(|(_, members)| members).collect())
}
