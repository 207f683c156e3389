//! Runtime schedulers.
//!
//! A [`RuntimeScheduler`] arbitrates the processors of one platform
//! scheduler among the processes mapped to it. Every governed processor is
//! a [`Lane`] with its own policy instance and its own loaded context;
//! processes are pinned to the lane of the processor their mapping names.
//!
//! One decision on a lane goes through:
//!
//! 1. the policy picks a READY process,
//! 2. the decision cost `processor.ticks(scheduling_cycles)` elapses,
//! 3. the context switch cost elapses, depending on [`ContextSwitchMode`],
//! 4. the process is activated and owns the lane until it blocks or finishes.

use serde::{Deserialize, Serialize};

use crate::platform::{ContextSwitchMode, Processor};
use crate::policies::SchedulingPolicy;
use crate::types::{Cycles, LaneId, ProcessId, SimTime};

/// What a lane is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneState {
    /// No process on the processor
    Idle,
    /// Paying decision and context switch overhead for `process`
    Switching(ProcessId),
    /// `process` is RUNNING on the processor
    Running(ProcessId),
}

/// Counters of one lane.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneStats {
    pub decisions: u64,
    pub context_switches: u64,
    pub scheduling_ticks: SimTime,
    pub context_switch_ticks: SimTime,
    /// Ticks a process was running on the processor
    pub busy_ticks: SimTime,
}

/// Overhead of one scheduling decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub process: ProcessId,
    pub scheduling_ticks: SimTime,
    /// Store cost of the outgoing context
    pub store_ticks: SimTime,
    /// Load cost of the incoming context
    pub load_ticks: SimTime,
}

impl Decision {
    pub fn context_switch_ticks(&self) -> SimTime {
        self.store_ticks.saturating_add(self.load_ticks)
    }

    /// Ticks between the decision and the activation of the process.
    pub fn total_ticks(&self) -> SimTime {
        self.scheduling_ticks.saturating_add(self.context_switch_ticks())
    }
}

/// One processor of a scheduler.
#[derive(Debug)]
pub struct Lane {
    processor: Processor,
    policy: Box<dyn SchedulingPolicy>,
    loaded: Option<ProcessId>,
    state: LaneState,
    decision_pending: bool,
    running_since: SimTime,
    stats: LaneStats,
}

impl Lane {
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn policy(&self) -> &dyn SchedulingPolicy {
        self.policy.as_ref()
    }

    /// Process whose context occupies the processor.
    pub fn loaded(&self) -> Option<ProcessId> {
        self.loaded
    }

    pub fn state(&self) -> LaneState {
        self.state
    }

    pub fn stats(&self) -> &LaneStats {
        &self.stats
    }
}

/// A scheduler instance with one lane per governed processor.
#[derive(Debug)]
pub struct RuntimeScheduler {
    name: String,
    policy_name: String,
    scheduling_cycles: Cycles,
    context_switch_mode: ContextSwitchMode,
    lanes: Vec<Lane>,
    processes: Vec<ProcessId>,
}

impl RuntimeScheduler {
    pub fn new(
        name: impl Into<String>,
        policy_name: impl Into<String>,
        scheduling_cycles: Cycles,
        context_switch_mode: ContextSwitchMode,
    ) -> Self {
        Self {
            name: name.into(),
            policy_name: policy_name.into(),
            scheduling_cycles,
            context_switch_mode,
            lanes: Vec::new(),
            processes: Vec::new(),
        }
    }

    /// Adds a governed processor with its own policy instance.
    pub fn add_lane(&mut self, processor: Processor, policy: Box<dyn SchedulingPolicy>) -> LaneId {
        self.lanes.push(Lane {
            processor,
            policy,
            loaded: None,
            state: LaneState::Idle,
            decision_pending: false,
            running_since: 0,
            stats: LaneStats::default(),
        });
        self.lanes.len() - 1
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy_name(&self) -> &str {
        &self.policy_name
    }

    pub fn context_switch_mode(&self) -> ContextSwitchMode {
        self.context_switch_mode
    }

    pub fn scheduling_cycles(&self) -> Cycles {
        self.scheduling_cycles
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn lane(&self, lane: LaneId) -> &Lane {
        &self.lanes[lane]
    }

    /// Lane of the processor named `processor`.
    pub fn lane_of(&self, processor: &str) -> Option<LaneId> {
        self.lanes.iter().position(|l| l.processor.name == processor)
    }

    /// Processes owned by this scheduler, in registration order.
    pub fn processes(&self) -> &[ProcessId] {
        &self.processes
    }

    /// Hands `process` to the lane it is pinned to.
    pub fn register(&mut self, lane: LaneId, process: ProcessId) {
        self.processes.push(process);
        self.lanes[lane].policy.register(process);
    }

    /// Re-admits a process that entered READY.
    pub fn on_ready(&mut self, lane: LaneId, process: ProcessId) {
        self.lanes[lane].policy.on_ready(process);
    }

    /// Claims a decision slot if the lane is idle, has ready work and no
    /// decision is queued yet. The caller queues the decision event.
    pub fn request_decision(&mut self, lane: LaneId) -> bool {
        let l = &mut self.lanes[lane];
        if l.state != LaneState::Idle || l.decision_pending || l.policy.ready_count() == 0 {
            return false;
        }
        l.decision_pending = true;
        true
    }

    /// Runs the policy on an idle lane and prices the switch.
    ///
    /// Returns `None` if nothing is ready; the lane stays idle.
    pub fn decide(&mut self, lane: LaneId) -> Option<Decision> {
        let mode = self.context_switch_mode;
        let scheduling_cycles = self.scheduling_cycles;
        let l = &mut self.lanes[lane];
        l.decision_pending = false;
        if l.state != LaneState::Idle {
            return None;
        }
        let process = l.policy.schedule(l.loaded)?;

        let switching = match mode {
            ContextSwitchMode::Always => true,
            ContextSwitchMode::AfterScheduling => l.loaded != Some(process),
            ContextSwitchMode::Never => false,
        };
        let (store_ticks, load_ticks) = if switching {
            let store = if l.loaded.is_some() {
                l.processor.context_store_ticks()
            } else {
                0
            };
            (store, l.processor.context_load_ticks())
        } else {
            (0, 0)
        };

        let decision = Decision {
            process,
            scheduling_ticks: l.processor.ticks(scheduling_cycles),
            store_ticks,
            load_ticks,
        };

        l.stats.decisions += 1;
        l.stats.scheduling_ticks += decision.scheduling_ticks;
        if switching {
            l.stats.context_switches += 1;
            l.stats.context_switch_ticks += decision.context_switch_ticks();
        }
        l.loaded = Some(process);
        l.state = LaneState::Switching(process);

        tracing::debug!(
            scheduler = %self.name,
            processor = %l.processor.name,
            process,
            overhead = decision.total_ticks(),
            "scheduling decision"
        );
        Some(decision)
    }

    /// The switched-in process starts running at `now`.
    pub fn start_running(&mut self, lane: LaneId, process: ProcessId, now: SimTime) {
        let l = &mut self.lanes[lane];
        l.state = LaneState::Running(process);
        l.running_since = now;
    }

    /// The running process gave up the processor at `now`.
    ///
    /// A finished process also drops its context.
    pub fn release(&mut self, lane: LaneId, now: SimTime, finished: bool) {
        let l = &mut self.lanes[lane];
        if let LaneState::Running(process) = l.state {
            l.stats.busy_ticks += now.saturating_sub(l.running_since);
            if finished && l.loaded == Some(process) {
                l.loaded = None;
            }
        }
        l.state = LaneState::Idle;
    }

    /// Counters summed over all lanes.
    pub fn total_stats(&self) -> LaneStats {
        self.lanes.iter().fold(LaneStats::default(), |mut acc, l| {
            acc.decisions += l.stats.decisions;
            acc.context_switches += l.stats.context_switches;
            acc.scheduling_ticks += l.stats.scheduling_ticks;
            acc.context_switch_ticks += l.stats.context_switch_ticks;
            acc.busy_ticks += l.stats.busy_ticks;
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::{Dummy, Fifo};
    use crate::timing::FrequencyDomain;

    fn cpu() -> Processor {
        Processor::new("cpu0", "ARM", FrequencyDomain::new("fd", 1_000_000_000))
            .with_context_costs(30, 20)
    }

    fn scheduler(mode: ContextSwitchMode) -> RuntimeScheduler {
        let mut s = RuntimeScheduler::new("sched", "FIFO", 100, mode);
        s.add_lane(cpu(), Box::new(Fifo::new()));
        s.register(0, 0);
        s.register(0, 1);
        s
    }

    fn run_and_block(s: &mut RuntimeScheduler, process: ProcessId) {
        s.start_running(0, process, 0);
        s.release(0, 0, false);
    }

    #[test]
    fn test_decision_costs_first_load() {
        let mut s = scheduler(ContextSwitchMode::AfterScheduling);
        s.on_ready(0, 0);
        assert!(s.request_decision(0));
        // already pending
        assert!(!s.request_decision(0));

        let d = s.decide(0).unwrap();
        assert_eq!(d.process, 0);
        assert_eq!(d.scheduling_ticks, 100_000);
        assert_eq!(d.store_ticks, 0);
        assert_eq!(d.load_ticks, 30_000);
        assert_eq!(s.lane(0).state(), LaneState::Switching(0));
        assert_eq!(s.lane(0).loaded(), Some(0));
    }

    #[test]
    fn test_after_scheduling_skips_same_process() {
        let mut s = scheduler(ContextSwitchMode::AfterScheduling);
        s.on_ready(0, 0);
        s.decide(0).unwrap();
        run_and_block(&mut s, 0);

        s.on_ready(0, 0);
        let d = s.decide(0).unwrap();
        assert_eq!(d.context_switch_ticks(), 0);

        run_and_block(&mut s, 0);
        s.on_ready(0, 1);
        let d = s.decide(0).unwrap();
        assert_eq!((d.store_ticks, d.load_ticks), (20_000, 30_000));
        assert_eq!(s.total_stats().context_switches, 2);
        assert_eq!(s.total_stats().decisions, 3);
    }

    #[test]
    fn test_always_pays_on_reselection() {
        let mut s = scheduler(ContextSwitchMode::Always);
        s.on_ready(0, 0);
        s.decide(0).unwrap();
        run_and_block(&mut s, 0);

        s.on_ready(0, 0);
        let d = s.decide(0).unwrap();
        assert_eq!(d.context_switch_ticks(), 50_000);
        assert_eq!(d.total_ticks(), 150_000);
    }

    #[test]
    fn test_never_pays_nothing() {
        let mut s = scheduler(ContextSwitchMode::Never);
        s.on_ready(0, 0);
        let d = s.decide(0).unwrap();
        assert_eq!(d.context_switch_ticks(), 0);
        assert_eq!(s.total_stats().context_switches, 0);
    }

    #[test]
    fn test_finished_process_drops_context() {
        let mut s = scheduler(ContextSwitchMode::AfterScheduling);
        s.on_ready(0, 0);
        s.decide(0).unwrap();
        s.start_running(0, 0, 10);
        s.release(0, 60, true);
        assert_eq!(s.lane(0).loaded(), None);
        assert_eq!(s.lane(0).stats().busy_ticks, 50);

        // no store cost for a context that is gone
        s.on_ready(0, 1);
        let d = s.decide(0).unwrap();
        assert_eq!(d.store_ticks, 0);
    }

    #[test]
    fn test_idle_lane_without_work() {
        let mut s = scheduler(ContextSwitchMode::AfterScheduling);
        assert!(!s.request_decision(0));
        assert_eq!(s.decide(0), None);
    }

    #[test]
    fn test_lanes_are_independent() {
        let mut s = RuntimeScheduler::new("smp", "Dummy", 0, ContextSwitchMode::Never);
        let cpu1 = Processor::new("cpu1", "ARM", FrequencyDomain::new("fd", 1_000_000_000));
        s.add_lane(cpu(), Box::new(Dummy::new()));
        s.add_lane(cpu1, Box::new(Dummy::new()));
        s.register(0, 0);
        s.register(1, 1);
        assert_eq!(s.lane_of("cpu1"), Some(1));

        s.on_ready(0, 0);
        s.on_ready(1, 1);
        assert_eq!(s.decide(0).map(|d| d.process), Some(0));
        assert_eq!(s.decide(1).map(|d| d.process), Some(1));
        assert_eq!(s.processes(), &[0, 1]);
    }
}
