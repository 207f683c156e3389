//! Discrete-event simulation engine.
//!
//! The `SimulationEngine` owns every runtime object of one run (processes,
//! channels, schedulers, the trace source) and advances a single logical
//! clock by popping events from the [`EventQueue`]. Components suspend only
//! at three kinds of points:
//!
//! - a timed delay (compute burst, channel cost, decision, context switch),
//!   which becomes a future event,
//! - a blocked channel operation, which parks the process in the
//!   [`WaitTable`] until the opposite side of the channel moves,
//! - an idle scheduler lane, which is woken by a queued decision as soon as
//!   one of its processes turns READY.
//!
//! # Ordering
//!
//! Events fire by `(tick, insertion order)`. Processes woken by one channel
//! notification become READY in the order they started waiting, and
//! decisions triggered at tick `t` are queued, so they run after every event
//! already queued for `t`. Runs are therefore fully reproducible.
//!
//! # Termination
//!
//! The run ends when the queue drains. If every process finished, the clock
//! at that point is the total simulated time. Otherwise the run stalled and
//! an [`ExhaustionError`] lists the unfinished processes. The `max_ticks`
//! and `max_steps` watchdogs and a trace source that runs dry stall the run
//! the same way.
//!
//! A step is one popped event or one zero-time advance of a running process
//! (a segment without cycles or a channel commit), so a trace of empty
//! segments still hits `max_steps`. Watchdog stalls can be resumed; any
//! other error aborts the run and is returned again by later calls.

use serde_json::{json, Map, Value};

use crate::channel::{ChannelRole, RuntimeChannel};
use crate::config::SimulationParams;
use crate::error::{ExhaustionError, SimError, SimResult, StallCause, StalledProcess};
use crate::event::{EventKind, EventQueue, WaitTable};
use crate::event_log::{EventLog, CAT_OVERHEAD, CAT_PROCESS};
use crate::process::{Activity, RuntimeProcess, Step};
use crate::scheduler::RuntimeScheduler;
use crate::stats::{ChannelReport, ProcessReport, SchedulerReport, SimulationResult, Timer};
use crate::trace::TraceSource;
use crate::types::{ChannelId, LaneId, ProcessId, SchedulerId, SimTime};

/// The simulation engine for one fully instantiated system.
///
/// Usually built by [`System`](crate::system::System), which validates the
/// inputs and wires the runtime objects together.
pub struct SimulationEngine {
    name: String,
    processes: Vec<RuntimeProcess>,
    channels: Vec<RuntimeChannel>,
    schedulers: Vec<RuntimeScheduler>,
    traces: Box<dyn TraceSource>,
    queue: EventQueue,
    waits: WaitTable,
    params: SimulationParams,
    now: SimTime,
    steps: u64,
    log: Option<EventLog>,
    started: bool,
    failed: Option<SimError>,
}

impl SimulationEngine {
    /// Creates an engine over already connected runtime objects.
    ///
    /// Each process must be registered with the lane of its scheduler.
    pub fn new(
        name: impl Into<String>,
        processes: Vec<RuntimeProcess>,
        channels: Vec<RuntimeChannel>,
        schedulers: Vec<RuntimeScheduler>,
        traces: Box<dyn TraceSource>,
        params: SimulationParams,
    ) -> Self {
        let log = params.record_events.then(EventLog::new);
        Self {
            name: name.into(),
            processes,
            channels,
            schedulers,
            traces,
            queue: EventQueue::new(),
            waits: WaitTable::new(),
            params,
            now: 0,
            steps: 0,
            log,
            started: false,
            failed: None,
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Steps taken so far: popped events plus zero-time process advances.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn processes(&self) -> &[RuntimeProcess] {
        &self.processes
    }

    pub fn channels(&self) -> &[RuntimeChannel] {
        &self.channels
    }

    pub fn schedulers(&self) -> &[RuntimeScheduler] {
        &self.schedulers
    }

    pub fn event_log(&self) -> Option<&EventLog> {
        self.log.as_ref()
    }

    /// Runs the simulation to quiescence.
    ///
    /// A watchdog stall leaves the pending events in place, so calling `run`
    /// again continues from the tick where the engine stopped. Calling it
    /// on a completed engine returns the same result again, and calling it
    /// after a protocol violation or exhausted trace returns that error.
    pub fn run(&mut self) -> SimResult<SimulationResult> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        let result = self.run_events();
        if let Err(err) = &result {
            let resumable = err
                .as_exhaustion()
                .is_some_and(|e| matches!(e.cause, StallCause::TickLimit | StallCause::StepLimit));
            if !resumable {
                self.failed = Some(err.clone());
            }
        }
        result
    }

    fn run_events(&mut self) -> SimResult<SimulationResult> {
        let timer = Timer::start();
        if !self.started {
            self.started = true;
            tracing::info!(
                application = %self.name,
                processes = self.processes.len(),
                channels = self.channels.len(),
                schedulers = self.schedulers.len(),
                "simulation start"
            );
            self.traces.reset();
            self.init()?;
        }

        while let Some(event) = self.queue.pop() {
            let over_ticks = self.params.max_ticks.is_some_and(|limit| event.time > limit);
            let over_steps = self.params.max_steps.is_some_and(|limit| self.steps >= limit);
            if over_ticks || over_steps {
                self.queue.requeue(event);
                let cause = if over_ticks {
                    StallCause::TickLimit
                } else {
                    StallCause::StepLimit
                };
                return Err(self.stall(cause));
            }
            self.steps += 1;
            self.now = event.time;
            tracing::trace!(tick = self.now, seq = event.seq, kind = ?event.kind, "event");
            self.handle(event.kind)?;
        }

        if self.processes.iter().any(|p| !p.is_finished()) {
            return Err(self.stall(StallCause::Deadlock));
        }

        let mut result = self.report();
        result.wall_time_ms = timer.elapsed_ms();
        tracing::info!(
            application = %self.name,
            total_ticks = result.total_ticks,
            events = result.events_processed,
            wall_ms = result.wall_time_ms,
            "simulation finished"
        );
        Ok(result)
    }

    /// Snapshot of all counters at the current tick.
    pub fn report(&self) -> SimulationResult {
        SimulationResult {
            name: self.name.clone(),
            total_ticks: self.now,
            events_processed: self.steps,
            wall_time_ms: 0.0,
            processes: self
                .processes
                .iter()
                .map(|p| ProcessReport::capture(p, self.schedulers[p.scheduler()].name()))
                .collect(),
            schedulers: self.schedulers.iter().map(SchedulerReport::capture).collect(),
            channels: self.channels.iter().map(ChannelReport::capture).collect(),
            event_log: self.log.clone(),
        }
    }

    /// Makes every process READY in graph order and queues the first
    /// decision of every lane with work.
    fn init(&mut self) -> SimResult<()> {
        if let Some(log) = self.log.as_mut() {
            for (sid, scheduler) in self.schedulers.iter().enumerate() {
                log.name_track(sid, None, scheduler.name());
                for (lane, l) in scheduler.lanes().iter().enumerate() {
                    log.name_track(sid, Some(lane), &l.processor().name);
                }
            }
            log.name_track(self.schedulers.len(), None, "channels");
        }

        for pid in 0..self.processes.len() {
            self.processes[pid].start()?;
            let (sid, lane) = self.placement(pid);
            self.schedulers[sid].on_ready(lane, pid);
        }
        for sid in 0..self.schedulers.len() {
            for lane in 0..self.schedulers[sid].lanes().len() {
                self.request_decision(sid, lane);
            }
        }
        Ok(())
    }

    fn placement(&self, pid: ProcessId) -> (SchedulerId, LaneId) {
        let p = &self.processes[pid];
        (p.scheduler(), p.lane())
    }

    fn request_decision(&mut self, sid: SchedulerId, lane: LaneId) {
        if self.schedulers[sid].request_decision(lane) {
            self.queue.push(self.now, EventKind::Decide { scheduler: sid, lane });
        }
    }

    fn handle(&mut self, kind: EventKind) -> SimResult<()> {
        match kind {
            EventKind::Decide { scheduler, lane } => {
                self.decide(scheduler, lane);
                Ok(())
            }
            EventKind::Dispatch {
                scheduler,
                lane,
                process,
            } => {
                self.processes[process].activate()?;
                self.schedulers[scheduler].start_running(lane, process, self.now);
                if let Some(log) = self.log.as_mut() {
                    log.begin(self.now, scheduler, lane, CAT_PROCESS, self.processes[process].name());
                }
                self.run_process(process)
            }
            EventKind::Resume { process } => self.run_process(process),
        }
    }

    fn decide(&mut self, sid: SchedulerId, lane: LaneId) {
        let Some(decision) = self.schedulers[sid].decide(lane) else {
            return;
        };
        let now = self.now;
        if let Some(log) = self.log.as_mut() {
            let switch_start = now + decision.scheduling_ticks;
            if decision.scheduling_ticks > 0 {
                log.begin(now, sid, lane, CAT_OVERHEAD, "schedule");
                log.end(switch_start, sid, lane, CAT_OVERHEAD, "schedule");
            }
            if decision.context_switch_ticks() > 0 {
                log.begin(switch_start, sid, lane, CAT_OVERHEAD, "context switch");
                log.end(now + decision.total_ticks(), sid, lane, CAT_OVERHEAD, "context switch");
            }
        }
        self.queue.push(
            now.saturating_add(decision.total_ticks()),
            EventKind::Dispatch {
                scheduler: sid,
                lane,
                process: decision.process,
            },
        );
    }

    /// Advances a RUNNING process until it suspends.
    fn run_process(&mut self, pid: ProcessId) -> SimResult<()> {
        loop {
            let step = self.processes[pid].advance(self.now, &mut self.channels, self.traces.as_mut())?;
            match step {
                Step::Delay { ticks, activity } => {
                    let end = self.now.saturating_add(ticks);
                    if let (Some(log), Activity::Transfer(channel, role)) = (self.log.as_mut(), activity) {
                        let (sid, lane) = (self.processes[pid].scheduler(), self.processes[pid].lane());
                        let name = format!("{} {}", role, self.channels[channel].name());
                        log.begin(self.now, sid, lane, CAT_PROCESS, &name);
                        log.end(end, sid, lane, CAT_PROCESS, &name);
                    }
                    self.queue.push(end, EventKind::Resume { process: pid });
                    return Ok(());
                }
                Step::Committed { channel, role } => {
                    self.record_fill(channel);
                    self.notify(channel, role)?;
                }
                Step::Yield => {}
                Step::Blocked { channel, role } => {
                    tracing::debug!(
                        tick = self.now,
                        process = %self.processes[pid].name(),
                        channel = %self.channels[channel].name(),
                        %role,
                        "blocked"
                    );
                    self.waits.wait(channel, role, pid);
                    self.mark(pid, "blocked", channel, role);
                    self.release(pid, false);
                    return Ok(());
                }
                Step::Finished => {
                    tracing::debug!(tick = self.now, process = %self.processes[pid].name(), "finished");
                    self.release(pid, true);
                    return Ok(());
                }
                Step::TraceExhausted => {
                    tracing::warn!(process = %self.processes[pid].name(), "trace ran dry");
                    return Err(self.stall(StallCause::TraceExhausted));
                }
            }
            if self.params.max_steps.is_some_and(|limit| self.steps >= limit) {
                // continue here on the next run
                self.queue.push(self.now, EventKind::Resume { process: pid });
                return Err(self.stall(StallCause::StepLimit));
            }
            self.steps += 1;
        }
    }

    /// Wakes everyone waiting on the side of `channel` opposite to `completed`.
    fn notify(&mut self, channel: ChannelId, completed: ChannelRole) -> SimResult<()> {
        for pid in self.waits.notify(channel, completed) {
            self.processes[pid].unblock()?;
            let (sid, lane) = self.placement(pid);
            self.schedulers[sid].on_ready(lane, pid);
            let waited = match completed {
                ChannelRole::Read => ChannelRole::Write,
                ChannelRole::Write => ChannelRole::Read,
            };
            self.mark(pid, "unblocked", channel, waited);
            self.request_decision(sid, lane);
        }
        Ok(())
    }

    /// The running process left its processor.
    fn release(&mut self, pid: ProcessId, finished: bool) {
        let (sid, lane) = self.placement(pid);
        if let Some(log) = self.log.as_mut() {
            log.end(self.now, sid, lane, CAT_PROCESS, self.processes[pid].name());
        }
        self.schedulers[sid].release(lane, self.now, finished);
        self.request_decision(sid, lane);
    }

    fn mark(&mut self, pid: ProcessId, what: &str, channel: ChannelId, role: ChannelRole) {
        let (sid, lane) = self.placement(pid);
        if let Some(log) = self.log.as_mut() {
            let args = json!({
                "process": self.processes[pid].name(),
                "channel": self.channels[channel].name(),
                "role": role.to_string(),
            });
            log.instant(self.now, sid, lane, what, args);
        }
    }

    fn record_fill(&mut self, channel: ChannelId) {
        let track = self.schedulers.len();
        if let Some(log) = self.log.as_mut() {
            let ch = &self.channels[channel];
            let fills: Map<String, Value> = ch
                .consumers()
                .iter()
                .map(|c| (c.name.clone(), Value::from(c.fill)))
                .collect();
            log.counter(self.now, track, ch.name(), Value::Object(fills));
        }
    }

    fn stall(&self, cause: StallCause) -> SimError {
        let stalled: Vec<StalledProcess> = self
            .processes
            .iter()
            .filter(|p| !p.is_finished())
            .map(|p| StalledProcess {
                name: p.name().to_string(),
                state: p.state(),
                blocked_on: p
                    .blocked_on()
                    .map(|(channel, role)| (self.channels[channel].name().to_string(), role)),
            })
            .collect();
        tracing::warn!(tick = self.now, %cause, unfinished = stalled.len(), "simulation stalled");
        ExhaustionError {
            cause,
            tick: self.now,
            stalled,
        }
        .into()
    }
}

impl std::fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("name", &self.name)
            .field("now", &self.now)
            .field("steps", &self.steps)
            .field("processes", &self.processes.len())
            .field("channels", &self.channels.len())
            .field("schedulers", &self.schedulers.len())
            .field("pending_events", &self.queue.len())
            .finish()
    }
}
