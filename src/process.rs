//! Runtime processes: trace replay as an explicit state machine.
//!
//! ```text
//! CREATED --start--> READY --activate--> RUNNING --+--block--> BLOCKED --unblock--> READY
//!                                                  +--finish-> FINISHED
//! ```
//!
//! A running process keeps its processor until it blocks or finishes. What it
//! does next is stored in a [`ResumePoint`], so a process that blocks on a
//! channel resumes the very same segment (without repeating its compute
//! burst) once it runs again.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelRole, RuntimeChannel};
use crate::error::ProtocolViolation;
use crate::platform::Processor;
use crate::trace::{TraceSegment, TraceSource};
use crate::types::{ChannelId, LaneId, ProcessId, SchedulerId, SimTime};

/// Lifecycle state of a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    Created,
    Ready,
    Running,
    Blocked,
    Finished,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ProcessState::Created => "CREATED",
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Blocked => "BLOCKED",
            ProcessState::Finished => "FINISHED",
        };
        f.write_str(text)
    }
}

/// Where trace execution continues when the process next runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResumePoint {
    /// Fetch a new segment from the trace source
    Fetch,
    /// The segment's compute burst has not been paid yet
    Compute(TraceSegment),
    /// Compute is done; evaluate the segment's channel action or terminal marker
    Communicate(TraceSegment),
    /// The channel cost has been paid; apply the channel mutation
    Commit(TraceSegment),
}

/// What a process is doing while it holds its processor for a while.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activity {
    Compute,
    Transfer(ChannelId, ChannelRole),
}

/// Outcome of [`RuntimeProcess::advance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Keep the processor for `ticks`, then advance again.
    Delay { ticks: SimTime, activity: Activity },
    /// A channel was mutated; waiters of the opposite role must be notified
    /// before advancing again.
    Committed { channel: ChannelId, role: ChannelRole },
    /// The process moved to BLOCKED waiting to perform `role` on `channel`.
    Blocked { channel: ChannelId, role: ChannelRole },
    /// A segment without cycles or channel action completed; the process
    /// keeps its processor.
    Yield,
    /// The process moved to FINISHED.
    Finished,
    /// The trace source had no further segment.
    TraceExhausted,
}

/// Per-process counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStats {
    /// Segments fetched from the trace source
    pub segments: u64,
    /// Ticks spent in compute bursts
    pub compute_ticks: SimTime,
    /// Ticks spent paying channel costs
    pub communication_ticks: SimTime,
    /// Times the process blocked on a channel
    pub blocked_count: u64,
    /// Times a scheduler activated the process
    pub activations: u64,
}

/// A mapped application process.
#[derive(Clone, Debug)]
pub struct RuntimeProcess {
    id: ProcessId,
    name: String,
    state: ProcessState,
    scheduler: SchedulerId,
    lane: LaneId,
    processor: Processor,
    /// Channel name to channel id for every channel the process touches
    channels: HashMap<String, ChannelId>,
    resume: ResumePoint,
    blocked_on: Option<(ChannelId, ChannelRole)>,
    finish_tick: Option<SimTime>,
    stats: ProcessStats,
}

impl RuntimeProcess {
    /// Creates a process in state CREATED, pinned to `processor`.
    pub fn new(
        id: ProcessId,
        name: impl Into<String>,
        scheduler: SchedulerId,
        lane: LaneId,
        processor: Processor,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            state: ProcessState::Created,
            scheduler,
            lane,
            processor,
            channels: HashMap::new(),
            resume: ResumePoint::Fetch,
            blocked_on: None,
            finish_tick: None,
            stats: ProcessStats::default(),
        }
    }

    /// Associates a channel the process reads or writes.
    pub fn connect(&mut self, channel_name: impl Into<String>, channel: ChannelId) {
        self.channels.insert(channel_name.into(), channel);
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn scheduler(&self) -> SchedulerId {
        self.scheduler
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn resume_point(&self) -> &ResumePoint {
        &self.resume
    }

    pub fn blocked_on(&self) -> Option<(ChannelId, ChannelRole)> {
        self.blocked_on
    }

    pub fn finish_tick(&self) -> Option<SimTime> {
        self.finish_tick
    }

    pub fn stats(&self) -> &ProcessStats {
        &self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.state == ProcessState::Finished
    }

    fn transition(&mut self, from: ProcessState, to: ProcessState) -> Result<(), ProtocolViolation> {
        if self.state != from {
            return Err(ProtocolViolation::InvalidTransition {
                process: self.name.clone(),
                from: self.state,
                to,
            });
        }
        tracing::debug!(process = %self.name, %from, %to, "state transition");
        self.state = to;
        Ok(())
    }

    /// CREATED -> READY.
    pub fn start(&mut self) -> Result<(), ProtocolViolation> {
        self.transition(ProcessState::Created, ProcessState::Ready)
    }

    /// READY -> RUNNING, called by the owning scheduler.
    pub fn activate(&mut self) -> Result<(), ProtocolViolation> {
        self.transition(ProcessState::Ready, ProcessState::Running)?;
        self.stats.activations += 1;
        Ok(())
    }

    /// RUNNING -> BLOCKED waiting to perform `role` on `channel`.
    pub fn block(&mut self, channel: ChannelId, role: ChannelRole) -> Result<(), ProtocolViolation> {
        self.transition(ProcessState::Running, ProcessState::Blocked)?;
        self.blocked_on = Some((channel, role));
        self.stats.blocked_count += 1;
        Ok(())
    }

    /// BLOCKED -> READY after the awaited channel notification.
    pub fn unblock(&mut self) -> Result<(), ProtocolViolation> {
        self.transition(ProcessState::Blocked, ProcessState::Ready)?;
        self.blocked_on = None;
        Ok(())
    }

    /// RUNNING -> FINISHED at tick `now`.
    pub fn finish(&mut self, now: SimTime) -> Result<(), ProtocolViolation> {
        self.transition(ProcessState::Running, ProcessState::Finished)?;
        self.finish_tick = Some(now);
        Ok(())
    }

    fn channel_id(&self, channel: &str) -> Result<ChannelId, ProtocolViolation> {
        self.channels
            .get(channel)
            .copied()
            .ok_or_else(|| ProtocolViolation::ChannelNotConnected {
                process: self.name.clone(),
                channel: channel.to_string(),
            })
    }

    /// Resolves the channel action of a segment, checking endpoint ownership.
    fn channel_action(
        &self,
        segment: &TraceSegment,
        channels: &[RuntimeChannel],
    ) -> Result<Option<(ChannelId, ChannelRole)>, ProtocolViolation> {
        let (channel_name, role) = match (&segment.read_from_channel, &segment.write_to_channel) {
            (Some(_), Some(_)) => return Err(ProtocolViolation::ReadAndWrite(self.name.clone())),
            (Some(name), None) => (name, ChannelRole::Read),
            (None, Some(name)) => (name, ChannelRole::Write),
            (None, None) => return Ok(None),
        };
        let id = self.channel_id(channel_name)?;
        let channel = &channels[id];
        let owns_end = match role {
            ChannelRole::Read => channel.is_consumer(self.id),
            ChannelRole::Write => channel.producer() == self.id,
        };
        if !owns_end {
            return Err(ProtocolViolation::WrongEndpoint {
                process: self.name.clone(),
                channel: channel_name.clone(),
                role,
            });
        }
        Ok(Some((id, role)))
    }

    /// Runs the trace forward from the current resume point.
    ///
    /// Zero-duration work is executed immediately; the call returns at the
    /// first timed delay, completed segment without channel action, channel
    /// mutation, block, termination or trace end.
    /// Must only be called while RUNNING.
    pub fn advance(
        &mut self,
        now: SimTime,
        channels: &mut [RuntimeChannel],
        traces: &mut dyn TraceSource,
    ) -> Result<Step, ProtocolViolation> {
        if self.state != ProcessState::Running {
            return Err(ProtocolViolation::InvalidTransition {
                process: self.name.clone(),
                from: self.state,
                to: ProcessState::Running,
            });
        }

        loop {
            match std::mem::replace(&mut self.resume, ResumePoint::Fetch) {
                ResumePoint::Fetch => {
                    let Some(segment) =
                        traces.next_segment(&self.name, &self.processor.processor_type)
                    else {
                        return Ok(Step::TraceExhausted);
                    };
                    segment.validate(&self.name)?;
                    self.stats.segments += 1;
                    self.resume = ResumePoint::Compute(segment);
                }

                ResumePoint::Compute(segment) => {
                    let ticks = self.processor.ticks(segment.cycles());
                    self.resume = ResumePoint::Communicate(segment);
                    if ticks > 0 {
                        self.stats.compute_ticks += ticks;
                        return Ok(Step::Delay {
                            ticks,
                            activity: Activity::Compute,
                        });
                    }
                }

                ResumePoint::Communicate(segment) => {
                    if segment.terminate {
                        self.finish(now)?;
                        return Ok(Step::Finished);
                    }
                    let Some((channel, role)) = self.channel_action(&segment, channels)? else {
                        return Ok(Step::Yield);
                    };
                    let n = segment.n_tokens;
                    let ch = &channels[channel];
                    let ready = match role {
                        ChannelRole::Read => ch.can_consume(self.id, n),
                        ChannelRole::Write => ch.can_produce(n),
                    };
                    if !ready {
                        self.resume = ResumePoint::Communicate(segment);
                        self.block(channel, role)?;
                        return Ok(Step::Blocked { channel, role });
                    }
                    // the primitive serves this processor, checked at setup
                    let ticks = match role {
                        ChannelRole::Read => ch.read_ticks(&self.processor.name, n),
                        ChannelRole::Write => ch.write_ticks(&self.processor.name, n),
                    }
                    .unwrap_or(0);
                    self.resume = ResumePoint::Commit(segment);
                    if ticks > 0 {
                        self.stats.communication_ticks += ticks;
                        return Ok(Step::Delay {
                            ticks,
                            activity: Activity::Transfer(channel, role),
                        });
                    }
                }

                ResumePoint::Commit(segment) => {
                    let Some((channel, role)) = self.channel_action(&segment, channels)? else {
                        continue;
                    };
                    match role {
                        ChannelRole::Read => channels[channel].consume(self.id, segment.n_tokens)?,
                        ChannelRole::Write => channels[channel].produce(segment.n_tokens)?,
                    }
                    return Ok(Step::Committed { channel, role });
                }
            }
        }
    }
}
