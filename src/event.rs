//! Timed events and the structures that order them.
//!
//! Events are the only way simulated time advances. The [`EventQueue`] is a
//! min-heap on `(time, seq)` where `seq` is a global insertion counter, so
//! events scheduled for the same tick fire in the order they were scheduled.
//! Processes waiting on a channel live in the [`WaitTable`] until a
//! matching notification moves them back to READY.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use crate::channel::ChannelRole;
use crate::types::{ChannelId, LaneId, ProcessId, SchedulerId, SimTime};

/// What happens when an event fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// A scheduler lane picks the next process to run.
    Decide {
        scheduler: SchedulerId,
        lane: LaneId,
    },
    /// Decision and context switch overhead elapsed; `process` starts running.
    Dispatch {
        scheduler: SchedulerId,
        lane: LaneId,
        process: ProcessId,
    },
    /// A running process finished a timed step and continues its trace.
    Resume { process: ProcessId },
}

/// An event scheduled at a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub time: SimTime,
    /// Global insertion order, breaks ties between equal times
    pub seq: u64,
    pub kind: EventKind,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending events with FIFO ordering among equal times.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Event>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `kind` at absolute time `time`.
    pub fn push(&mut self, time: SimTime, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Event { time, seq, kind }));
    }

    /// Removes and returns the earliest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|Reverse(e)| e)
    }

    /// Puts a popped event back at its previous place in the order.
    pub fn requeue(&mut self, event: Event) {
        self.heap.push(Reverse(event));
    }

    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|Reverse(e)| e.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Total number of events ever scheduled.
    pub fn scheduled(&self) -> u64 {
        self.next_seq
    }
}

/// Blocked processes keyed by the channel side they wait on.
///
/// A writer that found a channel full waits on `(channel, Write)` and is
/// woken by the next read. A reader waits on `(channel, Read)` and is woken
/// by the next write. Waiters wake in the order they started waiting.
#[derive(Debug, Default)]
pub struct WaitTable {
    waiters: HashMap<(ChannelId, ChannelRole), Vec<ProcessId>>,
}

impl WaitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `process` as waiting to perform `role` on `channel`.
    pub fn wait(&mut self, channel: ChannelId, role: ChannelRole, process: ProcessId) {
        let list = self.waiters.entry((channel, role)).or_default();
        if !list.contains(&process) {
            list.push(process);
        }
    }

    /// Removes and returns everyone waiting for the side opposite to the
    /// operation just performed: a completed write wakes readers and a
    /// completed read wakes writers.
    pub fn notify(&mut self, channel: ChannelId, completed: ChannelRole) -> Vec<ProcessId> {
        let waiting_role = match completed {
            ChannelRole::Read => ChannelRole::Write,
            ChannelRole::Write => ChannelRole::Read,
        };
        self.waiters.remove(&(channel, waiting_role)).unwrap_or_default()
    }

    /// Number of processes currently waiting.
    pub fn len(&self) -> usize {
        self.waiters.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
