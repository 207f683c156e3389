//! Built-in scheduling policies.
//!
//! A policy decides which READY process a scheduler lane runs next. It sees
//! processes only through the calls below and keeps its own ready view; the
//! engine guarantees that `on_ready` is called exactly once each time a
//! process enters READY and that a process returned by `schedule` is
//! activated immediately.
//!
//! # Available Policies
//!
//! - [`Dummy`] - Sticks to the loaded process, otherwise the oldest ready one
//! - [`Fifo`] - Longest-ready first; unblocked processes rejoin at the tail
//! - [`RoundRobin`] - Rotates over every owned process in registration order

pub mod dummy;
pub mod fifo;
pub mod round_robin;

pub use dummy::Dummy;
pub use fifo::Fifo;
pub use round_robin::RoundRobin;

use std::fmt::Debug;

use crate::types::ProcessId;

/// A pluggable scheduling policy for one scheduler lane.
pub trait SchedulingPolicy: Send + Debug {
    /// Name the policy is registered under.
    fn name(&self) -> &str;

    /// Adds `process` to the set of processes owned by the lane.
    ///
    /// Called once per process at setup, in graph order.
    fn register(&mut self, process: ProcessId);

    /// `process` entered READY.
    fn on_ready(&mut self, process: ProcessId);

    /// Picks the next process to run and removes it from the ready view.
    ///
    /// `loaded` is the process whose context currently occupies the
    /// processor, if any.
    fn schedule(&mut self, loaded: Option<ProcessId>) -> Option<ProcessId>;

    /// Number of processes currently ready.
    fn ready_count(&self) -> usize;
}
