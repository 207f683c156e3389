//! Error taxonomy of the simulation engine.
//!
//! - [`ConfigurationError`]: the platform, graph and mapping do not fit
//!   together. Raised by setup before any simulated time passes.
//! - [`ProtocolViolation`]: the mapping and trace disagree at run time
//!   (overflowing write, underflowing read, malformed segment, illegal state
//!   transition). Aborts the whole run.
//! - [`ExhaustionError`]: the run did not reach quiescence (deadlock,
//!   watchdog limit or a trace that ran dry). Carries a stall diagnosis.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::ChannelRole;
use crate::process::ProcessState;
use crate::types::SimTime;

/// Setup-time failures. Nothing has been simulated when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("mapping references unknown process '{0}'")]
    UnknownProcess(String),

    #[error("mapping references unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("unknown scheduler '{0}'")]
    UnknownScheduler(String),

    #[error("unknown processor '{0}'")]
    UnknownProcessor(String),

    #[error("unknown primitive '{0}'")]
    UnknownPrimitive(String),

    #[error("unknown communication resource '{0}'")]
    UnknownResource(String),

    #[error("process '{0}' is not mapped")]
    UnmappedProcess(String),

    #[error("channel '{0}' is not mapped")]
    UnmappedChannel(String),

    #[error("scheduler '{0}' has processes mapped to it but no policy selected")]
    UnmappedScheduler(String),

    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("channel '{channel}' references unknown process '{process}'")]
    DanglingEndpoint { channel: String, process: String },

    #[error("channel '{0}' has no consumer")]
    NoConsumer(String),

    #[error("channel '{0}' has capacity 0")]
    ZeroCapacity(String),

    #[error("processor '{processor}' is not governed by scheduler '{scheduler}' (process '{process}')")]
    ProcessorNotGoverned {
        process: String,
        processor: String,
        scheduler: String,
    },

    #[error("schedulers '{first}' and '{second}' partially overlap on their processor sets")]
    AmbiguousSchedulers { first: String, second: String },

    #[error("schedulers '{first}' and '{second}' govern the same processors but select different policies")]
    ConflictingPolicies { first: String, second: String },

    #[error("schedulers '{first}' and '{second}' govern the same processors but differ in {what}")]
    IncompatibleSchedulers {
        first: String,
        second: String,
        what: &'static str,
    },

    #[error("scheduler '{scheduler}' does not support policy '{policy}'")]
    UnsupportedPolicy { scheduler: String, policy: String },

    #[error("no implementation registered for policy '{0}'")]
    UnregisteredPolicy(String),

    #[error("primitive '{primitive}' cannot carry channel '{channel}' between its processors")]
    UnsuitablePrimitive { channel: String, primitive: String },

    #[error("invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("invalid simulation parameters: {0}")]
    InvalidParams(String),
}

/// Run-time inconsistencies between a mapping and its trace.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("write of {requested} tokens overflows channel '{channel}' for consumer '{consumer}' (fill {fill}, capacity {capacity})")]
    ChannelOverflow {
        channel: String,
        consumer: String,
        fill: u64,
        requested: u64,
        capacity: u64,
    },

    #[error("consumer '{consumer}' reads {requested} tokens from channel '{channel}' holding {fill}")]
    ChannelUnderflow {
        channel: String,
        consumer: String,
        fill: u64,
        requested: u64,
    },

    #[error("process '{consumer}' is not a consumer of channel '{channel}'")]
    UnknownConsumer { channel: String, consumer: String },

    #[error("process '{process}' is not connected to channel '{channel}'")]
    ChannelNotConnected { process: String, channel: String },

    #[error("process '{process}' attempts to {role} channel '{channel}' it does not own that end of")]
    WrongEndpoint {
        process: String,
        channel: String,
        role: ChannelRole,
    },

    #[error("trace segment of process '{0}' both reads and writes")]
    ReadAndWrite(String),

    #[error("process '{process}' cannot move from {from} to {to}")]
    InvalidTransition {
        process: String,
        from: ProcessState,
        to: ProcessState,
    },
}

/// Why a run stopped before every process finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StallCause {
    /// The event queue drained while processes were still waiting.
    Deadlock,
    /// Simulated time passed the configured `max_ticks`.
    TickLimit,
    /// The engine took more than `max_steps` steps (events plus zero-time
    /// trace segments).
    StepLimit,
    /// The trace source had no further segment for a running process.
    TraceExhausted,
}

impl fmt::Display for StallCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StallCause::Deadlock => "deadlock",
            StallCause::TickLimit => "tick limit reached",
            StallCause::StepLimit => "step limit reached",
            StallCause::TraceExhausted => "trace exhausted",
        };
        f.write_str(text)
    }
}

/// One unfinished process in a stall diagnosis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalledProcess {
    pub name: String,
    pub state: ProcessState,
    /// Channel name and the role the process is waiting to perform.
    pub blocked_on: Option<(String, ChannelRole)>,
}

impl fmt::Display for StalledProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.blocked_on {
            Some((channel, role)) => {
                write!(f, "{} ({}, waiting to {} '{}')", self.name, self.state, role, channel)
            }
            None => write!(f, "{} ({})", self.name, self.state),
        }
    }
}

/// The run stopped without reaching quiescence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("simulation stalled at tick {tick}: {cause}; unfinished: {}", list_stalled(.stalled))]
pub struct ExhaustionError {
    pub cause: StallCause,
    pub tick: SimTime,
    pub stalled: Vec<StalledProcess>,
}

fn list_stalled(stalled: &[StalledProcess]) -> String {
    stalled
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Umbrella error for every fallible engine entry point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    #[error(transparent)]
    Exhaustion(#[from] ExhaustionError),
}

impl SimError {
    /// Returns the stall diagnosis if this is an exhaustion error.
    pub fn as_exhaustion(&self) -> Option<&ExhaustionError> {
        match self {
            SimError::Exhaustion(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
