//! Mapping of an application onto a platform.
//!
//! A [`Mapping`] is produced by an external design-space exploration step;
//! the engine only consumes it. It assigns:
//!
//! - each process to a scheduler and a processor (its affinity),
//! - each channel to a capacity in tokens and a communication primitive,
//! - each used scheduler to one of its supported policies.
//!
//! # Example
//!
//! ```
//! use kpnsim::mapping::Mapping;
//!
//! let mapping = Mapping::new()
//!     .map_process("src", "sched0", "cpu0")
//!     .map_process("sink", "sched0", "cpu0")
//!     .map_channel("c0", 4, "prim_local")
//!     .select_policy("sched0", "FIFO");
//!
//! assert_eq!(mapping.process("src").unwrap().processor, "cpu0");
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placement of one process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMapping {
    pub scheduler: String,
    pub processor: String,
}

/// Placement of one channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapping {
    /// Buffer capacity in tokens
    pub capacity: u64,
    pub primitive: String,
}

/// A complete mapping. Keyed by name in sorted maps so iteration is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(default)]
    pub processes: BTreeMap<String, ProcessMapping>,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelMapping>,
    /// Scheduler name to policy name
    #[serde(default)]
    pub policies: BTreeMap<String, String>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a process on a scheduler and processor.
    pub fn map_process(
        mut self,
        process: impl Into<String>,
        scheduler: impl Into<String>,
        processor: impl Into<String>,
    ) -> Self {
        self.processes.insert(
            process.into(),
            ProcessMapping {
                scheduler: scheduler.into(),
                processor: processor.into(),
            },
        );
        self
    }

    /// Sets a channel's capacity and primitive.
    pub fn map_channel(
        mut self,
        channel: impl Into<String>,
        capacity: u64,
        primitive: impl Into<String>,
    ) -> Self {
        self.channels.insert(
            channel.into(),
            ChannelMapping {
                capacity,
                primitive: primitive.into(),
            },
        );
        self
    }

    /// Selects the policy a scheduler runs.
    pub fn select_policy(mut self, scheduler: impl Into<String>, policy: impl Into<String>) -> Self {
        self.policies.insert(scheduler.into(), policy.into());
        self
    }

    pub fn process(&self, name: &str) -> Option<&ProcessMapping> {
        self.processes.get(name)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelMapping> {
        self.channels.get(name)
    }

    pub fn policy(&self, scheduler: &str) -> Option<&str> {
        self.policies.get(scheduler).map(String::as_str)
    }

    /// Names of schedulers that have at least one process mapped to them.
    pub fn used_schedulers(&self) -> Vec<&str> {
        let mut used: Vec<&str> = self.processes.values().map(|m| m.scheduler.as_str()).collect();
        used.sort_unstable();
        used.dedup();
        used
    }
}
