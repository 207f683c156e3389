//! Bounded channels between runtime processes.
//!
//! A [`RuntimeChannel`] connects one producer to one or more consumers. It
//! keeps an independent fill counter per consumer: a write adds tokens for
//! every consumer, a read drains only the reader's own counter. A token stays
//! visible to each consumer until that consumer has read it (broadcast
//! semantics), and the producer is throttled by the slowest consumer.
//!
//! # Invariant
//!
//! `0 <= fill[c] <= capacity` for every consumer `c` at every instant.
//! Calls that would break it are protocol violations.
//!
//! # Example
//!
//! ```
//! use kpnsim::channel::RuntimeChannel;
//! use kpnsim::platform::Primitive;
//!
//! // producer 0, consumers 1 and 2
//! let mut ch = RuntimeChannel::new("c", 4, 1, Primitive::new("p"), (0, "src"), &[(1, "a"), (2, "b")]);
//! ch.produce(3).unwrap();
//! ch.consume(1, 3).unwrap();
//!
//! assert_eq!(ch.fill(1), Some(0));
//! assert_eq!(ch.fill(2), Some(3));
//! assert!(!ch.can_produce(2)); // consumer 2 would overflow
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolViolation;
use crate::platform::Primitive;
use crate::types::{ProcessId, SimTime};

/// The side of a channel a process acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    /// Consuming tokens
    Read,
    /// Producing tokens
    Write,
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRole::Read => f.write_str("read"),
            ChannelRole::Write => f.write_str("write"),
        }
    }
}

/// Fill state of one consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumerSlot {
    pub process: ProcessId,
    pub name: String,
    pub fill: u64,
    /// Total tokens this consumer has read
    pub tokens_read: u64,
}

/// A channel instance with flow control.
#[derive(Clone, Debug)]
pub struct RuntimeChannel {
    name: String,
    capacity: u64,
    /// Size of one token in bytes
    token_size: u64,
    primitive: Primitive,
    producer: ProcessId,
    producer_name: String,
    consumers: Vec<ConsumerSlot>,
    tokens_written: u64,
    peak_fill: u64,
}

impl RuntimeChannel {
    /// Creates an empty channel.
    ///
    /// # Arguments
    /// * `capacity` - Buffer size in tokens
    /// * `token_size` - Bytes per token, used for transfer costs
    /// * `producer` - (process id, process name) of the writer
    /// * `consumers` - (process id, process name) of every reader
    pub fn new(
        name: impl Into<String>,
        capacity: u64,
        token_size: u64,
        primitive: Primitive,
        producer: (ProcessId, &str),
        consumers: &[(ProcessId, &str)],
    ) -> Self {
        Self {
            name: name.into(),
            capacity,
            token_size,
            primitive,
            producer: producer.0,
            producer_name: producer.1.to_string(),
            consumers: consumers
                .iter()
                .map(|&(process, name)| ConsumerSlot {
                    process,
                    name: name.to_string(),
                    fill: 0,
                    tokens_read: 0,
                })
                .collect(),
            tokens_written: 0,
            peak_fill: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn token_size(&self) -> u64 {
        self.token_size
    }

    pub fn primitive(&self) -> &Primitive {
        &self.primitive
    }

    pub fn producer(&self) -> ProcessId {
        self.producer
    }

    pub fn producer_name(&self) -> &str {
        &self.producer_name
    }

    pub fn consumers(&self) -> &[ConsumerSlot] {
        &self.consumers
    }

    pub fn is_consumer(&self, process: ProcessId) -> bool {
        self.slot(process).is_some()
    }

    pub fn tokens_written(&self) -> u64 {
        self.tokens_written
    }

    /// Highest fill any consumer has seen.
    pub fn peak_fill(&self) -> u64 {
        self.peak_fill
    }

    /// Current fill of `consumer`, or `None` if it does not read this channel.
    pub fn fill(&self, consumer: ProcessId) -> Option<u64> {
        self.slot(consumer).map(|s| s.fill)
    }

    fn slot(&self, consumer: ProcessId) -> Option<&ConsumerSlot> {
        self.consumers.iter().find(|s| s.process == consumer)
    }

    /// True iff writing `n` tokens overflows no consumer.
    pub fn can_produce(&self, n: u64) -> bool {
        self.consumers
            .iter()
            .all(|s| s.fill.checked_add(n).is_some_and(|f| f <= self.capacity))
    }

    /// Writes `n` tokens for every consumer.
    pub fn produce(&mut self, n: u64) -> Result<(), ProtocolViolation> {
        if let Some(full) = self
            .consumers
            .iter()
            .find(|s| s.fill.checked_add(n).map_or(true, |f| f > self.capacity))
        {
            return Err(ProtocolViolation::ChannelOverflow {
                channel: self.name.clone(),
                consumer: full.name.clone(),
                fill: full.fill,
                requested: n,
                capacity: self.capacity,
            });
        }
        for slot in &mut self.consumers {
            slot.fill += n;
            self.peak_fill = self.peak_fill.max(slot.fill);
        }
        self.tokens_written += n;
        Ok(())
    }

    /// True iff `consumer` holds at least `n` tokens. False for non-consumers.
    pub fn can_consume(&self, consumer: ProcessId, n: u64) -> bool {
        self.slot(consumer).is_some_and(|s| s.fill >= n)
    }

    /// Drains `n` tokens from `consumer`'s counter only.
    pub fn consume(&mut self, consumer: ProcessId, n: u64) -> Result<(), ProtocolViolation> {
        let name = &self.name;
        let slot = self
            .consumers
            .iter_mut()
            .find(|s| s.process == consumer)
            .ok_or_else(|| ProtocolViolation::UnknownConsumer {
                channel: name.clone(),
                consumer: consumer.to_string(),
            })?;
        if slot.fill < n {
            return Err(ProtocolViolation::ChannelUnderflow {
                channel: name.clone(),
                consumer: slot.name.clone(),
                fill: slot.fill,
                requested: n,
            });
        }
        slot.fill -= n;
        slot.tokens_read += n;
        Ok(())
    }

    /// Bytes moved by an operation on `n` tokens.
    pub fn transfer_size(&self, n: u64) -> u64 {
        n.saturating_mul(self.token_size)
    }

    /// Produce-side cost of writing `n` tokens from `processor`.
    pub fn write_ticks(&self, processor: &str, n: u64) -> Option<SimTime> {
        self.primitive.produce_ticks(processor, self.transfer_size(n))
    }

    /// Consume-side cost of reading `n` tokens on `processor`.
    pub fn read_ticks(&self, processor: &str, n: u64) -> Option<SimTime> {
        self.primitive.consume_ticks(processor, self.transfer_size(n))
    }
}
