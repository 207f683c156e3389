//! Execution traces consumed by runtime processes.
//!
//! A trace is a sequence of [`TraceSegment`]s per process. A segment may
//! carry a compute burst, followed by at most one of: a channel read, a
//! channel write or the terminal marker. Traces come from an external
//! [`TraceSource`]; the engine asks for exactly one segment per step and never
//! asks again once a terminal segment was handed out for that process.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolViolation;
use crate::types::Cycles;

/// One atomic step of a process trace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSegment {
    /// Compute burst executed before any channel action
    #[serde(default)]
    pub processing_cycles: Option<Cycles>,
    #[serde(default)]
    pub read_from_channel: Option<String>,
    #[serde(default)]
    pub write_to_channel: Option<String>,
    /// Number of tokens read or written
    #[serde(default)]
    pub n_tokens: u64,
    #[serde(default)]
    pub terminate: bool,
}

impl TraceSegment {
    /// A pure compute burst.
    pub fn compute(cycles: Cycles) -> Self {
        Self {
            processing_cycles: Some(cycles),
            ..Self::default()
        }
    }

    /// Reads `n_tokens` from `channel`.
    pub fn read(channel: impl Into<String>, n_tokens: u64) -> Self {
        Self {
            read_from_channel: Some(channel.into()),
            n_tokens,
            ..Self::default()
        }
    }

    /// Writes `n_tokens` to `channel`.
    pub fn write(channel: impl Into<String>, n_tokens: u64) -> Self {
        Self {
            write_to_channel: Some(channel.into()),
            n_tokens,
            ..Self::default()
        }
    }

    /// The terminal marker.
    pub fn terminate() -> Self {
        Self {
            terminate: true,
            ..Self::default()
        }
    }

    /// Prefixes the segment with a compute burst.
    pub fn after_compute(mut self, cycles: Cycles) -> Self {
        self.processing_cycles = Some(cycles);
        self
    }

    pub fn cycles(&self) -> Cycles {
        self.processing_cycles.unwrap_or(0)
    }

    /// Rejects a segment that both reads and writes.
    pub fn validate(&self, process: &str) -> Result<(), ProtocolViolation> {
        if self.read_from_channel.is_some() && self.write_to_channel.is_some() {
            return Err(ProtocolViolation::ReadAndWrite(process.to_string()));
        }
        Ok(())
    }
}

/// Supplier of trace segments.
///
/// Implementations are stateful cursors over per-process traces. The
/// `processor_type` lets one source hold type-specific variants of the same
/// process (e.g. different cycle counts on big and little cores).
pub trait TraceSource: Send {
    /// Returns the next segment of `process`, or `None` if the trace ran dry.
    fn next_segment(&mut self, process: &str, processor_type: &str) -> Option<TraceSegment>;

    /// Rewinds every process to its first segment.
    fn reset(&mut self);
}

/// An in-memory trace source.
///
/// Holds a default trace per process and optional per-processor-type
/// overrides.
///
/// # Example
///
/// ```
/// use kpnsim::trace::{ScriptedTraceSource, TraceSegment, TraceSource};
///
/// let mut traces = ScriptedTraceSource::new();
/// traces.add_trace("p", vec![TraceSegment::compute(100), TraceSegment::terminate()]);
///
/// assert_eq!(traces.next_segment("p", "ARM"), Some(TraceSegment::compute(100)));
/// assert_eq!(traces.next_segment("p", "ARM"), Some(TraceSegment::terminate()));
/// assert_eq!(traces.next_segment("p", "ARM"), None);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ScriptedTraceSource {
    traces: HashMap<String, Vec<TraceSegment>>,
    typed: HashMap<(String, String), Vec<TraceSegment>>,
    cursors: HashMap<String, usize>,
}

impl ScriptedTraceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the trace used for `process` on any processor type.
    pub fn add_trace(&mut self, process: impl Into<String>, segments: Vec<TraceSegment>) {
        self.traces.insert(process.into(), segments);
    }

    /// Sets the trace used for `process` on processors of `processor_type`.
    pub fn add_typed_trace(
        &mut self,
        process: impl Into<String>,
        processor_type: impl Into<String>,
        segments: Vec<TraceSegment>,
    ) {
        self.typed.insert((process.into(), processor_type.into()), segments);
    }

    /// Builder form of [`add_trace`](Self::add_trace).
    pub fn with_trace(mut self, process: impl Into<String>, segments: Vec<TraceSegment>) -> Self {
        self.add_trace(process, segments);
        self
    }

    /// Number of segments already handed out for `process`.
    pub fn position(&self, process: &str) -> usize {
        self.cursors.get(process).copied().unwrap_or(0)
    }
}

impl TraceSource for ScriptedTraceSource {
    fn next_segment(&mut self, process: &str, processor_type: &str) -> Option<TraceSegment> {
        let key = (process.to_string(), processor_type.to_string());
        let trace = self.typed.get(&key).or_else(|| self.traces.get(process))?;
        let cursor = self.cursors.entry(process.to_string()).or_insert(0);
        let segment = trace.get(*cursor).cloned()?;
        *cursor += 1;
        Some(segment)
    }

    fn reset(&mut self) {
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_constructors() {
        let s = TraceSegment::write("c0", 3).after_compute(50);
        assert_eq!(s.cycles(), 50);
        assert_eq!(s.write_to_channel.as_deref(), Some("c0"));
        assert_eq!(s.n_tokens, 3);
        assert!(!s.terminate);

        assert_eq!(TraceSegment::read("c1", 1).cycles(), 0);
        assert!(TraceSegment::terminate().terminate);
    }

    #[test]
    fn test_segment_validate() {
        assert!(TraceSegment::read("c", 1).validate("p").is_ok());

        let mut both = TraceSegment::read("c", 1);
        both.write_to_channel = Some("d".to_string());
        assert_eq!(
            both.validate("p"),
            Err(ProtocolViolation::ReadAndWrite("p".to_string()))
        );
    }

    #[test]
    fn test_scripted_source_typed_override() {
        let mut src = ScriptedTraceSource::new();
        src.add_trace("p", vec![TraceSegment::compute(100), TraceSegment::terminate()]);
        src.add_typed_trace("p", "DSP", vec![TraceSegment::compute(40), TraceSegment::terminate()]);

        assert_eq!(src.next_segment("p", "DSP"), Some(TraceSegment::compute(40)));
        assert_eq!(src.position("p"), 1);
        src.reset();
        assert_eq!(src.next_segment("p", "ARM"), Some(TraceSegment::compute(100)));
    }

    #[test]
    fn test_scripted_source_unknown_process() {
        let mut src = ScriptedTraceSource::new();
        assert_eq!(src.next_segment("nobody", "ARM"), None);
    }

    #[test]
    fn test_segment_deserialize_defaults() {
        let yaml = "read_from_channel: c0\nn_tokens: 2\n";
        let s: TraceSegment = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(s, TraceSegment::read("c0", 2));
    }
}
