//! Structured event log in the trace-viewer JSON format.
//!
//! The log is a flat list of [`TraceEvent`]s serialized as
//! `{"traceEvents": [...]}`, which `chrome://tracing` and Perfetto open
//! directly. Timestamps are ticks. Every scheduler is a `pid` and every
//! lane (processor) of that scheduler a `tid`; channels get their own
//! counter track under a separate `pid` after the schedulers.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::types::SimTime;

/// Category of running-process slices.
pub const CAT_PROCESS: &str = "process";
/// Category of scheduling and context switch slices.
pub const CAT_OVERHEAD: &str = "overhead";
/// Category of block and unblock markers.
pub const CAT_SYNC: &str = "sync";
/// Category of channel fill counters.
pub const CAT_CHANNEL: &str = "channel";

/// One trace-viewer event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cat: String,
    /// Phase: `B`/`E` slice begin/end, `i` instant, `C` counter, `M` metadata
    pub ph: String,
    pub ts: SimTime,
    pub pid: usize,
    pub tid: usize,
    /// Scope of instant events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

impl TraceEvent {
    fn new(name: impl Into<String>, cat: &str, ph: &str, ts: SimTime, pid: usize, tid: usize) -> Self {
        Self {
            name: name.into(),
            cat: cat.to_string(),
            ph: ph.to_string(),
            ts,
            pid,
            tid,
            s: None,
            args: Map::new(),
        }
    }

    fn with_args(mut self, args: Value) -> Self {
        if let Value::Object(map) = args {
            self.args = map;
        }
        self
    }
}

/// Recorder of trace-viewer events.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    #[serde(rename = "traceEvents")]
    events: Vec<TraceEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Names a track group (`process_name`) or a track (`thread_name`).
    pub fn name_track(&mut self, pid: usize, tid: Option<usize>, name: &str) {
        let (kind, tid) = match tid {
            Some(tid) => ("thread_name", tid),
            None => ("process_name", 0),
        };
        self.events
            .push(TraceEvent::new(kind, "", "M", 0, pid, tid).with_args(json!({ "name": name })));
    }

    /// Opens a slice on a track.
    pub fn begin(&mut self, ts: SimTime, pid: usize, tid: usize, cat: &str, name: &str) {
        self.events.push(TraceEvent::new(name, cat, "B", ts, pid, tid));
    }

    /// Closes the innermost open slice on a track.
    pub fn end(&mut self, ts: SimTime, pid: usize, tid: usize, cat: &str, name: &str) {
        self.events.push(TraceEvent::new(name, cat, "E", ts, pid, tid));
    }

    /// A thread-scoped instant marker.
    pub fn instant(&mut self, ts: SimTime, pid: usize, tid: usize, name: &str, args: Value) {
        let mut event = TraceEvent::new(name, CAT_SYNC, "i", ts, pid, tid).with_args(args);
        event.s = Some("t".to_string());
        self.events.push(event);
    }

    /// A counter sample; each key of `values` is one series.
    pub fn counter(&mut self, ts: SimTime, pid: usize, name: &str, values: Value) {
        self.events
            .push(TraceEvent::new(name, CAT_CHANNEL, "C", ts, pid, 0).with_args(values));
    }

    /// Serializes to the trace-viewer JSON object.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Writes the log to `path`.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_and_metadata() {
        let mut log = EventLog::new();
        log.name_track(0, None, "sched0");
        log.name_track(0, Some(1), "cpu1");
        log.begin(10, 0, 1, CAT_PROCESS, "src");
        log.end(20, 0, 1, CAT_PROCESS, "src");
        assert_eq!(log.len(), 4);

        let e = &log.events()[1];
        assert_eq!(e.name, "thread_name");
        assert_eq!(e.ph, "M");
        assert_eq!(e.args["name"], "cpu1");
        assert_eq!(log.events()[3].ph, "E");
    }

    #[test]
    fn test_json_shape() {
        let mut log = EventLog::new();
        log.instant(5, 0, 0, "block", json!({ "channel": "c0" }));
        log.counter(5, 3, "c0", json!({ "sink": 2 }));

        let value: Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        let events = value["traceEvents"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["ph"], "i");
        assert_eq!(events[0]["s"], "t");
        assert_eq!(events[0]["args"]["channel"], "c0");
        assert_eq!(events[1]["ph"], "C");
        assert_eq!(events[1]["args"]["sink"], 2);
        // unset optional fields are omitted
        assert!(events[1].get("s").is_none());
    }

    #[test]
    fn test_roundtrip() {
        let mut log = EventLog::new();
        log.begin(1, 2, 3, CAT_OVERHEAD, "schedule");
        let restored: EventLog = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(restored, log);
    }
}
