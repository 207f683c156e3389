//! Results of a simulation run and their export formats.
//!
//! A [`SimulationResult`] is produced when the run reaches quiescence. It
//! carries the total simulated time plus per-process, per-scheduler and
//! per-channel reports, and can be exported as JSON, CSV or a
//! human-readable summary.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::channel::RuntimeChannel;
use crate::event_log::EventLog;
use crate::platform::ContextSwitchMode;
use crate::process::{ProcessState, ProcessStats, RuntimeProcess};
use crate::scheduler::{LaneStats, RuntimeScheduler};
use crate::types::SimTime;

/// Final state and counters of one process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub name: String,
    pub scheduler: String,
    pub processor: String,
    pub state: ProcessState,
    pub finish_tick: Option<SimTime>,
    #[serde(flatten)]
    pub stats: ProcessStats,
}

impl ProcessReport {
    pub(crate) fn capture(process: &RuntimeProcess, scheduler: &str) -> Self {
        Self {
            name: process.name().to_string(),
            scheduler: scheduler.to_string(),
            processor: process.processor().name.clone(),
            state: process.state(),
            finish_tick: process.finish_tick(),
            stats: process.stats().clone(),
        }
    }
}

/// Counters of one processor lane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneReport {
    pub processor: String,
    #[serde(flatten)]
    pub stats: LaneStats,
}

/// Counters of one scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerReport {
    pub name: String,
    pub policy: String,
    pub context_switch_mode: ContextSwitchMode,
    pub lanes: Vec<LaneReport>,
    /// Sums over all lanes
    pub totals: LaneStats,
}

impl SchedulerReport {
    pub(crate) fn capture(scheduler: &RuntimeScheduler) -> Self {
        Self {
            name: scheduler.name().to_string(),
            policy: scheduler.policy_name().to_string(),
            context_switch_mode: scheduler.context_switch_mode(),
            lanes: scheduler
                .lanes()
                .iter()
                .map(|l| LaneReport {
                    processor: l.processor().name.clone(),
                    stats: l.stats().clone(),
                })
                .collect(),
            totals: scheduler.total_stats(),
        }
    }
}

/// Read progress of one consumer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerReport {
    pub name: String,
    pub fill: u64,
    pub tokens_read: u64,
}

/// Final state of one channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub name: String,
    pub capacity: u64,
    pub token_size: u64,
    pub primitive: String,
    pub producer: String,
    pub tokens_written: u64,
    pub peak_fill: u64,
    pub consumers: Vec<ConsumerReport>,
}

impl ChannelReport {
    pub(crate) fn capture(channel: &RuntimeChannel) -> Self {
        Self {
            name: channel.name().to_string(),
            capacity: channel.capacity(),
            token_size: channel.token_size(),
            primitive: channel.primitive().name.clone(),
            producer: channel.producer_name().to_string(),
            tokens_written: channel.tokens_written(),
            peak_fill: channel.peak_fill(),
            consumers: channel
                .consumers()
                .iter()
                .map(|c| ConsumerReport {
                    name: c.name.clone(),
                    fill: c.fill,
                    tokens_read: c.tokens_read,
                })
                .collect(),
        }
    }
}

/// Outcome of a completed simulation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Name of the simulated application
    pub name: String,
    /// Simulated time at quiescence, in ticks
    pub total_ticks: SimTime,
    /// Engine steps: events taken from the queue plus zero-time advances
    pub events_processed: u64,
    /// Wall-clock duration of the run in milliseconds
    pub wall_time_ms: f64,
    pub processes: Vec<ProcessReport>,
    pub schedulers: Vec<SchedulerReport>,
    pub channels: Vec<ChannelReport>,
    /// Recorded trace-viewer events, when enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_log: Option<EventLog>,
}

impl SimulationResult {
    pub fn process(&self, name: &str) -> Option<&ProcessReport> {
        self.processes.iter().find(|p| p.name == name)
    }

    pub fn scheduler(&self, name: &str) -> Option<&SchedulerReport> {
        self.schedulers.iter().find(|s| s.name == name)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Simulated ticks per wall-clock second.
    pub fn ticks_per_second(&self) -> f64 {
        if self.wall_time_ms > 0.0 {
            self.total_ticks as f64 / (self.wall_time_ms / 1000.0)
        } else {
            0.0
        }
    }

    /// Exports the result to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports the result to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Exports run-level metrics to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("metric,value\n");
        csv.push_str(&format!("total_ticks,{}\n", self.total_ticks));
        csv.push_str(&format!("events_processed,{}\n", self.events_processed));
        csv.push_str(&format!("process_count,{}\n", self.processes.len()));
        csv.push_str(&format!("scheduler_count,{}\n", self.schedulers.len()));
        csv.push_str(&format!("channel_count,{}\n", self.channels.len()));
        csv.push_str(&format!("wall_time_ms,{:.2}\n", self.wall_time_ms));
        csv
    }

    /// Exports per-process counters to CSV.
    pub fn processes_to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("process,scheduler,processor,state,finish_tick,segments,compute_ticks,communication_ticks,blocked_count,activations\n");
        for p in &self.processes {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{}\n",
                p.name,
                p.scheduler,
                p.processor,
                p.state,
                p.finish_tick.map(|t| t.to_string()).unwrap_or_default(),
                p.stats.segments,
                p.stats.compute_ticks,
                p.stats.communication_ticks,
                p.stats.blocked_count,
                p.stats.activations,
            ));
        }
        csv
    }

    /// Exports per-scheduler totals to CSV.
    pub fn schedulers_to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("scheduler,policy,decisions,context_switches,scheduling_ticks,context_switch_ticks,busy_ticks\n");
        for s in &self.schedulers {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                s.name,
                s.policy,
                s.totals.decisions,
                s.totals.context_switches,
                s.totals.scheduling_ticks,
                s.totals.context_switch_ticks,
                s.totals.busy_ticks,
            ));
        }
        csv
    }

    /// Writes the CSV exports into `dir` as `summary.csv`, `processes.csv`
    /// and `schedulers.csv`.
    pub fn to_csv_dir<P: AsRef<Path>>(&self, dir: P) -> std::io::Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join("summary.csv"), self.to_csv())?;
        std::fs::write(dir.join("processes.csv"), self.processes_to_csv())?;
        std::fs::write(dir.join("schedulers.csv"), self.schedulers_to_csv())
    }

    /// Writes a human-readable summary to a writer.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "=== Simulation Result ===")?;
        if !self.name.is_empty() {
            writeln!(w, "Application: {}", self.name)?;
        }
        writeln!(w, "Total ticks: {}", self.total_ticks)?;
        writeln!(w, "Events processed: {}", self.events_processed)?;
        writeln!(w, "Wall time: {:.2} ms", self.wall_time_ms)?;
        writeln!(w)?;

        writeln!(w, "--- Processes ---")?;
        for p in &self.processes {
            writeln!(
                w,
                "{} on {}/{}: {} at {}, compute {}, communication {}, blocked {}x",
                p.name,
                p.scheduler,
                p.processor,
                p.state,
                p.finish_tick.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()),
                p.stats.compute_ticks,
                p.stats.communication_ticks,
                p.stats.blocked_count,
            )?;
        }
        writeln!(w)?;

        writeln!(w, "--- Schedulers ---")?;
        for s in &self.schedulers {
            writeln!(
                w,
                "{} ({}): {} decisions, {} context switches, overhead {} ticks",
                s.name,
                s.policy,
                s.totals.decisions,
                s.totals.context_switches,
                s.totals.scheduling_ticks + s.totals.context_switch_ticks,
            )?;
            for lane in &s.lanes {
                let utilization = if self.total_ticks > 0 {
                    100.0 * lane.stats.busy_ticks as f64 / self.total_ticks as f64
                } else {
                    0.0
                };
                writeln!(w, "  {}: busy {:.1}%", lane.processor, utilization)?;
            }
        }
        writeln!(w)?;

        writeln!(w, "--- Channels ---")?;
        for c in &self.channels {
            writeln!(
                w,
                "{} ({} -> {} consumers): {} tokens written, peak fill {}/{}",
                c.name,
                c.producer,
                c.consumers.len(),
                c.tokens_written,
                c.peak_fill,
                c.capacity,
            )?;
        }

        Ok(())
    }

    /// Returns the summary as a string.
    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_summary(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// A simple timer for measuring wall-clock time.
#[derive(Debug)]
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Returns elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SimulationResult {
        SimulationResult {
            name: "pipeline".to_string(),
            total_ticks: 1000,
            events_processed: 42,
            wall_time_ms: 2.0,
            processes: vec![ProcessReport {
                name: "src".to_string(),
                scheduler: "sched0".to_string(),
                processor: "cpu0".to_string(),
                state: ProcessState::Finished,
                finish_tick: Some(1000),
                stats: ProcessStats {
                    segments: 3,
                    compute_ticks: 800,
                    communication_ticks: 200,
                    blocked_count: 1,
                    activations: 2,
                },
            }],
            schedulers: vec![SchedulerReport {
                name: "sched0".to_string(),
                policy: "FIFO".to_string(),
                context_switch_mode: ContextSwitchMode::AfterScheduling,
                lanes: vec![LaneReport {
                    processor: "cpu0".to_string(),
                    stats: LaneStats {
                        busy_ticks: 500,
                        ..LaneStats::default()
                    },
                }],
                totals: LaneStats {
                    decisions: 2,
                    busy_ticks: 500,
                    ..LaneStats::default()
                },
            }],
            channels: Vec::new(),
            event_log: None,
        }
    }

    #[test]
    fn test_lookup() {
        let r = sample();
        assert_eq!(r.process("src").map(|p| p.finish_tick), Some(Some(1000)));
        assert!(r.scheduler("sched0").is_some());
        assert!(r.channel("c0").is_none());
    }

    #[test]
    fn test_json_export_flattens_stats() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_ticks"], 1000);
        assert_eq!(value["processes"][0]["compute_ticks"], 800);
        assert_eq!(value["processes"][0]["state"], "FINISHED");
        assert!(value.get("event_log").is_none());
    }

    #[test]
    fn test_csv_export() {
        let r = sample();
        assert!(r.to_csv().contains("total_ticks,1000"));
        assert!(r
            .processes_to_csv()
            .contains("src,sched0,cpu0,FINISHED,1000,3,800,200,1,2"));
        assert!(r.schedulers_to_csv().contains("sched0,FIFO,2,0,0,0,500"));
    }

    #[test]
    fn test_summary_output() {
        let summary = sample().summary();
        assert!(summary.contains("Application: pipeline"));
        assert!(summary.contains("Total ticks: 1000"));
        assert!(summary.contains("cpu0: busy 50.0%"));
    }

    #[test]
    fn test_ticks_per_second() {
        // 1000 ticks in 2 ms
        assert_eq!(sample().ticks_per_second(), 500_000.0);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.elapsed_ms() >= 5.0);
    }
}
