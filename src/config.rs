//! Run parameters for the simulation engine.
//!
//! Platform, application and mapping descriptions are handed to the engine
//! as values; this module only covers how a run is executed: watchdog
//! limits, event recording, logging and output location.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! simulation:
//!   max_ticks: 1000000000
//!   max_steps: 10000000
//!   record_events: true
//!   log_level: debug
//!   output_dir: results
//!   threads: 4
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::types::SimTime;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Parameters of one simulation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Stop with a tick-limit stall once simulated time passes this value
    #[serde(default)]
    pub max_ticks: Option<SimTime>,

    /// Stop with a step-limit stall after this many steps (events and
    /// zero-time process advances)
    #[serde(default = "default_max_steps")]
    pub max_steps: Option<u64>,

    /// Record a trace-viewer event log
    #[serde(default)]
    pub record_events: bool,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output directory for results
    #[serde(default)]
    pub output_dir: Option<String>,

    /// Worker threads for batch runs (rayon default when unset)
    #[serde(default)]
    pub threads: Option<usize>,
}

fn default_max_steps() -> Option<u64> {
    Some(10_000_000)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            max_ticks: None,
            max_steps: default_max_steps(),
            record_events: false,
            log_level: default_log_level(),
            output_dir: None,
            threads: None,
        }
    }
}

impl SimulationParams {
    /// Rejects limits that would stop a run before it starts.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_ticks == Some(0) {
            return Err(ConfigError::Validation("max_ticks must be positive".to_string()));
        }
        if self.max_steps == Some(0) {
            return Err(ConfigError::Validation("max_steps must be positive".to_string()));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::Validation("threads must be positive".to_string()));
        }
        if self.max_steps.is_none() && self.max_ticks.is_none() {
            tracing::warn!("no watchdog limit set; a livelocked run will not terminate");
        }
        Ok(())
    }
}

/// Complete run configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationParams,
}

impl SimConfig {
    /// Creates a configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.simulation.validate()
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Saves configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for creating SimConfig programmatically.
#[derive(Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the simulated-time watchdog.
    pub fn max_ticks(mut self, ticks: SimTime) -> Self {
        self.config.simulation.max_ticks = Some(ticks);
        self
    }

    /// Sets or clears the event-count watchdog.
    pub fn max_steps(mut self, steps: Option<u64>) -> Self {
        self.config.simulation.max_steps = steps;
        self
    }

    /// Enables the trace-viewer event log.
    pub fn record_events(mut self, enable: bool) -> Self {
        self.config.simulation.record_events = enable;
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.simulation.log_level = level.into();
        self
    }

    /// Sets the output directory.
    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.simulation.output_dir = Some(dir.into());
        self
    }

    /// Sets the worker thread count for batch runs.
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.simulation.threads = Some(threads);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
