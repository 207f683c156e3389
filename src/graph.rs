//! Application graph: processes connected by channels.
//!
//! Each channel has exactly one producer and one or more consumers. The
//! order in which processes are listed is significant: it is the
//! registration order used by schedulers and the tie-break order for
//! processes that become ready at the same tick.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// A process of the application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDesc {
    pub name: String,
}

/// A channel of the application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDesc {
    pub name: String,
    /// Size of one token in bytes
    #[serde(default = "default_token_size")]
    pub token_size: u64,
    pub producer: String,
    pub consumers: Vec<String>,
}

fn default_token_size() -> u64 {
    1
}

/// The application as a process network.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpnGraph {
    pub name: String,
    #[serde(default)]
    pub processes: Vec<ProcessDesc>,
    #[serde(default)]
    pub channels: Vec<ChannelDesc>,
}

impl KpnGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a process.
    pub fn add_process(&mut self, name: impl Into<String>) {
        self.processes.push(ProcessDesc { name: name.into() });
    }

    /// Adds a channel from `producer` to `consumers`.
    pub fn add_channel(
        &mut self,
        name: impl Into<String>,
        token_size: u64,
        producer: impl Into<String>,
        consumers: &[&str],
    ) {
        self.channels.push(ChannelDesc {
            name: name.into(),
            token_size,
            producer: producer.into(),
            consumers: consumers.iter().map(|c| c.to_string()).collect(),
        });
    }

    pub fn find_process(&self, name: &str) -> Option<&ProcessDesc> {
        self.processes.iter().find(|p| p.name == name)
    }

    pub fn find_channel(&self, name: &str) -> Option<&ChannelDesc> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Channels a process reads from.
    pub fn incoming(&self, process: &str) -> impl Iterator<Item = &ChannelDesc> + '_ {
        let process = process.to_string();
        self.channels
            .iter()
            .filter(move |c| c.consumers.iter().any(|p| *p == process))
    }

    /// Channels a process writes to.
    pub fn outgoing<'a>(&'a self, process: &'a str) -> impl Iterator<Item = &'a ChannelDesc> + 'a {
        self.channels.iter().filter(move |c| c.producer == process)
    }

    /// Checks names are unique and every channel endpoint exists.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut processes = HashSet::new();
        for p in &self.processes {
            if !processes.insert(p.name.as_str()) {
                return Err(ConfigurationError::Duplicate {
                    kind: "process",
                    name: p.name.clone(),
                });
            }
        }

        let mut channels = HashSet::new();
        for c in &self.channels {
            if !channels.insert(c.name.as_str()) {
                return Err(ConfigurationError::Duplicate {
                    kind: "channel",
                    name: c.name.clone(),
                });
            }
            if c.consumers.is_empty() {
                return Err(ConfigurationError::NoConsumer(c.name.clone()));
            }
            for endpoint in std::iter::once(&c.producer).chain(&c.consumers) {
                if !processes.contains(endpoint.as_str()) {
                    return Err(ConfigurationError::DanglingEndpoint {
                        channel: c.name.clone(),
                        process: endpoint.clone(),
                    });
                }
            }
            let mut seen = HashSet::new();
            for consumer in &c.consumers {
                if !seen.insert(consumer.as_str()) {
                    return Err(ConfigurationError::Duplicate {
                        kind: "consumer",
                        name: format!("{}.{}", c.name, consumer),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> KpnGraph {
        let mut g = KpnGraph::new("pipeline");
        g.add_process("src");
        g.add_process("filter");
        g.add_process("sink_a");
        g.add_process("sink_b");
        g.add_channel("c0", 4, "src", &["filter"]);
        g.add_channel("c1", 8, "filter", &["sink_a", "sink_b"]);
        g
    }

    #[test]
    fn test_graph_lookup() {
        let g = pipeline();
        assert!(g.find_process("filter").is_some());
        assert!(g.find_process("missing").is_none());
        assert_eq!(g.find_channel("c1").map(|c| c.consumers.len()), Some(2));
    }

    #[test]
    fn test_incoming_outgoing() {
        let g = pipeline();
        let incoming: Vec<_> = g.incoming("filter").map(|c| c.name.as_str()).collect();
        let outgoing: Vec<_> = g.outgoing("filter").map(|c| c.name.as_str()).collect();
        assert_eq!(incoming, vec!["c0"]);
        assert_eq!(outgoing, vec!["c1"]);
        assert_eq!(g.incoming("sink_b").count(), 1);
        assert_eq!(g.outgoing("sink_b").count(), 0);
    }

    #[test]
    fn test_validate_ok() {
        assert!(pipeline().validate().is_ok());
    }

    #[test]
    fn test_validate_dangling_endpoint() {
        let mut g = pipeline();
        g.add_channel("c2", 1, "sink_a", &["ghost"]);
        assert_eq!(
            g.validate(),
            Err(ConfigurationError::DanglingEndpoint {
                channel: "c2".to_string(),
                process: "ghost".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_no_consumer() {
        let mut g = pipeline();
        g.add_channel("c2", 1, "sink_a", &[]);
        assert_eq!(g.validate(), Err(ConfigurationError::NoConsumer("c2".to_string())));
    }

    #[test]
    fn test_default_token_size() {
        let json = r#"{"name": "c", "producer": "a", "consumers": ["b"]}"#;
        let channel: ChannelDesc = serde_json::from_str(json).unwrap();
        assert_eq!(channel.token_size, 1);
    }
}
