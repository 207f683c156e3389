//! Sequential policy for processors without a real scheduler.

use std::collections::VecDeque;

use super::SchedulingPolicy;
use crate::types::ProcessId;

/// Keeps running the loaded process while it is ready; otherwise takes the
/// head of the ready queue.
///
/// Meant for one dedicated process per processor, where the choice never
/// matters and no switching cost should be provoked.
#[derive(Debug, Default)]
pub struct Dummy {
    ready: VecDeque<ProcessId>,
}

impl Dummy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulingPolicy for Dummy {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn register(&mut self, _process: ProcessId) {}

    fn on_ready(&mut self, process: ProcessId) {
        if !self.ready.contains(&process) {
            self.ready.push_back(process);
        }
    }

    fn schedule(&mut self, loaded: Option<ProcessId>) -> Option<ProcessId> {
        if let Some(current) = loaded {
            if let Some(pos) = self.ready.iter().position(|&p| p == current) {
                return self.ready.remove(pos);
            }
        }
        self.ready.pop_front()
    }

    fn ready_count(&self) -> usize {
        self.ready.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_loaded_process() {
        let mut policy = Dummy::new();
        policy.on_ready(1);
        policy.on_ready(2);
        assert_eq!(policy.schedule(Some(2)), Some(2));
        assert_eq!(policy.schedule(Some(2)), Some(1));
        assert_eq!(policy.schedule(None), None);
    }

    #[test]
    fn test_head_when_loaded_not_ready() {
        let mut policy = Dummy::new();
        policy.on_ready(3);
        policy.on_ready(1);
        assert_eq!(policy.schedule(Some(9)), Some(3));
        assert_eq!(policy.ready_count(), 1);
    }
}
