//! First-in first-out policy.

use std::collections::VecDeque;

use super::SchedulingPolicy;
use crate::types::ProcessId;

/// Runs the process that has been ready longest.
///
/// A process returning from BLOCKED counts as newly arrived and queues at
/// the tail.
#[derive(Debug, Default)]
pub struct Fifo {
    queue: VecDeque<ProcessId>,
}

impl Fifo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulingPolicy for Fifo {
    fn name(&self) -> &str {
        "FIFO"
    }

    fn register(&mut self, _process: ProcessId) {}

    fn on_ready(&mut self, process: ProcessId) {
        if !self.queue.contains(&process) {
            self.queue.push_back(process);
        }
    }

    fn schedule(&mut self, _loaded: Option<ProcessId>) -> Option<ProcessId> {
        self.queue.pop_front()
    }

    fn ready_count(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrival_order() {
        let mut policy = Fifo::new();
        for p in [4, 2, 7] {
            policy.on_ready(p);
        }
        assert_eq!(policy.schedule(Some(7)), Some(4));
        assert_eq!(policy.schedule(None), Some(2));

        // 4 comes back after blocking: behind 7
        policy.on_ready(4);
        assert_eq!(policy.schedule(None), Some(7));
        assert_eq!(policy.schedule(None), Some(4));
        assert_eq!(policy.schedule(None), None);
    }

    #[test]
    fn test_duplicate_ready_is_ignored() {
        let mut policy = Fifo::new();
        policy.on_ready(1);
        policy.on_ready(1);
        assert_eq!(policy.ready_count(), 1);
    }
}
