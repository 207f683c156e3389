//! Round-robin policy over all owned processes.

use std::collections::BTreeSet;

use super::SchedulingPolicy;
use crate::types::ProcessId;

/// Rotates a pointer over the full list of owned processes.
///
/// Each decision scans forward from the pointer, picks the first ready
/// process and moves the pointer just past it. Processes that are not ready
/// are skipped but keep their slot in the rotation, so with `N` owned
/// processes that stay ready each one runs at least once every `N`
/// decisions.
#[derive(Debug, Default)]
pub struct RoundRobin {
    owned: Vec<ProcessId>,
    ready: BTreeSet<ProcessId>,
    next: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulingPolicy for RoundRobin {
    fn name(&self) -> &str {
        "RoundRobin"
    }

    fn register(&mut self, process: ProcessId) {
        if !self.owned.contains(&process) {
            self.owned.push(process);
        }
    }

    fn on_ready(&mut self, process: ProcessId) {
        self.ready.insert(process);
    }

    fn schedule(&mut self, _loaded: Option<ProcessId>) -> Option<ProcessId> {
        let n = self.owned.len();
        for offset in 0..n {
            let index = (self.next + offset) % n;
            let candidate = self.owned[index];
            if self.ready.remove(&candidate) {
                self.next = (index + 1) % n;
                return Some(candidate);
            }
        }
        None
    }

    fn ready_count(&self) -> usize {
        self.ready.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rr(owned: &[ProcessId]) -> RoundRobin {
        let mut policy = RoundRobin::new();
        for &p in owned {
            policy.register(p);
        }
        policy
    }

    #[test]
    fn test_rotation_skips_unready() {
        let mut policy = rr(&[10, 11, 12]);
        policy.on_ready(12);
        policy.on_ready(10);

        assert_eq!(policy.schedule(None), Some(10));
        // pointer is past 10; 11 is not ready
        assert_eq!(policy.schedule(None), Some(12));
        assert_eq!(policy.schedule(None), None);
    }

    #[test]
    fn test_returning_process_gets_no_priority() {
        let mut policy = rr(&[0, 1, 2]);
        for p in 0..3 {
            policy.on_ready(p);
        }
        assert_eq!(policy.schedule(None), Some(0));
        // 0 is ready again immediately but 1 and 2 come first
        policy.on_ready(0);
        assert_eq!(policy.schedule(Some(0)), Some(1));
        assert_eq!(policy.schedule(Some(1)), Some(2));
        assert_eq!(policy.schedule(Some(2)), Some(0));
    }

    #[test]
    fn test_fairness_window() {
        let n = 5;
        let owned: Vec<_> = (0..n).collect();
        let mut policy = rr(&owned);
        for &p in &owned {
            policy.on_ready(p);
        }

        let mut picks = Vec::new();
        for _ in 0..4 * n {
            let p = policy.schedule(None).unwrap();
            picks.push(p);
            // never blocks: ready again right away
            policy.on_ready(p);
        }
        for window in picks.windows(n) {
            let mut seen: Vec<_> = window.to_vec();
            seen.sort_unstable();
            assert_eq!(seen, owned);
        }
    }
}
