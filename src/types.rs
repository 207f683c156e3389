//! Core type definitions for the simulation engine.
//!
//! Runtime objects reference each other through arena indices owned by the
//! engine rather than through owning pointers, so the process/channel/scheduler
//! relations never form ownership cycles.

/// Global simulation time, in ticks.
///
/// One tick is one picosecond-equivalent: a 1 GHz processor advances
/// 1000 ticks per cycle.
pub type SimTime = u64;

/// A cycle count measured in some frequency domain.
pub type Cycles = u64;

/// Index of a runtime process in the engine's process arena.
///
/// Indices follow the order in which the application graph lists processes.
pub type ProcessId = usize;

/// Index of a runtime channel in the engine's channel arena.
pub type ChannelId = usize;

/// Index of a runtime scheduler in the engine's scheduler arena.
pub type SchedulerId = usize;

/// Index of a processor lane inside one runtime scheduler.
pub type LaneId = usize;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_aliases() {
        let time: SimTime = 1_000;
        let cycles: Cycles = 42;
        let process: ProcessId = 3;
        let channel: ChannelId = 1;
        let scheduler: SchedulerId = 0;
        let lane: LaneId = 2;

        assert_eq!(time, 1_000);
        assert_eq!(cycles, 42);
        assert_eq!(process, 3);
        assert_eq!(channel, 1);
        assert_eq!(scheduler, 0);
        assert_eq!(lane, 2);
    }
}
