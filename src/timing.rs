//! Conversion between cycles and global simulation ticks.
//!
//! Every duration in the model is specified in cycles of some clock (a
//! processor, a bus, a memory) and converted once into ticks, the single
//! global time unit. The conversion is
//!
//! ```text
//! ticks = round(cycles * TICKS_PER_SECOND / frequency_hz)
//! ```
//!
//! computed in 128-bit integer arithmetic with round-half-up, so results are
//! exact and reproducible across platforms.
//!
//! # Example
//!
//! ```
//! use kpnsim::timing::FrequencyDomain;
//!
//! let clk = FrequencyDomain::new("clk_cpu", 1_000_000_000); // 1 GHz
//! assert_eq!(clk.ticks(1), 1_000);
//! assert_eq!(clk.ticks(0), 0);
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{Cycles, SimTime};

/// Number of ticks in one simulated second (1 tick = 1 ps).
pub const TICKS_PER_SECOND: u128 = 1_000_000_000_000;

/// A named clock rate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrequencyDomain {
    /// Name of the domain (e.g., "fd_arm")
    pub name: String,
    /// Clock frequency in Hz
    pub frequency: u64,
}

impl FrequencyDomain {
    /// Creates a frequency domain running at `frequency` Hz.
    pub fn new(name: impl Into<String>, frequency: u64) -> Self {
        Self {
            name: name.into(),
            frequency,
        }
    }

    /// Converts a cycle count of this domain into global ticks.
    ///
    /// Rounds half up. A domain with frequency 0 is rejected during platform
    /// validation; if one slips through, every conversion saturates to
    /// `SimTime::MAX` for non-zero cycles.
    pub fn ticks(&self, cycles: Cycles) -> SimTime {
        if cycles == 0 {
            return 0;
        }
        if self.frequency == 0 {
            return SimTime::MAX;
        }
        let freq = self.frequency as u128;
        let scaled = cycles as u128 * TICKS_PER_SECOND;
        let rounded = (scaled + freq / 2) / freq;
        SimTime::try_from(rounded).unwrap_or(SimTime::MAX)
    }

    /// Length of one cycle in ticks (rounded).
    #[inline]
    pub fn period(&self) -> SimTime {
        self.ticks(1)
    }

    /// Converts ticks back into whole cycles of this domain (rounded down).
    pub fn cycles(&self, ticks: SimTime) -> Cycles {
        let cycles = ticks as u128 * self.frequency as u128 / TICKS_PER_SECOND;
        Cycles::try_from(cycles).unwrap_or(Cycles::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_at_one_ghz() {
        let fd = FrequencyDomain::new("fd", 1_000_000_000);
        assert_eq!(fd.ticks(0), 0);
        assert_eq!(fd.ticks(1), 1_000);
        assert_eq!(fd.ticks(100), 100_000);
        assert_eq!(fd.period(), 1_000);
    }

    #[test]
    fn test_ticks_rounds_half_up() {
        // 3 GHz: one cycle is 333.33.. ticks, two cycles 666.66.. ticks
        let fd = FrequencyDomain::new("fd", 3_000_000_000);
        assert_eq!(fd.ticks(1), 333);
        assert_eq!(fd.ticks(2), 667);
        assert_eq!(fd.ticks(3), 1_000);

        // 8 THz: 0.125 ticks per cycle; 4 cycles are exactly half a tick
        let fast = FrequencyDomain::new("fast", 8_000_000_000_000);
        assert_eq!(fast.ticks(3), 0);
        assert_eq!(fast.ticks(4), 1);
    }

    #[test]
    fn test_ticks_is_monotonic() {
        let fd = FrequencyDomain::new("fd", 1_400_000_000);
        let mut last = 0;
        for cycles in 0..5_000 {
            let t = fd.ticks(cycles);
            assert!(t >= last, "ticks({}) = {} < {}", cycles, t, last);
            last = t;
        }
    }

    #[test]
    fn test_zero_frequency_saturates() {
        let fd = FrequencyDomain::new("broken", 0);
        assert_eq!(fd.ticks(0), 0);
        assert_eq!(fd.ticks(1), SimTime::MAX);
    }

    #[test]
    fn test_cycles_inverse() {
        let fd = FrequencyDomain::new("fd", 500_000_000);
        assert_eq!(fd.cycles(fd.ticks(250)), 250);
        assert_eq!(fd.cycles(1_999), 0);
    }

    #[test]
    fn test_large_cycle_counts() {
        let fd = FrequencyDomain::new("slow", 1);
        assert_eq!(fd.ticks(2), 2 * 1_000_000_000_000);
        assert_eq!(fd.ticks(u64::MAX), SimTime::MAX);
    }
}
