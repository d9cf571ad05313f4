//! Silent-cycle bookkeeping

/// Emit a heartbeat every this many consecutive empty cycles
pub const HEARTBEAT_EVERY: u64 = 4;

/// Counts consecutive cycles without output
#[derive(Debug, Clone)]
pub struct SilentCycleCounter {
    consecutive: u64,
    every: u64,
}

impl SilentCycleCounter {
    pub fn new(every: u64) -> Self {
        Self {
            consecutive: 0,
            every: every.max(1),
        }
    }

    /// Record a cycle; returns true when a heartbeat is due
    pub fn record(&mut self, produced_output: bool) -> bool {
        if produced_output {
            self.consecutive = 0;
            return false;
        }
        self.consecutive += 1;
        self.consecutive % self.every == 0
    }

    pub fn consecutive(&self) -> u64 {
        self.consecutive
    }
}

impl Default for SilentCycleCounter {
    fn default() -> Self {
        Self::new(HEARTBEAT_EVERY)
    }
}
