//! Cumulative call accounting
//!
//! Counters live for the whole lifetime of a relay and are never reset by
//! state transitions. `failures` includes timeouts.

use serde::Serialize;

use crate::relay::CircuitState;

/// Lifetime counters kept inside the relay state
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub(crate) successes: u64,
    pub(crate) failures: u64,
    pub(crate) timeouts: u64,
}

impl Counters {
    pub(crate) fn record_success(&mut self) {
        self.successes += 1;
    }

    pub(crate) fn record_failure(&mut self, timed_out: bool) {
        self.failures += 1;
        if timed_out {
            self.timeouts += 1;
        }
    }

    pub(crate) fn snapshot(&self, state: CircuitState) -> RelayMetrics {
        RelayMetrics {
            state,
            successes: self.successes,
            failures: self.failures,
            timeouts: self.timeouts,
            total: self.successes + self.failures,
        }
    }
}

/// Point-in-time view of a relay's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayMetrics {
    pub state: CircuitState,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    /// Always `successes + failures`
    pub total: u64,
}
