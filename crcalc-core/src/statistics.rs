//! Run statistics.

use crate::FitStatus;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters collected over a reconstruction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReconstructionStatistics {
    /// Hits in the input stream.
    pub total_hits: usize,
    /// Real events reconstructed (the sentinel is not counted).
    pub events: usize,
    /// SM event ids missing from the sequence.
    pub missing_events: usize,
    /// Single-hit events.
    pub degenerate: usize,
    /// Events whose fit did not converge.
    pub fit_failures: usize,
    /// Hits not assigned to any event.
    pub skipped_hits: usize,
}

impl ReconstructionStatistics {
    /// Counts one reconstructed event.
    pub fn record_event(&mut self, status: FitStatus) {
        self.events += 1;
        match status {
            FitStatus::Converged => {}
            FitStatus::Degenerate => self.degenerate += 1,
            FitStatus::NotConverged => self.fit_failures += 1,
        }
    }

    /// Events with a usable line fit.
    #[must_use]
    pub fn fitted(&self) -> usize {
        self.events - self.degenerate - self.fit_failures
    }
}
