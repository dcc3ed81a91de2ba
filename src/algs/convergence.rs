//! Local termination decisions.
//!
//! A worker stops on its own once its rule is satisfied and its final halo
//! rows have gone out to every neighbour still exchanging. There is no
//! all-worker agreement step: a finished worker freezes its rows while its
//! neighbours may keep relaxing against the last rows it sent. Textbook
//! distributed Jacobi would instead AND-reduce the local flags every sweep.

use serde::{Deserialize, Serialize};

/// When a worker wants to send its final halo rows.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopRule {
    /// As soon as a sweep leaves every owned cell in its precision bucket.
    #[default]
    Converged,
    /// After exactly this many sweeps, whatever the precision check says.
    FixedSweeps(usize),
}

/// Per-worker convergence state threaded through the iteration loop.
#[derive(Clone, Debug)]
pub struct ConvergenceTracker {
    rule: StopRule,
    sweeps: usize,
    locally_converged: bool,
}

impl ConvergenceTracker {
    pub fn new(rule: StopRule) -> Self {
        Self {
            rule,
            sweeps: 0,
            locally_converged: false,
        }
    }

    /// Record the kernel's verdict for the sweep just performed.
    pub fn record_sweep(&mut self, converged: bool) {
        self.sweeps += 1;
        self.locally_converged = converged;
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Verdict of the most recent sweep; `false` before the first one.
    pub fn locally_converged(&self) -> bool {
        self.locally_converged
    }

    /// The next halo exchange should carry the final tag.
    pub fn wants_to_finish(&self) -> bool {
        match self.rule {
            StopRule::Converged => self.locally_converged,
            StopRule::FixedSweeps(n) => self.sweeps >= n,
        }
    }

    /// The loop may end: the rule holds and no neighbour still expects a row.
    pub fn may_stop(&self, final_sent_to_all: bool) -> bool {
        self.wants_to_finish() && final_sent_to_all
    }
}
