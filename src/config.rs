//! Run configuration.
//!
//! Deserializable with serde so a front end can load it from whatever format
//! it likes; the defaults are the classic 5x5 grid relaxed to 0.01.

use crate::algs::convergence::StopRule;
use crate::relax_error::RelaxError;
use serde::{Deserialize, Serialize};

/// Parameters every worker must agree on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxConfig {
    /// Grid side length N (N×N grid, N ≥ 3).
    pub dimension: usize,
    /// Width of a precision bucket.
    pub precision: f64,
    /// Log the initial grid and every partition at debug level.
    pub verbose: bool,
    pub stop: StopRule,
}

impl Default for RelaxConfig {
    fn default() -> Self {
        Self {
            dimension: 5,
            precision: 0.01,
            verbose: false,
            stop: StopRule::Converged,
        }
    }
}

impl RelaxConfig {
    pub fn new(dimension: usize, precision: f64) -> Self {
        Self {
            dimension,
            precision,
            ..Default::default()
        }
    }

    pub fn with_stop(mut self, stop: StopRule) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Checks that do not depend on the number of workers.
    pub fn validate(&self) -> Result<(), RelaxError> {
        if self.dimension < 3 {
            return Err(RelaxError::GridTooSmall {
                dimension: self.dimension,
            });
        }
        if !(self.precision.is_finite() && self.precision > 0.0) {
            return Err(RelaxError::InvalidPrecision(self.precision));
        }
        Ok(())
    }
}
