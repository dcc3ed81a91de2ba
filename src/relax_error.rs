//! RelaxError: unified error type for halo-relax public APIs
//!
//! Configuration errors are detected before any grid row is exchanged. The
//! only one seen by a single rank (a bad initial grid) reaches the others as
//! [`RelaxError::RejectedByCoordinator`].
//! Communication errors are fatal: the protocol has no retry policy.

use thiserror::Error;

/// Unified error type for relaxation runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RelaxError {
    /// The grid must have at least one interior row and column.
    #[error("Dimensions supplied invalid: {dimension}x{dimension} (minimum 3x3)")]
    GridTooSmall { dimension: usize },
    /// More workers than interior rows: some worker would own nothing.
    #[error("{workers} workers requested but only {rows} interior rows are available")]
    TooManyWorkers { workers: usize, rows: usize },
    /// The transport reported an empty world.
    #[error("at least one worker is required")]
    NoWorkers,
    /// Precision is used as a bucket width and must be positive and finite.
    #[error("precision must be positive and finite, got {0}")]
    InvalidPrecision(f64),
    /// The coordinator was started without an initial grid.
    #[error("coordinator rank holds no initial grid")]
    MissingGrid,
    /// The coordinator refused to distribute its grid; it reports the cause.
    #[error("coordinator rejected the initial grid")]
    RejectedByCoordinator,
    /// Buffer or grid shape disagrees with the configured dimension.
    #[error("shape mismatch: expected {expected} values, got {found}")]
    ShapeMismatch { expected: usize, found: usize },
    /// A send or receive could not complete.
    #[error("communication with rank {neighbor} failed: {reason}")]
    Comm { neighbor: usize, reason: String },
    /// A message arrived with a tag the receiver did not ask for.
    #[error("rank {neighbor} sent tag {found}, expected {expected}")]
    UnexpectedTag { neighbor: usize, expected: u16, found: u16 },
    /// A message carried the wrong number of values.
    #[error("rank {neighbor} sent {found} values, expected {expected}")]
    PayloadLength { neighbor: usize, expected: usize, found: usize },
    /// An in-process worker thread panicked.
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}

impl RelaxError {
    /// `true` for errors detected from configuration alone, before any
    /// message has been exchanged.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RelaxError::GridTooSmall { .. }
                | RelaxError::TooManyWorkers { .. }
                | RelaxError::NoWorkers
                | RelaxError::InvalidPrecision(_)
                | RelaxError::MissingGrid
                | RelaxError::RejectedByCoordinator
                | RelaxError::ShapeMismatch { .. }
        )
    }

    pub(crate) fn comm(neighbor: usize, reason: impl Into<String>) -> Self {
        RelaxError::Comm {
            neighbor,
            reason: reason.into(),
        }
    }
}
