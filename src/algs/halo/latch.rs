//! Per-direction "neighbour finished" latch.

use crate::algs::communicator::CommTag;

/// Whether a neighbour is still sending halo rows.
///
/// Moves from `Exchanging` to `NeighborFinished` at most once and never back.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NeighborState {
    #[default]
    Exchanging,
    NeighborFinished,
}

impl NeighborState {
    /// Record the tag of a halo row just received from this neighbour.
    /// Returns `true` if this call set the latch.
    pub fn observe(&mut self, tag: CommTag) -> bool {
        if *self == NeighborState::Exchanging && tag == CommTag::FINAL {
            *self = NeighborState::NeighborFinished;
            return true;
        }
        false
    }

    pub fn is_finished(self) -> bool {
        self == NeighborState::NeighborFinished
    }
}
