//! Halo exchange between vertically adjacent workers.
//!
//! Every exchange sends this worker's boundary rows up and down with a
//! non-blocking send tagged [`CommTag::MORE`] or [`CommTag::FINAL`], then
//! probes each neighbour's next message and receives it into the matching halo
//! slot unless that neighbour has already signalled it is done.
//!
//! [`CommTag::MORE`]: crate::algs::communicator::CommTag::MORE
//! [`CommTag::FINAL`]: crate::algs::communicator::CommTag::FINAL

pub mod exchange;
pub mod latch;
pub mod send_slot;

pub use exchange::{ExchangeOutcome, HaloExchange};
pub use latch::NeighborState;
pub use send_slot::SendSlot;
