//! Send buffer for one direction, owned either by us or by the transport.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::relax_error::RelaxError;

/// A reusable send buffer.
///
/// `Idle` holds the buffer; `InFlight` holds the handle of the send that
/// borrowed it. The buffer can only be refilled after the handle has been
/// waited on, and a slot that never sent is never waited on.
#[derive(Debug)]
pub enum SendSlot<H> {
    Idle(Vec<f64>),
    InFlight(H),
}

impl<H: Wait> SendSlot<H> {
    pub fn new(capacity: usize) -> Self {
        SendSlot::Idle(Vec::with_capacity(capacity))
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, SendSlot::InFlight(_))
    }

    /// Take the buffer back, waiting for the outstanding send if there is one.
    fn acquire(&mut self) -> Result<Vec<f64>, RelaxError> {
        match std::mem::replace(self, SendSlot::Idle(Vec::new())) {
            SendSlot::Idle(buf) => Ok(buf),
            SendSlot::InFlight(handle) => handle.wait(),
        }
    }

    /// Copy `row` into the buffer and post it to `peer`.
    pub fn send<C>(
        &mut self,
        comm: &C,
        peer: usize,
        tag: CommTag,
        row: &[f64],
    ) -> Result<(), RelaxError>
    where
        C: Communicator<SendHandle = H>,
    {
        let mut buf = self.acquire()?;
        buf.clear();
        buf.extend_from_slice(row);
        *self = SendSlot::InFlight(comm.isend(peer, tag, buf)?);
        Ok(())
    }

    /// Wait for the outstanding send, if any.
    pub fn drain(&mut self) -> Result<(), RelaxError> {
        let buf = self.acquire()?;
        *self = SendSlot::Idle(buf);
        Ok(())
    }
}
