//! Thin façade over in-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are rows of `f64` plus a [`CommTag`]. Delivery is FIFO per
//! directed pair of ranks. `isend` hands the buffer to the transport and
//! returns a waitable handle; waiting on the handle gives the buffer back once
//! the transport no longer needs it.

use crate::relax_error::RelaxError;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use static_assertions::assert_impl_all;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Tag attached to every point-to-point message.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    /// Halo row; more updates from the sender will follow.
    pub const MORE: CommTag = CommTag(0);
    /// Halo row; the sender has converged and will not send again.
    pub const FINAL: CommTag = CommTag(1);
    /// Owned rows scattered from the coordinator.
    pub const SCATTER: CommTag = CommTag(0x10);
    /// Fixed bottom grid row sent to the last worker.
    pub const EDGE_ROW: CommTag = CommTag(0x11);
    /// Final owned rows gathered at the coordinator.
    pub const GATHER: CommTag = CommTag(0x12);
    /// Coordinator's go/no-go before distribution.
    pub const STATUS: CommTag = CommTag(0x13);

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub fn is_halo(self) -> bool {
        self == Self::MORE || self == Self::FINAL
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Block until the send completed and return its buffer.
    fn wait(self) -> Result<Vec<f64>, RelaxError>;
}

/// Point-to-point communication interface (minimal by design).
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Non-blocking send; the buffer is owned by the transport until the
    /// handle is waited on.
    fn isend(&self, peer: usize, tag: CommTag, buf: Vec<f64>)
    -> Result<Self::SendHandle, RelaxError>;

    /// Blocking send of a copy of `buf`.
    fn send(&self, peer: usize, tag: CommTag, buf: &[f64]) -> Result<(), RelaxError>;

    /// Block until a message from `peer` is available and return its tag
    /// without consuming it.
    fn probe(&self, peer: usize) -> Result<CommTag, RelaxError>;

    /// Receive the next message from `peer` into `buf`, whose length must
    /// match the payload exactly.
    fn recv_into(&self, peer: usize, buf: &mut [f64]) -> Result<CommTag, RelaxError>;

    /// Receive the next message from `peer`, failing if it does not carry
    /// `tag`.
    fn recv_tagged(&self, peer: usize, tag: CommTag, buf: &mut [f64]) -> Result<(), RelaxError> {
        let found = self.probe(peer)?;
        if found != tag {
            return Err(RelaxError::UnexpectedTag {
                neighbor: peer,
                expected: tag.as_u16(),
                found: found.as_u16(),
            });
        }
        self.recv_into(peer, buf)?;
        Ok(())
    }
}

/// A send that completed immediately.
#[derive(Debug)]
pub struct Ready(pub Vec<f64>);

impl Wait for Ready {
    fn wait(self) -> Result<Vec<f64>, RelaxError> {
        Ok(self.0)
    }
}

/// Single-worker comm: there is nobody to talk to.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = Ready;

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, peer: usize, _tag: CommTag, _buf: Vec<f64>) -> Result<Ready, RelaxError> {
        Err(RelaxError::comm(peer, "NoComm has no peers"))
    }
    fn send(&self, peer: usize, _tag: CommTag, _buf: &[f64]) -> Result<(), RelaxError> {
        Err(RelaxError::comm(peer, "NoComm has no peers"))
    }
    fn probe(&self, peer: usize) -> Result<CommTag, RelaxError> {
        Err(RelaxError::comm(peer, "NoComm has no peers"))
    }
    fn recv_into(&self, peer: usize, _buf: &mut [f64]) -> Result<CommTag, RelaxError> {
        Err(RelaxError::comm(peer, "NoComm has no peers"))
    }
}

// --- LocalComm: intra-process / one thread per worker ---

/// How often blocked calls re-check whether the fabric was aborted.
const ABORT_POLL: Duration = Duration::from_millis(20);

/// Completion cell shared by a sender's handle and the queued message.
#[derive(Default)]
struct Receipt {
    returned: Mutex<Option<Vec<f64>>>,
    done: Condvar,
}

struct Envelope {
    tag: CommTag,
    payload: Vec<f64>,
    receipt: Option<Arc<Receipt>>,
}

#[derive(Default)]
struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    ready: Condvar,
    history: Mutex<Vec<CommTag>>,
}

/// Shared message fabric for a set of in-process workers.
///
/// One FIFO mailbox exists per directed pair `(src, dst)`, created on first
/// use.
pub struct LocalFabric {
    size: usize,
    links: DashMap<(usize, usize), Arc<Mailbox>>,
    aborted: AtomicBool,
}

impl LocalFabric {
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            size,
            links: DashMap::new(),
            aborted: AtomicBool::new(false),
        })
    }

    /// Endpoint for worker `rank`.
    pub fn comm(self: &Arc<Self>, rank: usize) -> LocalComm {
        LocalComm {
            rank,
            fabric: Arc::clone(self),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Make every blocked and future call fail instead of waiting forever.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        for link in self.links.iter() {
            link.value().ready.notify_all();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Messages sent from `src` to `dst` that were never received.
    pub fn pending(&self, src: usize, dst: usize) -> usize {
        self.links
            .get(&(src, dst))
            .map(|m| m.queue.lock().len())
            .unwrap_or(0)
    }

    /// Tags of every message ever sent from `src` to `dst`, in send order.
    pub fn traffic(&self, src: usize, dst: usize) -> Vec<CommTag> {
        self.links
            .get(&(src, dst))
            .map(|m| m.history.lock().clone())
            .unwrap_or_default()
    }

    fn mailbox(&self, src: usize, dst: usize) -> Arc<Mailbox> {
        Arc::clone(self.links.entry((src, dst)).or_default().value())
    }

    fn post(&self, src: usize, dst: usize, envelope: Envelope) -> Result<(), RelaxError> {
        if dst >= self.size {
            return Err(RelaxError::comm(dst, format!("no such rank (world size {})", self.size)));
        }
        if self.is_aborted() {
            return Err(RelaxError::comm(dst, "fabric aborted"));
        }
        let mailbox = self.mailbox(src, dst);
        mailbox.history.lock().push(envelope.tag);
        mailbox.queue.lock().push_back(envelope);
        mailbox.ready.notify_all();
        Ok(())
    }
}

/// One worker's endpoint on a [`LocalFabric`].
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    fabric: Arc<LocalFabric>,
}

assert_impl_all!(LocalComm: Send, Sync);

impl LocalComm {
    pub fn fabric(&self) -> &Arc<LocalFabric> {
        &self.fabric
    }

    /// Wait until the `peer → self` mailbox is non-empty, then run `f` on it
    /// with the lock held.
    fn with_front<T>(
        &self,
        peer: usize,
        f: impl FnOnce(&mut VecDeque<Envelope>) -> Result<T, RelaxError>,
    ) -> Result<T, RelaxError> {
        let mailbox = self.fabric.mailbox(peer, self.rank);
        let mut queue = mailbox.queue.lock();
        while queue.is_empty() {
            if self.fabric.is_aborted() {
                return Err(RelaxError::comm(peer, "fabric aborted"));
            }
            mailbox.ready.wait_for(&mut queue, ABORT_POLL);
        }
        f(&mut *queue)
    }
}

/// Completes once the receiver has copied the payload out.
pub struct LocalSendHandle {
    peer: usize,
    receipt: Arc<Receipt>,
    fabric: Arc<LocalFabric>,
}

impl Wait for LocalSendHandle {
    fn wait(self) -> Result<Vec<f64>, RelaxError> {
        let mut returned = self.receipt.returned.lock();
        loop {
            if let Some(buf) = returned.take() {
                return Ok(buf);
            }
            if self.fabric.is_aborted() {
                return Err(RelaxError::comm(self.peer, "fabric aborted"));
            }
            self.receipt.done.wait_for(&mut returned, ABORT_POLL);
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = LocalSendHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.fabric.size
    }

    fn isend(
        &self,
        peer: usize,
        tag: CommTag,
        buf: Vec<f64>,
    ) -> Result<LocalSendHandle, RelaxError> {
        let receipt = Arc::new(Receipt::default());
        self.fabric.post(
            self.rank,
            peer,
            Envelope {
                tag,
                payload: buf,
                receipt: Some(Arc::clone(&receipt)),
            },
        )?;
        Ok(LocalSendHandle {
            peer,
            receipt,
            fabric: Arc::clone(&self.fabric),
        })
    }

    fn send(&self, peer: usize, tag: CommTag, buf: &[f64]) -> Result<(), RelaxError> {
        self.fabric.post(
            self.rank,
            peer,
            Envelope {
                tag,
                payload: buf.to_vec(),
                receipt: None,
            },
        )
    }

    fn probe(&self, peer: usize) -> Result<CommTag, RelaxError> {
        self.with_front(peer, |queue| match queue.front() {
            Some(envelope) => Ok(envelope.tag),
            None => Err(RelaxError::comm(peer, "mailbox drained while probing")),
        })
    }

    fn recv_into(&self, peer: usize, buf: &mut [f64]) -> Result<CommTag, RelaxError> {
        let envelope = self.with_front(peer, |queue| {
            queue
                .pop_front()
                .ok_or_else(|| RelaxError::comm(peer, "mailbox drained while receiving"))
        })?;
        if envelope.payload.len() != buf.len() {
            return Err(RelaxError::PayloadLength {
                neighbor: peer,
                expected: buf.len(),
                found: envelope.payload.len(),
            });
        }
        buf.copy_from_slice(&envelope.payload);
        if let Some(receipt) = envelope.receipt {
            *receipt.returned.lock() = Some(envelope.payload);
            receipt.done.notify_all();
        }
        Ok(envelope.tag)
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// Communicator over `MPI_COMM_WORLD`. Dropping it finalizes MPI.
    pub struct MpiComm {
        pub world: SimpleCommunicator,
        pub rank: usize,
        size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, RelaxError> {
            let universe = mpi::initialize()
                .ok_or_else(|| RelaxError::comm(0, "MPI was already initialized"))?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }

        fn tag_of(peer: usize, raw: mpi::Tag) -> Result<CommTag, RelaxError> {
            u16::try_from(raw)
                .map(CommTag)
                .map_err(|_| RelaxError::comm(peer, format!("tag {raw} out of range")))
        }
    }

    /// Owns the send buffer until MPI reports completion.
    ///
    /// Dropping a handle that was never waited on still waits for the send,
    /// so an early error return cannot free the buffer under MPI.
    pub struct MpiSendHandle {
        peer: usize,
        request: Option<Request<'static, [f64], StaticScope>>,
        buf: Option<*mut [f64]>,
    }

    impl MpiSendHandle {
        fn complete(&mut self) -> Option<Vec<f64>> {
            if let Some(request) = self.request.take() {
                request.wait();
            }
            // SAFETY: `buf` came from `Box::into_raw` in `isend`, and the only
            // other view of it belonged to the request that just completed.
            self.buf
                .take()
                .map(|buf| unsafe { Box::from_raw(buf) }.into_vec())
        }
    }

    impl Wait for MpiSendHandle {
        fn wait(mut self) -> Result<Vec<f64>, RelaxError> {
            let peer = self.peer;
            self.complete().ok_or_else(|| RelaxError::comm(peer, "send buffer reclaimed"))
        }
    }

    impl Drop for MpiSendHandle {
        fn drop(&mut self) {
            self.complete();
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(
            &self,
            peer: usize,
            tag: CommTag,
            buf: Vec<f64>,
        ) -> Result<MpiSendHandle, RelaxError> {
            let buf = Box::into_raw(buf.into_boxed_slice());
            // SAFETY: the allocation is reclaimed only by the handle, after the
            // request reading it has completed.
            let view: &'static [f64] = unsafe { &*buf };
            let request = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, view, tag.as_u16() as mpi::Tag);
            Ok(MpiSendHandle {
                peer,
                request: Some(request),
                buf: Some(buf),
            })
        }

        fn send(&self, peer: usize, tag: CommTag, buf: &[f64]) -> Result<(), RelaxError> {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, tag.as_u16() as mpi::Tag);
            Ok(())
        }

        fn probe(&self, peer: usize) -> Result<CommTag, RelaxError> {
            let status = self.world.process_at_rank(peer as i32).probe();
            Self::tag_of(peer, status.tag())
        }

        fn recv_into(&self, peer: usize, buf: &mut [f64]) -> Result<CommTag, RelaxError> {
            let process = self.world.process_at_rank(peer as i32);
            let status = process.probe();
            let found = status.count(f64::equivalent_datatype()) as usize;
            if found != buf.len() {
                return Err(RelaxError::PayloadLength {
                    neighbor: peer,
                    expected: buf.len(),
                    found,
                });
            }
            let status = process.receive_into_with_tag(buf, status.tag());
            Self::tag_of(peer, status.tag())
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiSendHandle};
