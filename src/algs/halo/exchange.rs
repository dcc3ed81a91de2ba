//! One exchange round with the ranks above and below.

use super::latch::NeighborState;
use super::send_slot::SendSlot;
use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::data::local_partition::{LocalPartition, Side};
use crate::relax_error::RelaxError;

struct HaloLink<H> {
    side: Side,
    peer: usize,
    state: NeighborState,
    slot: SendSlot<H>,
    sent_final: bool,
}

/// What one call to [`HaloExchange::exchange`] did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub sent: usize,
    pub received: usize,
    /// Neighbours whose latch was set during this round.
    pub newly_finished: usize,
}

/// Exchange state for the (at most two) neighbours of one worker.
pub struct HaloExchange<H> {
    links: Vec<HaloLink<H>>,
}

impl<H: Wait> HaloExchange<H> {
    pub fn new(rank: usize, size: usize, stride: usize) -> Self {
        let links = Side::BOTH
            .into_iter()
            .filter_map(|side| {
                side.neighbor(rank, size).map(|peer| HaloLink {
                    side,
                    peer,
                    state: NeighborState::Exchanging,
                    slot: SendSlot::new(stride),
                    sent_final: false,
                })
            })
            .collect();
        Self { links }
    }

    /// Latch state of the neighbour on `side`, or `None` at a world edge.
    pub fn state(&self, side: Side) -> Option<NeighborState> {
        self.links.iter().find(|l| l.side == side).map(|l| l.state)
    }

    pub fn neighbors(&self) -> usize {
        self.links.len()
    }

    /// Every neighbour either got our final row or has finished itself.
    pub fn final_sent_to_all(&self) -> bool {
        self.links
            .iter()
            .all(|l| l.sent_final || l.state.is_finished())
    }

    /// Send boundary rows, then receive halo rows from neighbours that are
    /// still exchanging. With `finishing` set the rows go out tagged
    /// [`CommTag::FINAL`] and nothing more is sent to that neighbour.
    ///
    /// Nothing is sent to a neighbour whose latch is set: it has stopped
    /// receiving.
    pub fn exchange<C>(
        &mut self,
        comm: &C,
        part: &mut LocalPartition,
        finishing: bool,
    ) -> Result<ExchangeOutcome, RelaxError>
    where
        C: Communicator<SendHandle = H>,
    {
        let tag = if finishing {
            CommTag::FINAL
        } else {
            CommTag::MORE
        };
        let mut outcome = ExchangeOutcome::default();

        for link in &mut self.links {
            if link.sent_final || link.state.is_finished() {
                continue;
            }
            link.slot.send(comm, link.peer, tag, part.boundary_row(link.side))?;
            link.sent_final = finishing;
            outcome.sent += 1;
        }

        for link in &mut self.links {
            if link.state.is_finished() {
                continue;
            }
            let found = comm.probe(link.peer)?;
            if !found.is_halo() {
                return Err(RelaxError::UnexpectedTag {
                    neighbor: link.peer,
                    expected: tag.as_u16(),
                    found: found.as_u16(),
                });
            }
            let halo = part.halo_row_mut(link.side).ok_or_else(|| {
                RelaxError::comm(link.peer, "halo slot facing a neighbour is a fixed edge")
            })?;
            comm.recv_into(link.peer, halo)?;
            outcome.received += 1;
            if link.state.observe(found) {
                log::debug!(
                    "rank {}: neighbour {} finished, freezing {:?} halo",
                    comm.rank(),
                    link.peer,
                    link.side
                );
                outcome.newly_finished += 1;
            }
        }

        Ok(outcome)
    }

    /// Wait for every outstanding send. Must run before the worker exits.
    pub fn finish(&mut self) -> Result<(), RelaxError> {
        for link in &mut self.links {
            link.slot.drain()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, LocalFabric, NoComm, Ready};
    use crate::algs::partition::RowRange;
    use std::thread;

    fn part(rank: usize, size: usize, fill: f64) -> LocalPartition {
        let stride = 3;
        let range = RowRange {
            count: 2,
            offset: 2 * rank,
        };
        let top = [100.0; 3];
        let bottom = [200.0; 3];
        LocalPartition::new(
            rank,
            range,
            stride,
            &[fill; 6],
            (rank == 0).then_some(&top[..]),
            (rank + 1 == size).then_some(&bottom[..]),
        )
        .unwrap()
    }

    #[test]
    fn single_worker_has_no_links() {
        let mut halo: HaloExchange<Ready> = HaloExchange::new(0, 1, 3);
        let mut p = part(0, 1, 1.0);
        let out = halo.exchange(&NoComm, &mut p, true).unwrap();
        assert_eq!(out, ExchangeOutcome::default());
        assert!(halo.final_sent_to_all());
        assert_eq!(halo.state(Side::Up), None);
    }

    #[test]
    fn rows_cross_and_latch_on_final() {
        let fabric = LocalFabric::new(2);
        let run = |comm: LocalComm, finish_after: usize| {
            thread::spawn(move || {
                let rank = comm.rank();
                let mut p = part(rank, 2, rank as f64 + 1.0);
                let mut halo = HaloExchange::new(rank, 2, 3);
                let mut rounds = 0;
                loop {
                    let finishing = rounds == finish_after;
                    halo.exchange(&comm, &mut p, finishing).unwrap();
                    rounds += 1;
                    if halo.final_sent_to_all() {
                        break;
                    }
                }
                halo.finish().unwrap();
                (rounds, p, halo.state(Side::Up), halo.state(Side::Down))
            })
        };
        // rank 0 finishes on its second exchange, rank 1 would go on to a fifth
        let h0 = run(fabric.comm(0), 1);
        let h1 = run(fabric.comm(1), 4);
        let (r0, p0, _, down0) = h0.join().unwrap();
        let (r1, p1, up1, _) = h1.join().unwrap();

        assert_eq!(r0, 2);
        // rank 1 stops once rank 0 has finished: nobody is left to talk to
        assert_eq!(r1, 2);
        assert_eq!(up1, Some(NeighborState::NeighborFinished));
        assert_eq!(down0, Some(NeighborState::Exchanging));
        assert_eq!(p0.row(3), &[2.0; 3]);
        assert_eq!(p1.row(0), &[1.0; 3]);
        assert_eq!(fabric.traffic(0, 1), vec![CommTag::MORE, CommTag::FINAL]);
        assert_eq!(fabric.traffic(1, 0), vec![CommTag::MORE, CommTag::MORE]);
        assert_eq!(fabric.pending(0, 1) + fabric.pending(1, 0), 0);
    }
}
