//! Reassemble the full grid on the coordinator.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::distribute::COORDINATOR;
use crate::algs::partition::RowTable;
use crate::data::grid::Grid;
use crate::data::local_partition::{LocalPartition, Side};
use crate::relax_error::RelaxError;

/// Collect every worker's owned rows into one grid.
///
/// Returns `Some(grid)` on [`COORDINATOR`] and `None` elsewhere. The last
/// worker appends the fixed bottom row to its payload, so the coordinator
/// does not have to keep a copy of it across the run.
pub fn gather<C>(
    comm: &C,
    part: &LocalPartition,
    table: &RowTable,
    dimension: usize,
) -> Result<Option<Grid>, RelaxError>
where
    C: Communicator,
{
    let rank = comm.rank();
    let last = table.last_rank();

    if rank != COORDINATOR {
        let mut payload = part.owned().to_vec();
        if rank == last {
            let bottom = part
                .edge_row(Side::Down)
                .ok_or_else(|| RelaxError::comm(rank, "last worker lost the bottom edge row"))?;
            payload.extend_from_slice(bottom);
        }
        comm.send(COORDINATOR, CommTag::GATHER, &payload)?;
        return Ok(None);
    }

    let mut grid = Grid::filled(dimension, 0.0);
    let top = part
        .edge_row(Side::Up)
        .ok_or_else(|| RelaxError::comm(rank, "coordinator lost the top edge row"))?;
    grid.row_mut(0).copy_from_slice(top);

    let own = part.range();
    grid.rows_block_mut(own.first_grid_row(), own.count)
        .copy_from_slice(part.owned());

    for (peer, range) in table.iter().enumerate().skip(1) {
        let rows = if peer == last { range.count + 1 } else { range.count };
        let block = grid.rows_block_mut(range.first_grid_row(), rows);
        comm.recv_tagged(peer, CommTag::GATHER, block)?;
    }

    if last == COORDINATOR {
        let bottom = part
            .edge_row(Side::Down)
            .ok_or_else(|| RelaxError::comm(rank, "coordinator lost the bottom edge row"))?;
        grid.row_mut(dimension - 1).copy_from_slice(bottom);
    }
    Ok(Some(grid))
}
