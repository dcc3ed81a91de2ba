//! Scatter the coordinator's grid into per-worker partitions.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::partition::RowTable;
use crate::data::grid::Grid;
use crate::data::local_partition::LocalPartition;
use crate::relax_error::RelaxError;

/// Rank that owns the full grid before distribution and after assembly.
pub const COORDINATOR: usize = 0;

const GO: f64 = 1.0;
const NO_GO: f64 = 0.0;

fn check_grid(grid: Option<&Grid>, dimension: usize) -> Result<&Grid, RelaxError> {
    let grid = grid.ok_or(RelaxError::MissingGrid)?;
    if grid.dimension() != dimension {
        return Err(RelaxError::ShapeMismatch {
            expected: dimension * dimension,
            found: grid.as_slice().len(),
        });
    }
    Ok(grid)
}

/// Hand every worker exactly its rows of `grid`.
///
/// # Arguments
/// - `grid`: the full grid; required on [`COORDINATOR`], ignored elsewhere
/// - `table`: the row table every rank computed from the same inputs
/// - `dimension`: grid side length, also the row stride
///
/// The coordinator first tells every peer whether its grid is usable, so a
/// missing or misshapen grid fails every rank instead of leaving the peers
/// waiting for rows.
///
/// Worker `i` receives grid rows `offset_i + 1 ..= offset_i + count_i`.
/// The fixed top row stays with worker 0; the fixed bottom row goes to the
/// last worker in a separate message.
pub fn distribute<C>(
    comm: &C,
    grid: Option<&Grid>,
    table: &RowTable,
    dimension: usize,
) -> Result<LocalPartition, RelaxError>
where
    C: Communicator,
{
    let rank = comm.rank();
    let size = comm.size();
    if table.len() != size {
        return Err(RelaxError::ShapeMismatch {
            expected: table.len(),
            found: size,
        });
    }
    let range = table.get(rank).ok_or_else(|| RelaxError::TooManyWorkers {
        workers: size,
        rows: table.total_rows(),
    })?;
    let last = table.last_rank();

    if rank == COORDINATOR {
        let checked = check_grid(grid, dimension);
        let status = if checked.is_ok() { GO } else { NO_GO };
        for peer in 1..size {
            comm.send(peer, CommTag::STATUS, &[status])?;
        }
        let grid = checked?;
        for (peer, peer_range) in table.iter().enumerate().skip(1) {
            let block = grid.rows_block(peer_range.first_grid_row(), peer_range.count);
            comm.send(peer, CommTag::SCATTER, block)?;
        }
        let bottom = grid.row(dimension - 1);
        if last != COORDINATOR {
            comm.send(last, CommTag::EDGE_ROW, bottom)?;
        }
        let owned = grid.rows_block(range.first_grid_row(), range.count);
        return LocalPartition::new(
            rank,
            range,
            dimension,
            owned,
            Some(grid.row(0)),
            (last == COORDINATOR).then_some(bottom),
        );
    }

    let mut status = [NO_GO];
    comm.recv_tagged(COORDINATOR, CommTag::STATUS, &mut status)?;
    if status[0] != GO {
        return Err(RelaxError::RejectedByCoordinator);
    }

    let mut owned = vec![0.0; range.count * dimension];
    comm.recv_tagged(COORDINATOR, CommTag::SCATTER, &mut owned)?;
    let bottom = if rank == last {
        let mut row = vec![0.0; dimension];
        comm.recv_tagged(COORDINATOR, CommTag::EDGE_ROW, &mut row)?;
        Some(row)
    } else {
        None
    };
    LocalPartition::new(rank, range, dimension, &owned, None, bottom.as_deref())
}
