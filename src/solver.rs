//! Worker driver: distribute, relax until the stop rule holds, gather.
//!
//! [`run_worker`] is what every rank executes, whatever the transport.
//! [`run_local`] starts one thread per worker on a [`LocalFabric`].

use crate::algs::communicator::{Communicator, LocalFabric};
use crate::algs::convergence::ConvergenceTracker;
use crate::algs::distribute::{COORDINATOR, distribute};
use crate::algs::gather::gather;
use crate::algs::halo::HaloExchange;
use crate::algs::partition::RowTable;
use crate::algs::relax::RelaxKernel;
use crate::config::RelaxConfig;
use crate::data::grid::Grid;
use crate::data::local_partition::LocalPartition;
use crate::relax_error::RelaxError;
use log::{debug, error, info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// How one worker's run ended.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerReport {
    pub rank: usize,
    /// Relaxation sweeps this worker performed.
    pub sweeps: usize,
    /// Verdict of the worker's last sweep.
    pub locally_converged: bool,
    /// The assembled grid; only on the coordinator.
    pub grid: Option<Grid>,
}

/// Result of an in-process run.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub grid: Grid,
    /// Sweeps per rank.
    pub sweeps: Vec<usize>,
}

/// Run one worker from distribution to assembly.
///
/// `grid` is required on [`COORDINATOR`] and ignored elsewhere.
///
/// # Errors
/// Configuration errors are returned by every rank before any grid row is
/// sent; only the coordinator logs them. A bad initial grid fails the peers
/// with [`RelaxError::RejectedByCoordinator`]. Communication errors are fatal.
pub fn run_worker<C>(
    comm: &C,
    config: &RelaxConfig,
    grid: Option<Grid>,
) -> Result<WorkerReport, RelaxError>
where
    C: Communicator,
{
    let rank = comm.rank();
    let table = config
        .validate()
        .and_then(|_| RowTable::for_grid(config.dimension, comm.size()));
    let table = match table {
        Ok(table) => table,
        Err(e) => {
            if rank == COORDINATOR {
                error!("{e}");
            }
            return Err(e);
        }
    };

    if config.verbose && rank == COORDINATOR {
        if let Some(g) = &grid {
            debug!("initial grid ({}x{}):\n{g}", g.dimension(), g.dimension());
        }
    }

    let mut part = match distribute(comm, grid.as_ref(), &table, config.dimension) {
        Ok(part) => part,
        Err(e) => {
            if rank == COORDINATOR && e.is_configuration() {
                error!("{e}");
            }
            return Err(e);
        }
    };
    if config.verbose {
        debug!("rank {rank} after distribution:\n{part}");
    }

    let tracker = relax_partition(comm, &mut part, config)?;
    if config.verbose {
        debug!("rank {rank} after relaxation:\n{part}");
    }
    info!(
        "rank {rank}: stopped after {} sweeps (locally converged: {})",
        tracker.sweeps(),
        tracker.locally_converged()
    );

    let grid = gather(comm, &part, &table, config.dimension)?;
    Ok(WorkerReport {
        rank,
        sweeps: tracker.sweeps(),
        locally_converged: tracker.locally_converged(),
        grid,
    })
}

/// The steady-state loop: exchange halos, sweep, decide, until this worker
/// may stop.
pub fn relax_partition<C>(
    comm: &C,
    part: &mut LocalPartition,
    config: &RelaxConfig,
) -> Result<ConvergenceTracker, RelaxError>
where
    C: Communicator,
{
    let mut halo = HaloExchange::new(comm.rank(), comm.size(), part.stride());
    let mut kernel = RelaxKernel::new(config.precision);
    let mut tracker = ConvergenceTracker::new(config.stop);

    loop {
        let finishing = tracker.wants_to_finish();
        let outcome = halo.exchange(comm, part, finishing)?;
        if tracker.may_stop(halo.final_sent_to_all()) {
            break;
        }
        let converged = kernel.sweep(part);
        tracker.record_sweep(converged);
        debug!(
            "rank {}: sweep {} converged={} ({} halo rows in)",
            comm.rank(),
            tracker.sweeps(),
            converged,
            outcome.received
        );
    }
    halo.finish()?;
    Ok(tracker)
}

/// Relax `grid` with `workers` in-process workers.
pub fn run_local(
    grid: Grid,
    config: &RelaxConfig,
    workers: usize,
) -> Result<Solution, RelaxError> {
    let fabric = LocalFabric::new(workers);
    run_with_fabric(&fabric, grid, config)
}

/// As [`run_local`], on a caller-provided fabric whose traffic can be
/// inspected afterwards.
pub fn run_with_fabric(
    fabric: &Arc<LocalFabric>,
    grid: Grid,
    config: &RelaxConfig,
) -> Result<Solution, RelaxError> {
    let workers = fabric.size();
    if workers == 0 {
        error!("{}", RelaxError::NoWorkers);
        return Err(RelaxError::NoWorkers);
    }
    let mut initial = Some(grid);

    let results: Vec<Result<WorkerReport, RelaxError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|rank| {
                let comm = fabric.comm(rank);
                let grid = if rank == COORDINATOR {
                    initial.take()
                } else {
                    None
                };
                s.spawn(move || {
                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| run_worker(&comm, config, grid)));
                    let result = outcome.unwrap_or(Err(RelaxError::WorkerPanicked(rank)));
                    if result.is_err() {
                        comm.fabric().abort();
                    }
                    result
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| h.join().unwrap_or(Err(RelaxError::WorkerPanicked(rank))))
            .collect()
    });

    let mut sweeps = Vec::with_capacity(workers);
    let mut assembled = None;
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(report) => {
                sweeps.push(report.sweeps);
                if report.grid.is_some() {
                    assembled = report.grid;
                }
            }
            Err(e) => errors.push(e),
        }
    }
    // peers of a failed worker only report the abort; surface the cause
    if let Some(e) = errors
        .iter()
        .find(|e| !matches!(e, RelaxError::Comm { .. }))
        .or(errors.first())
    {
        return Err(e.clone());
    }
    let grid = assembled.ok_or(RelaxError::MissingGrid)?;
    Ok(Solution { grid, sweeps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::algs::convergence::StopRule;

    #[test]
    fn uniform_grid_converges_in_one_sweep() {
        let config = RelaxConfig::new(6, 0.5);
        let report = run_worker(&NoComm, &config, Some(Grid::filled(6, 3.25))).unwrap();
        assert_eq!(report.sweeps, 1);
        assert!(report.locally_converged);
        assert_eq!(report.grid, Some(Grid::filled(6, 3.25)));
    }

    #[test]
    fn zero_fixed_sweeps_returns_input() {
        let grid = Grid::random(8, 3);
        let config = RelaxConfig::new(8, 0.01).with_stop(StopRule::FixedSweeps(0));
        let solution = run_local(grid.clone(), &config, 3).unwrap();
        assert_eq!(solution.grid, grid);
        assert_eq!(solution.sweeps, vec![0, 0, 0]);
    }

    #[test]
    fn small_grid_is_rejected_before_distribution() {
        let config = RelaxConfig::new(2, 0.01);
        let err = run_worker(&NoComm, &config, None).unwrap_err();
        assert_eq!(err, RelaxError::GridTooSmall { dimension: 2 });
    }
}
