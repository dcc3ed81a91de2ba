#![cfg_attr(docsrs, feature(doc_cfg))]
//! # halo-relax
//!
//! halo-relax relaxes an N×N grid by repeated four-point averaging (Jacobi
//! sweeps) across a set of workers that each own a contiguous block of rows.
//! Workers only ever hold their own rows plus one halo row borrowed from each
//! neighbour; rows move between workers by explicit messages.
//!
//! ## Pipeline
//! 1. [`algs::partition`] splits the interior rows into near-equal blocks.
//! 2. [`algs::distribute`] scatters the coordinator's grid; the fixed top and
//!    bottom rows go to the first and last worker only.
//! 3. Each worker loops over [`algs::halo`] exchange, an [`algs::relax`] sweep
//!    and an [`algs::convergence`] decision until it may stop.
//! 4. [`algs::gather`] reassembles the grid on the coordinator.
//!
//! ## Termination
//! Workers stop independently. A worker that converged sends its boundary
//! rows one last time tagged final and exits; its neighbours keep its last
//! rows frozen in their halo slots and carry on until they converge too.
//! There is no global agreement step, so the assembled grid is converged per
//! worker but not necessarily a joint fixed point.
//!
//! ## Transports
//! - [`NoComm`](algs::communicator::NoComm): a single worker
//! - [`LocalComm`](algs::communicator::LocalComm): one thread per worker
//! - `MpiComm`: one MPI rank per worker (feature `mpi-support`)
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! halo-relax = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```

pub mod algs;
pub mod config;
pub mod data;
pub mod relax_error;
pub mod solver;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{
        CommTag, Communicator, LocalComm, LocalFabric, NoComm, Wait,
    };
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::convergence::StopRule;
    pub use crate::algs::partition::{RowRange, RowTable, row_table};
    pub use crate::config::RelaxConfig;
    pub use crate::data::grid::Grid;
    pub use crate::data::local_partition::{LocalPartition, Side};
    pub use crate::relax_error::RelaxError;
    pub use crate::solver::{Solution, WorkerReport, run_local, run_worker};
}
