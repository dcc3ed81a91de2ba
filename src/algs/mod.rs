//! Re-export public algorithms.

pub mod communicator;
pub mod convergence;
pub mod distribute;
pub mod gather;
pub mod halo;
pub mod partition;
pub mod relax;

pub use distribute::distribute;
pub use gather::gather;
pub use relax::{RelaxKernel, in_precision};
