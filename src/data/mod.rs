//! Grid storage on the coordinator and per-worker partitions.

pub mod grid;
pub mod local_partition;
