//! # sk-dist
//!
//! Collective transports and the distributed pixel-aggregation engine.
//!
//! `local` provides the two `Communicator` implementations shipped with
//! SkyKappa: a trivial single-rank transport and an in-process thread
//! group. `sort`/`merge` are the reusable distributed-array primitives
//! (global key sort with even repartition, boundary-aware reduction of
//! equal keys), and `aggregate` composes them into the one pass the
//! pipeline needs: worker-local (pixel, weight) pairs in, exact owned map
//! slices out.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Distributed keyed aggregation.
pub mod aggregate;
/// In-process collective transports.
pub mod local;
/// Boundary-aware reduction of sorted equal keys.
pub mod merge;
/// Distributed sort-by-key and linear repartition.
pub mod sort;

pub use aggregate::aggregate;
pub use local::{run_group, LocalComm, SelfComm};
pub use merge::merge_sorted_runs;
pub use sort::{rebalance, sort_by_key};
