//! Collective transport trait.
//!
//! The pipeline and the aggregation engine are written against this trait
//! so they do not depend on a concrete message-passing layer. A fixed-size
//! group of ranks runs the identical program; the only suspension points
//! are the collective calls below, and every rank must invoke the same
//! collectives in the same order.

/// Marker bound for values that can travel through a collective.
pub trait CommPayload: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> CommPayload for T {}

/// Synchronous collective operations over a fixed-size rank group.
///
/// Generic methods keep the trait monomorphic per call site; transports are
/// passed by generic parameter, not as trait objects.
pub trait Communicator {
    /// This rank's index in `[0, size)`.
    fn rank(&self) -> usize;

    /// Number of ranks in the group (fixed for the whole run).
    fn size(&self) -> usize;

    /// Block until every rank has reached the same barrier call.
    fn barrier(&self);

    /// Distribute `root`'s value to all ranks. Only `root` supplies
    /// `Some(value)`; every rank returns the root's value.
    fn broadcast<T: CommPayload>(&self, root: usize, value: Option<T>) -> T;

    /// Collect every rank's vector on `root`, in rank order. Non-root ranks
    /// return `None`.
    fn gather<T: CommPayload>(&self, root: usize, local: Vec<T>) -> Option<Vec<Vec<T>>>;

    /// Collect every rank's vector on all ranks, in rank order.
    fn all_gather<T: CommPayload>(&self, local: Vec<T>) -> Vec<Vec<T>>;

    /// Exchange: `sends[t]` goes to rank `t`; the result holds one vector
    /// per source rank, in rank order.
    fn all_to_all<T: CommPayload>(&self, sends: Vec<Vec<T>>) -> Vec<Vec<T>>;

    /// Global sum of a per-rank counter.
    fn all_reduce_u64(&self, value: u64) -> u64;

    /// Global sum of a per-rank scalar.
    fn all_reduce_f64(&self, value: f64) -> f64;
}
