//! In-process collective transports.
//!
//! `SelfComm` is the degenerate single-rank group. `LocalComm` runs a
//! fixed-size group of ranks as scoped threads in one process: each
//! collective deposits a payload into a per-rank slot behind a mutex, a
//! shared barrier fences the deposit and collect phases, and a second
//! barrier releases the slots for reuse. Ranks must issue the same
//! collectives in the same order; a rank that errors out of the sequence
//! leaves the group unusable, which is the intended whole-group failure
//! mode for a batch run.

use std::any::Any;
use std::sync::{Arc, Barrier, Mutex};

use sk_core::comm::{CommPayload, Communicator};
use sk_core::{Error, Result};

/// Single-rank communicator: every collective is an identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn broadcast<T: CommPayload>(&self, _root: usize, value: Option<T>) -> T {
        value.expect("broadcast root must supply a value")
    }

    fn gather<T: CommPayload>(&self, _root: usize, local: Vec<T>) -> Option<Vec<Vec<T>>> {
        Some(vec![local])
    }

    fn all_gather<T: CommPayload>(&self, local: Vec<T>) -> Vec<Vec<T>> {
        vec![local]
    }

    fn all_to_all<T: CommPayload>(&self, sends: Vec<Vec<T>>) -> Vec<Vec<T>> {
        debug_assert_eq!(sends.len(), 1);
        sends
    }

    fn all_reduce_u64(&self, value: u64) -> u64 {
        value
    }

    fn all_reduce_f64(&self, value: f64) -> f64 {
        value
    }
}

struct GroupShared {
    size: usize,
    barrier: Barrier,
    slots: Mutex<Vec<Option<Box<dyn Any + Send>>>>,
}

/// One rank's handle into an in-process SPMD group.
pub struct LocalComm {
    rank: usize,
    shared: Arc<GroupShared>,
}

impl LocalComm {
    /// Create all rank handles of a `size`-rank group.
    pub fn group(size: usize) -> Vec<LocalComm> {
        let shared = Arc::new(GroupShared {
            size,
            barrier: Barrier::new(size),
            slots: Mutex::new((0..size).map(|_| None).collect()),
        });
        (0..size).map(|rank| LocalComm { rank, shared: Arc::clone(&shared) }).collect()
    }

    fn deposit<T: CommPayload>(&self, payload: T) {
        let mut slots = self.shared.slots.lock().expect("communicator lock poisoned");
        slots[self.rank] = Some(Box::new(payload));
    }

    fn collect_one<T: CommPayload>(&self, from: usize) -> T {
        let slots = self.shared.slots.lock().expect("communicator lock poisoned");
        slots[from]
            .as_ref()
            .and_then(|b| b.downcast_ref::<T>())
            .cloned()
            .expect("collective type/order mismatch across ranks")
    }

    fn collect_all<T: CommPayload>(&self) -> Vec<T> {
        let slots = self.shared.slots.lock().expect("communicator lock poisoned");
        (0..self.shared.size)
            .map(|s| {
                slots[s]
                    .as_ref()
                    .and_then(|b| b.downcast_ref::<T>())
                    .cloned()
                    .expect("collective type/order mismatch across ranks")
            })
            .collect()
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn broadcast<T: CommPayload>(&self, root: usize, value: Option<T>) -> T {
        if self.rank == root {
            self.deposit(value.expect("broadcast root must supply a value"));
        }
        self.barrier();
        let out = self.collect_one::<T>(root);
        self.barrier();
        out
    }

    fn gather<T: CommPayload>(&self, root: usize, local: Vec<T>) -> Option<Vec<Vec<T>>> {
        self.deposit(local);
        self.barrier();
        let out = if self.rank == root { Some(self.collect_all::<Vec<T>>()) } else { None };
        self.barrier();
        out
    }

    fn all_gather<T: CommPayload>(&self, local: Vec<T>) -> Vec<Vec<T>> {
        self.deposit(local);
        self.barrier();
        let out = self.collect_all::<Vec<T>>();
        self.barrier();
        out
    }

    fn all_to_all<T: CommPayload>(&self, sends: Vec<Vec<T>>) -> Vec<Vec<T>> {
        assert_eq!(sends.len(), self.shared.size, "all_to_all requires one send per rank");
        self.deposit(sends);
        self.barrier();
        let out = {
            let slots = self.shared.slots.lock().expect("communicator lock poisoned");
            (0..self.shared.size)
                .map(|s| {
                    slots[s]
                        .as_ref()
                        .and_then(|b| b.downcast_ref::<Vec<Vec<T>>>())
                        .map(|v| v[self.rank].clone())
                        .expect("collective type/order mismatch across ranks")
                })
                .collect()
        };
        self.barrier();
        out
    }

    fn all_reduce_u64(&self, value: u64) -> u64 {
        self.deposit(value);
        self.barrier();
        let out = self.collect_all::<u64>().into_iter().sum();
        self.barrier();
        out
    }

    fn all_reduce_f64(&self, value: f64) -> f64 {
        self.deposit(value);
        self.barrier();
        let out = self.collect_all::<f64>().into_iter().sum();
        self.barrier();
        out
    }
}

/// Run the identical closure on every rank of a fresh `size`-rank group,
/// one scoped thread per rank, and return all results in rank order.
///
/// Any rank failing fails the whole group; there is no partial-result
/// recovery. Errors must be raised at the same point of the collective
/// sequence on every rank (validate before the first collective).
pub fn run_group<T, F>(size: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(LocalComm) -> Result<T> + Sync,
{
    if size == 0 {
        return Err(Error::Validation("worker group size must be >= 1".into()));
    }
    let comms = LocalComm::group(size);
    let results: Vec<Result<T>> = std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                scope.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(Error::Computation("worker thread panicked".into()))
                })
            })
            .collect()
    });
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_comm_identities() {
        let comm = SelfComm;
        assert_eq!(comm.size(), 1);
        assert_eq!(comm.broadcast(0, Some(7u64)), 7);
        assert_eq!(comm.all_reduce_u64(5), 5);
        assert_eq!(comm.all_gather(vec![1, 2]), vec![vec![1, 2]]);
    }

    #[test]
    fn test_group_broadcast_and_reduce() {
        let sums = run_group(4, |comm| {
            let seed = comm.broadcast(0, if comm.rank() == 0 { Some(10u64) } else { None });
            assert_eq!(seed, 10);
            Ok(comm.all_reduce_u64(comm.rank() as u64 + 1))
        })
        .unwrap();
        assert_eq!(sums, vec![10, 10, 10, 10]);
    }

    #[test]
    fn test_group_gather_rank_order() {
        let outs = run_group(3, |comm| {
            Ok(comm.gather(0, vec![comm.rank() as u64 * 2]))
        })
        .unwrap();
        assert_eq!(outs[0], Some(vec![vec![0], vec![2], vec![4]]));
        assert_eq!(outs[1], None);
        assert_eq!(outs[2], None);
    }

    #[test]
    fn test_group_all_to_all_transpose() {
        let outs = run_group(3, |comm| {
            let sends: Vec<Vec<usize>> =
                (0..comm.size()).map(|t| vec![comm.rank() * 10 + t]).collect();
            Ok(comm.all_to_all(sends))
        })
        .unwrap();
        // Rank r receives s*10 + r from each source rank s.
        for (r, recv) in outs.iter().enumerate() {
            let expected: Vec<Vec<usize>> = (0..3).map(|s| vec![s * 10 + r]).collect();
            assert_eq!(recv, &expected);
        }
    }

    #[test]
    fn test_group_repeated_collectives_stay_aligned() {
        let outs = run_group(2, |comm| {
            let mut total = 0.0;
            for i in 0..20 {
                total += comm.all_reduce_f64(i as f64);
            }
            Ok(total)
        })
        .unwrap();
        // Each round sums the same i on both ranks: sum of 2*i for i in 0..20.
        assert!(outs.iter().all(|&t| (t - 380.0).abs() < 1e-12));
    }

    #[test]
    fn test_group_size_zero_rejected() {
        assert!(run_group(0, |_| Ok(())).is_err());
    }
}
