//! Boundary-aware reduction of sorted equal keys.
//!
//! After the global sort, records sharing a key form contiguous runs that
//! may straddle rank boundaries (a run can even span several ranks when a
//! rank's whole share is one key). The merge attributes each key's full
//! reduction to exactly one rank: the first rank, in rank order, where the
//! key occurs. Downstream ranks ship their prefix aggregates to that owner
//! and keep nothing for the key.

use sk_core::comm::Communicator;
use sk_core::PixelRecord;

/// Reduce a key-sorted local vector into one record per distinct key.
fn reduce_local_runs(records: Vec<PixelRecord>) -> Vec<PixelRecord> {
    let mut runs: Vec<PixelRecord> = Vec::new();
    for rec in records {
        match runs.last_mut() {
            Some(last) if last.pix == rec.pix => last.merge(&rec),
            _ => runs.push(rec),
        }
    }
    runs
}

/// Merge equal keys across a globally sorted distribution.
///
/// Input: each rank's key-sorted records, keys monotonic across ranks in
/// rank order. Output: one record per distinct key globally, still sorted
/// across ranks, each key held by the rank where it first occurs.
pub fn merge_sorted_runs<C: Communicator>(
    records: Vec<PixelRecord>,
    comm: &C,
) -> Vec<PixelRecord> {
    let rank = comm.rank();
    let size = comm.size();

    let mut runs = reduce_local_runs(records);

    // First/last key per rank; None for ranks holding nothing.
    let edges: Vec<Option<(u64, u64)>> = comm
        .all_gather(vec![runs.first().map(|f| {
            (f.pix, runs.last().expect("non-empty runs have a last element").pix)
        })])
        .into_iter()
        .flatten()
        .collect();

    // Only the first local run can continue an earlier rank's run. Walk
    // left through the gathered edges to find the key's first rank.
    let mut sends: Vec<Vec<PixelRecord>> = (0..size).map(|_| Vec::new()).collect();
    if let Some(first) = runs.first() {
        let key = first.pix;
        let mut owner = rank;
        for j in (0..rank).rev() {
            match edges[j] {
                None => continue,
                Some((first_j, last_j)) => {
                    if last_j != key {
                        break;
                    }
                    owner = j;
                    if first_j != key {
                        break;
                    }
                }
            }
        }
        if owner != rank {
            let shipped = runs.remove(0);
            sends[owner].push(shipped);
        }
    }

    let received: Vec<PixelRecord> =
        comm.all_to_all(sends).into_iter().flatten().collect();
    for rec in received {
        let pos = runs
            .iter()
            .position(|r| r.pix == rec.pix)
            .expect("shipped run must land on the rank owning its key");
        runs[pos].merge(&rec);
    }

    runs
}
