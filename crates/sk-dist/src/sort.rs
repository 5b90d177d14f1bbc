//! Distributed sort-by-key and linear repartition.
//!
//! `sort_by_key` produces a globally sorted layout: keys are monotonically
//! non-decreasing within each rank and across ranks in rank order, and
//! record counts are evenly repartitioned by the ownership formula. The
//! exchange volume is the number of records (unique keys after local
//! pre-reduction), never the number of particles behind them.

use sk_core::comm::{CommPayload, Communicator};
use sk_core::{owner_of, partition_sizes, PixelRecord};

/// Per-rank record counts, in rank order.
pub(crate) fn gathered_counts<C: Communicator>(n: usize, comm: &C) -> Vec<u64> {
    comm.all_gather(vec![n as u64]).into_iter().flatten().collect()
}

/// Linear repartition preserving global element order.
///
/// `counts` is every rank's current element count (rank order) and
/// `target_sizes` the wanted per-rank lengths; both layouts describe the
/// same global array, so the totals must agree. Each rank slices its local
/// span against every target interval and ships the overlaps; receives
/// concatenate in rank order, which keeps the global order intact.
pub fn rebalance<T, C>(local: Vec<T>, counts: &[u64], target_sizes: &[usize], comm: &C) -> Vec<T>
where
    T: CommPayload,
    C: Communicator,
{
    let rank = comm.rank();
    let size = comm.size();
    debug_assert_eq!(counts.len(), size);
    debug_assert_eq!(target_sizes.len(), size);
    debug_assert_eq!(
        counts.iter().sum::<u64>(),
        target_sizes.iter().map(|&s| s as u64).sum::<u64>()
    );

    let my_start: u64 = counts[..rank].iter().sum();
    let my_end = my_start + local.len() as u64;

    let mut sends: Vec<Vec<T>> = (0..size).map(|_| Vec::new()).collect();
    let mut target_start = 0u64;
    for (t, send) in sends.iter_mut().enumerate() {
        let target_end = target_start + target_sizes[t] as u64;
        let lo = my_start.max(target_start);
        let hi = my_end.min(target_end);
        if lo < hi {
            *send = local[(lo - my_start) as usize..(hi - my_start) as usize].to_vec();
        }
        target_start = target_end;
    }

    comm.all_to_all(sends).into_iter().flatten().collect()
}

/// Global sort of pixel records by key over the key span `[0, key_span)`.
///
/// Records are routed to the rank owning their key's slot in an even
/// key-space partition, sorted locally, then rebalanced to even record
/// counts. Both steps preserve the cross-rank monotonic key order.
pub fn sort_by_key<C: Communicator>(
    records: Vec<PixelRecord>,
    key_span: u64,
    comm: &C,
) -> Vec<PixelRecord> {
    let size = comm.size();

    let mut sends: Vec<Vec<PixelRecord>> = (0..size).map(|_| Vec::new()).collect();
    for rec in records {
        sends[owner_of(key_span as usize, size, rec.pix as usize)].push(rec);
    }

    let mut local: Vec<PixelRecord> =
        comm.all_to_all(sends).into_iter().flatten().collect();
    local.sort_unstable_by_key(|r| r.pix);

    let counts = gathered_counts(local.len(), comm);
    let total: u64 = counts.iter().sum();
    let sizes = partition_sizes(total as usize, size);
    rebalance(local, &counts, &sizes, comm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{run_group, SelfComm};

    fn rec(pix: u64, count: u64, sum: f64) -> PixelRecord {
        PixelRecord::new(pix, count, sum)
    }

    #[test]
    fn test_sort_single_rank() {
        let comm = SelfComm;
        let out = sort_by_key(vec![rec(5, 1, 1.0), rec(2, 1, 2.0), rec(9, 1, 3.0)], 10, &comm);
        let keys: Vec<u64> = out.iter().map(|r| r.pix).collect();
        assert_eq!(keys, vec![2, 5, 9]);
    }

    #[test]
    fn test_sort_even_counts_and_global_order() {
        let outs = run_group(3, |comm| {
            // Rank r holds keys r, r+3, r+6 in scrambled order.
            let r = comm.rank() as u64;
            let local = vec![rec(r + 6, 1, 0.0), rec(r, 1, 0.0), rec(r + 3, 1, 0.0)];
            Ok(sort_by_key(local, 9, &comm))
        })
        .unwrap();

        let mut all_keys = Vec::new();
        for (r, out) in outs.iter().enumerate() {
            assert_eq!(out.len(), 3, "rank {r} must hold an even share");
            all_keys.extend(out.iter().map(|x| x.pix));
        }
        assert_eq!(all_keys, (0..9).collect::<Vec<u64>>());
    }

    #[test]
    fn test_sort_keeps_duplicates() {
        let outs = run_group(2, |comm| {
            let local = vec![rec(4, 1, 1.0); 3];
            Ok(sort_by_key(local, 8, &comm))
        })
        .unwrap();
        let total: usize = outs.iter().map(|o| o.len()).sum();
        assert_eq!(total, 6);
        assert_eq!(outs[0].len(), 3);
        assert_eq!(outs[1].len(), 3);
        assert!(outs.iter().flatten().all(|r| r.pix == 4));
    }

    #[test]
    fn test_rebalance_preserves_order() {
        let outs = run_group(2, |comm| {
            // Global array 0..10 starts entirely on rank 0.
            let local: Vec<u64> = if comm.rank() == 0 { (0..10).collect() } else { Vec::new() };
            let counts = gathered_counts(local.len(), &comm);
            Ok(rebalance(local, &counts, &[5, 5], &comm))
        })
        .unwrap();
        assert_eq!(outs[0], (0..5).collect::<Vec<u64>>());
        assert_eq!(outs[1], (5..10).collect::<Vec<u64>>());
    }

    #[test]
    fn test_rebalance_empty_global() {
        let outs = run_group(2, |comm| {
            let counts = gathered_counts(0, &comm);
            Ok(rebalance(Vec::<u64>::new(), &counts, &[0, 0], &comm))
        })
        .unwrap();
        assert!(outs.iter().all(|o| o.is_empty()));
    }
}
